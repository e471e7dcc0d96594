use async_trait::async_trait;
use confer_core::{ParticipantId, Signal, SignalMessage};

/// Исходящая сторона сигнального канала, как её видят координатор и сессии.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Без гарантии доставки: вне состояния Ready сообщение отбрасывается.
    async fn send(&self, message: SignalMessage);

    fn is_ready(&self) -> bool;

    async fn close(&self);

    async fn send_signal(&self, target: &ParticipantId, signal: Signal) {
        self.send(SignalMessage::signal_to(target.clone(), signal))
            .await;
    }
}
