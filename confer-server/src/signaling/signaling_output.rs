use confer_core::{ParticipantId, SignalMessage};
use async_trait::async_trait;

/// Трейт, который реализует WebSocket сервер,
/// чтобы комната могла отправлять сообщения участникам.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Отправить сообщение конкретному участнику. Отключённые участники пропускаются.
    async fn send_to(&self, participant: &ParticipantId, msg: SignalMessage);
}
