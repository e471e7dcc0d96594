use crate::error::CallError;
use crate::transport::RemoteTrack;
use async_trait::async_trait;
use confer_core::{ConnectionQuality, Participant, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChat {
    pub from: Option<ParticipantId>,
    pub user_name: Option<String>,
    pub text: String,
}

/// Всё, что звонок сообщает интерфейсу.
///
/// Вызывается из цикла координатора, поэтому реализация не должна
/// надолго блокироваться.
#[async_trait]
pub trait CallObserver: Send + Sync {
    /// Полный снимок: локальный участник первым, затем удалённые.
    async fn on_participants_changed(&self, participants: &[Participant]);

    async fn on_media_attached(&self, participant: &ParticipantId, track: RemoteTrack);

    async fn on_media_detached(&self, _participant: &ParticipantId) {}

    async fn on_status_changed(&self, status: CallStatus, quality: ConnectionQuality);

    async fn on_chat_message(&self, _message: &ReceivedChat) {}

    async fn on_error(&self, _error: &CallError) {}
}
