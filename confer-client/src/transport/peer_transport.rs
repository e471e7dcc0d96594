use crate::error::TransportError;
use crate::media::{LocalTrack, TrackKind};
use async_trait::async_trait;
use confer_core::{IceCandidate, ParticipantId, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Входящий трек удалённого участника.
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    pub rtp: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Колбэки транспорта, превращённые в сообщения.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    CandidateGenerated(IceCandidate),
    StateChanged(TransportState),
    TrackReceived(RemoteTrack),
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Точка-точка медиатранспорт к одному участнику.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: &SessionDescription)
    -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), TransportError>;

    async fn add_track(&self, track: &LocalTrack) -> Result<(), TransportError>;

    /// Подменить исходящий трек без повторного согласования.
    async fn replace_track(&self, old: &LocalTrack, new: &LocalTrack)
    -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Создаёт транспорт для сессии. События транспорта уходят в `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        remote: &ParticipantId,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
