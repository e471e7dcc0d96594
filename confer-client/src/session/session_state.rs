use crate::error::SessionError;
use crate::media::LocalTrack;
use crate::transport::RemoteTrack;
use confer_core::{ConnectionQuality, ConnectionState, ParticipantId, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Offering,
    AwaitingAnswer,
    AnsweringOffer,
    Connected,
    Reconnecting,
    Closed,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        self == SessionState::Connected
    }

    pub fn connection_state(self) -> ConnectionState {
        match self {
            SessionState::Idle => ConnectionState::New,
            SessionState::Offering
            | SessionState::AwaitingAnswer
            | SessionState::AnsweringOffer => ConnectionState::Connecting,
            SessionState::Connected => ConnectionState::Connected,
            SessionState::Reconnecting => ConnectionState::Reconnecting,
            SessionState::Closed => ConnectionState::Closed,
        }
    }

    pub fn quality(self) -> ConnectionQuality {
        match self {
            SessionState::Idle
            | SessionState::Offering
            | SessionState::AwaitingAnswer
            | SessionState::AnsweringOffer => ConnectionQuality::Connecting,
            SessionState::Connected => ConnectionQuality::Excellent,
            SessionState::Reconnecting => ConnectionQuality::Poor,
            SessionState::Closed => ConnectionQuality::Bad,
        }
    }
}

/// Входящие сообщения сессии. Обрабатываются строго по очереди.
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// Начать исходящее согласование (только из `Idle`).
    StartOffer,
    Signal(Signal),
    /// Подменить исходящий трек того же вида.
    ReplaceTrack(LocalTrack),
    Close,
}

/// Что сессия сообщает координатору. `generation` отличает
/// сессию от её предшественницы для того же участника.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        remote: ParticipantId,
        generation: u64,
        state: SessionState,
    },
    LinkQuality {
        remote: ParticipantId,
        generation: u64,
        quality: ConnectionQuality,
    },
    RemoteTrack {
        remote: ParticipantId,
        generation: u64,
        track: RemoteTrack,
    },
    Closed {
        remote: ParticipantId,
        generation: u64,
        error: Option<SessionError>,
    },
}

impl SessionEvent {
    pub fn remote(&self) -> &ParticipantId {
        match self {
            SessionEvent::StateChanged { remote, .. }
            | SessionEvent::LinkQuality { remote, .. }
            | SessionEvent::RemoteTrack { remote, .. }
            | SessionEvent::Closed { remote, .. } => remote,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::StateChanged { generation, .. }
            | SessionEvent::LinkQuality { generation, .. }
            | SessionEvent::RemoteTrack { generation, .. }
            | SessionEvent::Closed { generation, .. } => *generation,
        }
    }
}
