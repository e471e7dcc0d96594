use confer_core::ParticipantId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid signaling url: {0}")]
    InvalidUrl(String),

    #[error("failed to parse signaling url: {0}")]
    Url(#[from] url::ParseError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("signaling endpoint refused connection: {0}")]
    Refused(String),

    #[error("signaling channel not ready within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    #[error("signaling connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    #[error("malformed signaling message: {0}")]
    MalformedMessage(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("transport is closed")]
    Closed,

    #[error("no outgoing track with id {0}")]
    UnknownTrack(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("local media unavailable: {0}")]
    Unavailable(String),

    #[error("screen capture unavailable: {0}")]
    ScreenUnavailable(String),

    #[error("failed to apply media constraints: {0}")]
    Constraints(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("negotiation with {remote} failed: {reason}")]
    NegotiationFailure {
        remote: ParticipantId,
        reason: String,
    },

    #[error("gave up on {remote} after {attempts} recovery attempts")]
    RetriesExhausted {
        remote: ParticipantId,
        attempts: u32,
    },
}

impl SessionError {
    pub(crate) fn negotiation(remote: &ParticipantId, err: impl std::fmt::Display) -> Self {
        SessionError::NegotiationFailure {
            remote: remote.clone(),
            reason: err.to_string(),
        }
    }
}

/// Ошибки `join_call`.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("cannot join: {0}")]
    MediaUnavailable(#[source] MediaError),

    #[error("signaling unavailable: {0}")]
    SignalingUnavailable(#[source] ConnectError),

    #[error("join was cancelled by leave")]
    Cancelled,

    #[error("a call is already active on this handle")]
    AlreadyJoined,
}

/// Ошибки активного звонка: результаты команд и то, что уходит в `CallObserver::on_error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("not in a call")]
    NotJoined,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("hub reported an error: {0}")]
    Remote(String),

    #[error("call coordinator has stopped")]
    CoordinatorGone,
}
