mod participant;
mod signaling;

pub use participant::{
    ConnectionQuality, ConnectionState, MediaFlags, Participant, ParticipantId, ParticipantInfo,
};
pub use signaling::{
    IceCandidate, IceServerConfig, SdpKind, SessionDescription, Signal, SignalMessage, SignalType,
    UserAction,
};
