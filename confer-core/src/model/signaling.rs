use crate::model::participant::{ParticipantId, ParticipantInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// ICE кандидат в том виде, в каком его сериализует браузер.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Offer,
    Answer,
    IceCandidate,
}

/// Полезная нагрузка `webrtc_signal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: IceCandidate },
}

impl Signal {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Signal::Offer { .. } => SignalType::Offer,
            Signal::Answer { .. } => SignalType::Answer,
            Signal::IceCandidate { .. } => SignalType::IceCandidate,
        }
    }
}

impl From<SessionDescription> for Signal {
    fn from(desc: SessionDescription) -> Self {
        match desc.kind {
            SdpKind::Offer => Signal::Offer { sdp: desc.sdp },
            SdpKind::Answer => Signal::Answer { sdp: desc.sdp },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Mute,
    Unmute,
    VideoOn,
    VideoOff,
    ScreenShareStart,
    ScreenShareStop,
    #[serde(other)]
    Unknown,
}

/// Конверт сигнального канала. Одна схема на оба направления:
/// поля отправителя заполняет хаб при пересылке.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    UserInfo {
        user_name: String,
    },
    GetParticipants,
    ParticipantsList {
        participants: Vec<ParticipantInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        your_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
    UserJoined {
        user_id: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participants_count: Option<usize>,
    },
    UserLeft {
        user_id: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participants_count: Option<usize>,
    },
    #[serde(rename = "webrtc_signal")]
    WebRtcSignal {
        signal: Signal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user_id: Option<ParticipantId>,
    },
    UserAction {
        action: UserAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },
    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },
    Ping,
    Pong,
    Error {
        message: String,
    },
}

impl SignalMessage {
    pub fn signal_to(target: ParticipantId, signal: Signal) -> Self {
        SignalMessage::WebRtcSignal {
            signal,
            target_user_id: Some(target),
            from_user_id: None,
        }
    }

    pub fn action(action: UserAction) -> Self {
        SignalMessage::UserAction {
            action,
            value: None,
            user_id: None,
            user_name: None,
        }
    }

    /// Имя варианта для логов.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::UserInfo { .. } => "user_info",
            SignalMessage::GetParticipants => "get_participants",
            SignalMessage::ParticipantsList { .. } => "participants_list",
            SignalMessage::UserJoined { .. } => "user_joined",
            SignalMessage::UserLeft { .. } => "user_left",
            SignalMessage::WebRtcSignal { .. } => "webrtc_signal",
            SignalMessage::UserAction { .. } => "user_action",
            SignalMessage::ChatMessage { .. } => "chat_message",
            SignalMessage::Ping => "ping",
            SignalMessage::Pong => "pong",
            SignalMessage::Error { .. } => "error",
        }
    }
}
