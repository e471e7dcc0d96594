use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Непрозрачный идентификатор участника звонка.
///
/// Сравнение лексикографическое: на нём построен выбор стороны,
/// которая делает offer при одновременном согласовании.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Состояние медиа участника, которое видят остальные.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFlags {
    pub muted: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self {
            muted: false,
            video_enabled: true,
            screen_sharing: false,
        }
    }
}

/// Оценка качества связи. Порядок вариантов значим: чем дальше, тем хуже.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Connecting,
    Excellent,
    Good,
    Poor,
    Bad,
}

/// Состояние медиасоединения с удалённым участником.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub is_local: bool,
    pub media: MediaFlags,
    pub connection_state: ConnectionState,
    pub quality: ConnectionQuality,
}

impl Participant {
    pub fn local(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_local: true,
            media: MediaFlags::default(),
            connection_state: ConnectionState::Connecting,
            quality: ConnectionQuality::Connecting,
        }
    }

    pub fn remote(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_local: false,
            media: MediaFlags::default(),
            connection_state: ConnectionState::New,
            quality: ConnectionQuality::Connecting,
        }
    }
}

/// Запись об участнике в `participants_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub user_id: ParticipantId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub is_audio_muted: bool,
    #[serde(default = "default_true")]
    pub is_video_enabled: bool,
    #[serde(default)]
    pub is_screen_sharing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ParticipantInfo {
    pub fn new(user_id: ParticipantId, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            joined_at: None,
            is_audio_muted: false,
            is_video_enabled: true,
            is_screen_sharing: false,
            role: None,
        }
    }

    pub fn media_flags(&self) -> MediaFlags {
        MediaFlags {
            muted: self.is_audio_muted,
            video_enabled: self.is_video_enabled,
            screen_sharing: self.is_screen_sharing,
        }
    }
}
