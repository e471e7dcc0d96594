use crate::error::ConnectError;
use crate::media::MediaConstraints;
use confer_core::ParticipantId;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CALL_ENDPOINT: &str = "video/ws";

/// Переподключение сигнального канала: задержка `base * 2^(attempt-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Задержка перед попыткой `attempt` (нумерация с единицы).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 5)
    }
}

/// Восстановление медиасоединения с одним участником.
///
/// Счётчик считает подряд идущие неудачи и сбрасывается при каждом
/// успешном соединении. `max_attempts: None` снимает ограничение.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRetryPolicy {
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

impl PeerRetryPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

impl Default for PeerRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub server_url: String,
    pub call_endpoint: String,
    pub user_id: Option<ParticipantId>,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_period: Duration,
    pub join_timeout: Duration,
    pub peer_retry: PeerRetryPolicy,
    pub media: MediaConstraints,
}

impl CallConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<ParticipantId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_call_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.call_endpoint = endpoint.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_peer_retry(mut self, peer_retry: PeerRetryPolicy) -> Self {
        self.peer_retry = peer_retry;
        self
    }

    pub fn with_media(mut self, media: MediaConstraints) -> Self {
        self.media = media;
        self
    }

    /// `scheme://host/<call-endpoint>/<room_id>?user_id=<id>&user_name=<name>`
    pub fn signaling_url(
        &self,
        room_id: &str,
        user_id: &ParticipantId,
        user_name: &str,
    ) -> Result<Url, ConnectError> {
        let mut url = Url::parse(&self.server_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConnectError::InvalidUrl(self.server_url.clone()))?;
            segments.pop_if_empty();
            for part in self.call_endpoint.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
            segments.push(room_id);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("user_id", user_id.as_str());
            if !user_name.is_empty() {
                query.append_pair("user_name", user_name);
            }
        }
        Ok(url)
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000".to_owned(),
            call_endpoint: DEFAULT_CALL_ENDPOINT.to_owned(),
            user_id: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat_period: Duration::from_secs(30),
            join_timeout: Duration::from_secs(10),
            peer_retry: PeerRetryPolicy::default(),
            media: MediaConstraints::default(),
        }
    }
}
