use confer_core::IceServerConfig;
use std::env;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Конфигурация для WebRTC
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    /// STUN по умолчанию плюс TURN из `TURN_URL`/`TURN_USERNAME`/`TURN_CREDENTIAL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("TURN_URL") {
            config.ice_servers.push(IceServerConfig {
                urls: vec![url],
                username: env::var("TURN_USERNAME").ok(),
                credential: env::var("TURN_CREDENTIAL").ok(),
            });
        }
        config
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_URL.to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}
