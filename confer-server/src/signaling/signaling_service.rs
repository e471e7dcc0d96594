use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use confer_core::{ParticipantId, SignalMessage};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{error, warn};

struct PeerLink {
    conn_id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

struct SignalingInner {
    peers: DashMap<ParticipantId, PeerLink>,
    next_conn: AtomicU64,
}

/// Реестр открытых WebSocket соединений хаба.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                next_conn: AtomicU64::new(1),
            }),
        }
    }

    pub fn next_conn_id(&self) -> u64 {
        self.inner.next_conn.fetch_add(1, Ordering::Relaxed)
    }

    /// Регистрирует соединение. Прежнее соединение того же участника вытесняется.
    pub fn add_peer(&self, participant: ParticipantId, conn_id: u64, tx: mpsc::UnboundedSender<Message>) {
        self.inner.peers.insert(participant, PeerLink { conn_id, tx });
    }

    /// Удаляет соединение, только если участник не успел переподключиться.
    pub fn remove_peer(&self, participant: &ParticipantId, conn_id: u64) {
        self.inner
            .peers
            .remove_if(participant, |_, link| link.conn_id == conn_id);
    }

    pub fn is_connected(&self, participant: &ParticipantId) -> bool {
        self.inner.peers.contains_key(participant)
    }

    pub fn send_signal(&self, participant: &ParticipantId, msg: &SignalMessage) {
        let Some(peer) = self.inner.peers.get(participant) else {
            warn!(
                "Attempted to send {} to disconnected user {}",
                msg.kind(),
                participant
            );
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = peer.tx.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", participant, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_to(&self, participant: &ParticipantId, msg: SignalMessage) {
        self.send_signal(participant, &msg);
    }
}
