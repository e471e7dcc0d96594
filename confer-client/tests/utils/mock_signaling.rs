use async_trait::async_trait;
use confer_client::SignalingOutput;
use confer_core::{ParticipantId, Signal, SignalMessage, SignalType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingOutput that captures everything the client sends.
#[derive(Clone)]
pub struct MockSignaling {
    /// Channel to send captured messages.
    tx: mpsc::UnboundedSender<SignalMessage>,
    /// All captured messages (for verification).
    sent: Arc<Mutex<Vec<SignalMessage>>>,
    ready: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

impl MockSignaling {
    /// Create a new MockSignaling and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            ready: Arc::new(AtomicBool::new(true)),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        (signaling, rx)
    }

    /// Create a MockSignaling without a receiver (messages are only stored).
    pub fn new_stored_only() -> Self {
        Self::new().0
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// All captured messages in send order.
    pub async fn sent(&self) -> Vec<SignalMessage> {
        self.sent.lock().await.clone()
    }

    /// Signals addressed to `target`, in send order.
    pub async fn signals_to(&self, target: &ParticipantId) -> Vec<Signal> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|m| match m {
                SignalMessage::WebRtcSignal {
                    signal,
                    target_user_id: Some(to),
                    ..
                } if to == target => Some(signal.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `webrtc_signal` messages of the given type to `target`.
    pub async fn count_signals(&self, target: &ParticipantId, kind: SignalType) -> usize {
        self.signals_to(target)
            .await
            .iter()
            .filter(|s| s.signal_type() == kind)
            .count()
    }

    /// Number of captured messages with the given wire `type`.
    pub async fn count_kind(&self, kind: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }
}

#[async_trait]
impl SignalingOutput for MockSignaling {
    async fn send(&self, message: SignalMessage) {
        tracing::debug!("[MockSignaling] send {}", message.kind());

        self.sent.lock().await.push(message.clone());
        let _ = self.tx.send(message);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
