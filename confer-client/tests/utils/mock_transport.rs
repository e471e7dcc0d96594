use async_trait::async_trait;
use confer_client::{
    LocalTrack, PeerTransport, TransportError, TransportEvent, TransportEventSender,
    TransportFactory, TransportState,
};
use confer_core::{IceCandidate, ParticipantId, SdpKind, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// One call made on a mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind, String),
    AddCandidate(String),
    AddTrack(String),
    ReplaceTrack { old: String, new: String },
    Close,
}

#[derive(Default)]
struct TransportFlags {
    /// Report `Connected` once both descriptions are applied.
    auto_connect: AtomicBool,
    /// Generate one local candidate after the local description.
    emit_candidates: AtomicBool,
    fail_offers: AtomicBool,
    stall_offers: AtomicBool,
}

/// Mock PeerTransport that records every call.
pub struct MockTransport {
    pub remote: ParticipantId,
    pub index: usize,
    events: TransportEventSender,
    flags: Arc<TransportFlags>,
    ops: Mutex<Vec<TransportOp>>,
    has_local: AtomicBool,
    has_remote: AtomicBool,
}

impl MockTransport {
    /// All calls made on this transport, in order.
    pub async fn ops(&self) -> Vec<TransportOp> {
        self.ops.lock().await.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.ops.lock().await.contains(&TransportOp::Close)
    }

    /// Simulate a state callback from the underlying connection.
    pub fn emit_state(&self, state: TransportState) {
        let _ = self.events.send(TransportEvent::StateChanged(state));
    }

    async fn record(&self, op: TransportOp) {
        self.ops.lock().await.push(op);
    }

    fn maybe_connect(&self) {
        let both = self.has_local.load(Ordering::SeqCst) && self.has_remote.load(Ordering::SeqCst);
        if both && self.flags.auto_connect.load(Ordering::SeqCst) {
            self.emit_state(TransportState::Connected);
        }
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.record(TransportOp::CreateOffer).await;
        if self.flags.stall_offers.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.flags.fail_offers.load(Ordering::SeqCst) {
            return Err(TransportError::Other("offer refused".to_string()));
        }
        Ok(SessionDescription::offer(format!(
            "offer-{}-{}",
            self.remote, self.index
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.record(TransportOp::CreateAnswer).await;
        Ok(SessionDescription::answer(format!(
            "answer-{}-{}",
            self.remote, self.index
        )))
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError> {
        self.record(TransportOp::SetLocal(desc.kind)).await;
        self.has_local.store(true, Ordering::SeqCst);

        if self.flags.emit_candidates.load(Ordering::SeqCst) {
            let candidate = IceCandidate::new(format!("candidate:{}-{}", self.remote, self.index));
            let _ = self
                .events
                .send(TransportEvent::CandidateGenerated(candidate));
        }
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError> {
        self.record(TransportOp::SetRemote(desc.kind, desc.sdp.clone()))
            .await;
        self.has_remote.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), TransportError> {
        self.record(TransportOp::AddCandidate(candidate.candidate.clone()))
            .await;
        Ok(())
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        self.record(TransportOp::AddTrack(track.id.clone())).await;
        Ok(())
    }

    async fn replace_track(
        &self,
        old: &LocalTrack,
        new: &LocalTrack,
    ) -> Result<(), TransportError> {
        self.record(TransportOp::ReplaceTrack {
            old: old.id.clone(),
            new: new.id.clone(),
        })
        .await;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record(TransportOp::Close).await;
        Ok(())
    }
}

/// Mock TransportFactory that keeps every transport it created.
#[derive(Clone)]
pub struct MockTransportFactory {
    flags: Arc<TransportFlags>,
    created: Arc<Mutex<Vec<Arc<MockTransport>>>>,
    count: Arc<AtomicUsize>,
}

impl MockTransportFactory {
    /// Transports connect on their own once negotiated.
    pub fn new() -> Self {
        let factory = Self {
            flags: Arc::new(TransportFlags::default()),
            created: Arc::new(Mutex::new(Vec::new())),
            count: Arc::new(AtomicUsize::new(0)),
        };
        factory.flags.auto_connect.store(true, Ordering::SeqCst);
        factory
    }

    /// Transports only change state when the test says so.
    pub fn manual() -> Self {
        let factory = Self::new();
        factory.flags.auto_connect.store(false, Ordering::SeqCst);
        factory
    }

    pub fn emit_candidates(self) -> Self {
        self.flags.emit_candidates.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_fail_offers(&self, fail: bool) {
        self.flags.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn set_stall_offers(&self, stall: bool) {
        self.flags.stall_offers.store(stall, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// All transports created for `remote`, oldest first.
    pub async fn transports_for(&self, remote: &ParticipantId) -> Vec<Arc<MockTransport>> {
        self.created
            .lock()
            .await
            .iter()
            .filter(|t| &t.remote == remote)
            .cloned()
            .collect()
    }

    /// The most recent transport for `remote`.
    pub async fn latest_for(&self, remote: &ParticipantId) -> Option<Arc<MockTransport>> {
        self.transports_for(remote).await.pop()
    }
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        remote: &ParticipantId,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let index = self.count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[MockTransport] create #{} for {}", index, remote);

        let transport = Arc::new(MockTransport {
            remote: remote.clone(),
            index,
            events,
            flags: self.flags.clone(),
            ops: Mutex::new(Vec::new()),
            has_local: AtomicBool::new(false),
            has_remote: AtomicBool::new(false),
        });
        self.created.lock().await.push(transport.clone());
        Ok(transport)
    }
}
