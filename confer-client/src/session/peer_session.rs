use crate::config::PeerRetryPolicy;
use crate::error::SessionError;
use crate::media::LocalTrack;
use crate::session::session_state::{SessionEvent, SessionInput, SessionState};
use crate::signaling::SignalingOutput;
use crate::transport::{PeerTransport, TransportEvent, TransportFactory, TransportState};
use confer_core::{ConnectionQuality, IceCandidate, ParticipantId, SessionDescription, Signal};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Общее для всех сессий одного звонка.
#[derive(Clone)]
pub struct SessionContext {
    pub local_id: ParticipantId,
    pub transports: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub retry: PeerRetryPolicy,
}

enum Step {
    Input(SessionInput),
    Transport(TransportEvent),
}

/// Согласование с одним удалённым участником.
///
/// Работает в своей задаче и обрабатывает вход по одному сообщению,
/// поэтому асинхронные шаги одной сессии не перемешиваются.
/// Кандидаты, пришедшие до применения удалённого описания, копятся
/// в очереди и применяются сразу после него в порядке прихода.
pub struct PeerNegotiationSession {
    remote: ParticipantId,
    generation: u64,
    ctx: SessionContext,
    state: SessionState,
    tracks: Vec<LocalTrack>,
    transport: Option<Arc<dyn PeerTransport>>,
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    tracks_attached: bool,
    pending_local_description: Option<SessionDescription>,
    remote_description_applied: bool,
    queued_candidates: VecDeque<IceCandidate>,
    recovery_attempts: u32,
    close_error: Option<SessionError>,
}

impl PeerNegotiationSession {
    pub fn new(
        remote: ParticipantId,
        generation: u64,
        tracks: Vec<LocalTrack>,
        ctx: SessionContext,
    ) -> Self {
        Self {
            remote,
            generation,
            ctx,
            state: SessionState::Idle,
            tracks,
            transport: None,
            transport_events: None,
            tracks_attached: false,
            pending_local_description: None,
            remote_description_applied: false,
            queued_candidates: VecDeque::new(),
            recovery_attempts: 0,
            close_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<SessionInput>,
        mut cancel: watch::Receiver<bool>,
    ) {
        debug!("Session with {} started (generation {})", self.remote, self.generation);

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.wait_for(|closed| *closed) => break,
                input = inbox.recv() => match input {
                    Some(input) => Step::Input(input),
                    None => break,
                },
                Some(event) = next_transport_event(&mut self.transport_events) => {
                    Step::Transport(event)
                }
            };

            // закрытие отменяет незавершённый шаг
            tokio::select! {
                biased;
                _ = cancel.wait_for(|closed| *closed) => break,
                _ = self.step(step) => {}
            }

            if self.state == SessionState::Closed {
                break;
            }
        }

        self.shutdown().await;
    }

    async fn step(&mut self, step: Step) {
        let result = match step {
            Step::Input(SessionInput::StartOffer) => {
                if self.state == SessionState::Idle {
                    self.start_offer().await
                } else {
                    debug!("Session with {} already {:?}", self.remote, self.state);
                    Ok(())
                }
            }
            Step::Input(SessionInput::Signal(signal)) => self.handle_signal(signal).await,
            Step::Input(SessionInput::ReplaceTrack(track)) => {
                self.replace_track(track).await;
                Ok(())
            }
            Step::Input(SessionInput::Close) => {
                self.state = SessionState::Closed;
                Ok(())
            }
            Step::Transport(event) => self.handle_transport_event(event).await,
        };

        if let Err(err) = result {
            self.recover(err).await;
        }
    }

    async fn start_offer(&mut self) -> Result<(), SessionError> {
        self.set_state(SessionState::Offering);

        let transport = self.fresh_transport().await?;
        self.attach_tracks(&transport).await?;

        let offer = transport
            .create_offer()
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        transport
            .set_local_description(&offer)
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        self.pending_local_description = Some(offer.clone());

        info!("Sending offer to {}", self.remote);
        self.ctx.signaling.send_signal(&self.remote, offer.into()).await;
        self.set_state(SessionState::AwaitingAnswer);
        Ok(())
    }

    async fn handle_signal(&mut self, signal: Signal) -> Result<(), SessionError> {
        match signal {
            Signal::Offer { sdp } => self.handle_offer(SessionDescription::offer(sdp)).await,
            Signal::Answer { sdp } => self.handle_answer(SessionDescription::answer(sdp)).await,
            Signal::IceCandidate { candidate } => {
                self.handle_candidate(candidate).await;
                Ok(())
            }
        }
    }

    async fn handle_offer(&mut self, offer: SessionDescription) -> Result<(), SessionError> {
        match self.state {
            SessionState::Offering | SessionState::AwaitingAnswer => {
                if self.ctx.local_id < self.remote {
                    info!("Offer collision with {}: keeping local offer", self.remote);
                    return Ok(());
                }
                info!("Offer collision with {}: answering remote offer", self.remote);
            }
            SessionState::Connected
            | SessionState::AnsweringOffer
            | SessionState::Reconnecting => {
                info!("{} restarted negotiation", self.remote);
            }
            SessionState::Idle => {}
            SessionState::Closed => return Ok(()),
        }

        self.set_state(SessionState::AnsweringOffer);
        let transport = self.fresh_transport().await?;

        transport
            .set_remote_description(&offer)
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        self.remote_description_applied = true;
        self.flush_candidates(&transport).await;

        self.attach_tracks(&transport).await?;

        let answer = transport
            .create_answer()
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        transport
            .set_local_description(&answer)
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        self.pending_local_description = Some(answer.clone());

        info!("Sending answer to {}", self.remote);
        self.ctx.signaling.send_signal(&self.remote, answer.into()).await;
        Ok(())
    }

    async fn handle_answer(&mut self, answer: SessionDescription) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingAnswer {
            debug!("Ignoring answer from {} in {:?}", self.remote, self.state);
            return Ok(());
        }
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };

        transport
            .set_remote_description(&answer)
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        self.remote_description_applied = true;
        self.flush_candidates(&transport).await;
        Ok(())
    }

    async fn handle_candidate(&mut self, candidate: IceCandidate) {
        match &self.transport {
            Some(transport) if self.remote_description_applied => {
                if let Err(e) = transport.add_ice_candidate(&candidate).await {
                    warn!("Failed to add ICE candidate from {}: {}", self.remote, e);
                }
            }
            _ => {
                debug!("Queueing ICE candidate from {}", self.remote);
                self.queued_candidates.push_back(candidate);
            }
        }
    }

    async fn flush_candidates(&mut self, transport: &Arc<dyn PeerTransport>) {
        if !self.queued_candidates.is_empty() {
            debug!(
                "Applying {} queued candidates from {}",
                self.queued_candidates.len(),
                self.remote
            );
        }
        while let Some(candidate) = self.queued_candidates.pop_front() {
            if let Err(e) = transport.add_ice_candidate(&candidate).await {
                warn!("Failed to add queued ICE candidate from {}: {}", self.remote, e);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                self.ctx
                    .signaling
                    .send_signal(&self.remote, Signal::IceCandidate { candidate })
                    .await;
                Ok(())
            }

            TransportEvent::StateChanged(state) => match state {
                TransportState::Connected => {
                    let negotiating = matches!(
                        self.state,
                        SessionState::AwaitingAnswer | SessionState::AnsweringOffer
                    );
                    if negotiating && self.remote_description_applied {
                        info!("Media connected with {}", self.remote);
                        self.recovery_attempts = 0;
                        self.set_state(SessionState::Connected);
                    } else if self.state == SessionState::Connected {
                        self.emit_quality(ConnectionQuality::Excellent);
                    }
                    Ok(())
                }
                TransportState::Disconnected => {
                    warn!("Media path to {} interrupted", self.remote);
                    self.emit_quality(ConnectionQuality::Poor);
                    Ok(())
                }
                TransportState::Failed => Err(SessionError::negotiation(
                    &self.remote,
                    "transport failed",
                )),
                TransportState::Closed => Err(SessionError::negotiation(
                    &self.remote,
                    "transport closed unexpectedly",
                )),
                TransportState::New | TransportState::Connecting => Ok(()),
            },

            TransportEvent::TrackReceived(track) => {
                let _ = self.ctx.events.send(SessionEvent::RemoteTrack {
                    remote: self.remote.clone(),
                    generation: self.generation,
                    track,
                });
                Ok(())
            }
        }
    }

    async fn replace_track(&mut self, track: LocalTrack) {
        let Some(slot) = self.tracks.iter().position(|t| t.kind == track.kind) else {
            self.tracks.push(track);
            return;
        };
        let old = std::mem::replace(&mut self.tracks[slot], track.clone());
        if old == track || !self.tracks_attached {
            return;
        }
        let Some(transport) = self.transport.clone() else {
            return;
        };
        if let Err(e) = transport.replace_track(&old, &track).await {
            warn!(
                "Failed to replace track {} with {} for {}: {}",
                old.id, track.id, self.remote, e
            );
        }
    }

    /// Пересоздать транспорт и заново сделать offer, пока позволяет политика.
    async fn recover(&mut self, mut err: SessionError) {
        loop {
            warn!("{}", err);
            self.recovery_attempts += 1;
            if !self.ctx.retry.allows(self.recovery_attempts) {
                let exhausted = SessionError::RetriesExhausted {
                    remote: self.remote.clone(),
                    attempts: self.recovery_attempts - 1,
                };
                error!("{}", exhausted);
                self.close_error = Some(exhausted);
                self.state = SessionState::Closed;
                return;
            }

            self.set_state(SessionState::Reconnecting);
            self.discard_transport().await;
            // кандидаты прошлого согласования новому транспорту не нужны
            self.queued_candidates.clear();
            tokio::time::sleep(self.ctx.retry.delay).await;

            match self.start_offer().await {
                Ok(()) => return,
                Err(e) => err = e,
            }
        }
    }

    async fn fresh_transport(&mut self) -> Result<Arc<dyn PeerTransport>, SessionError> {
        self.discard_transport().await;

        let (tx, rx) = mpsc::unbounded_channel();
        let transport = self
            .ctx
            .transports
            .create(&self.remote, tx)
            .await
            .map_err(|e| SessionError::negotiation(&self.remote, e))?;

        self.transport = Some(transport.clone());
        self.transport_events = Some(rx);
        Ok(transport)
    }

    async fn attach_tracks(&mut self, transport: &Arc<dyn PeerTransport>) -> Result<(), SessionError> {
        if self.tracks_attached {
            return Ok(());
        }
        for track in &self.tracks {
            transport
                .add_track(track)
                .await
                .map_err(|e| SessionError::negotiation(&self.remote, e))?;
        }
        self.tracks_attached = true;
        Ok(())
    }

    async fn discard_transport(&mut self) {
        self.transport_events = None;
        self.tracks_attached = false;
        self.remote_description_applied = false;
        self.pending_local_description = None;

        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Error closing transport to {}: {}", self.remote, e);
            }
        }
    }

    async fn shutdown(&mut self) {
        self.discard_transport().await;
        self.state = SessionState::Closed;
        info!("Session with {} closed", self.remote);

        let _ = self.ctx.events.send(SessionEvent::Closed {
            remote: self.remote.clone(),
            generation: self.generation,
            error: self.close_error.take(),
        });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!("Session {}: {:?} -> {:?}", self.remote, self.state, state);
        self.state = state;
        let _ = self.ctx.events.send(SessionEvent::StateChanged {
            remote: self.remote.clone(),
            generation: self.generation,
            state,
        });
    }

    fn emit_quality(&self, quality: ConnectionQuality) {
        let _ = self.ctx.events.send(SessionEvent::LinkQuality {
            remote: self.remote.clone(),
            generation: self.generation,
            quality,
        });
    }
}

async fn next_transport_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Владение запущенной сессией на стороне координатора.
pub struct SessionHandle {
    pub remote: ParticipantId,
    pub generation: u64,
    pub state: SessionState,
    inbox: mpsc::UnboundedSender<SessionInput>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn spawn(
        remote: ParticipantId,
        generation: u64,
        tracks: Vec<LocalTrack>,
        ctx: SessionContext,
    ) -> Self {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = watch::channel(false);

        let session = PeerNegotiationSession::new(remote.clone(), generation, tracks, ctx);
        let task = tokio::spawn(session.run(inbox_rx, cancel_rx));

        Self {
            remote,
            generation,
            state: SessionState::Idle,
            inbox,
            cancel,
            task,
        }
    }

    pub fn send(&self, input: SessionInput) {
        if self.inbox.send(input).is_err() {
            debug!("Session with {} already stopped", self.remote);
        }
    }

    /// Отменить текущий шаг, закрыть транспорт и дождаться задачи.
    pub async fn close(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            error!("Session task for {} failed: {}", self.remote, e);
        }
    }
}
