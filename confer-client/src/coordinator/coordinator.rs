use crate::config::PeerRetryPolicy;
use crate::coordinator::call_command::{CallCommand, CoordinatorHandle};
use crate::coordinator::call_observer::{CallObserver, CallStatus, ReceivedChat};
use crate::error::{CallError, SignalingError};
use crate::heartbeat::HeartbeatMonitor;
use crate::media::{LocalTrack, MediaSource, TrackSource, VideoConstraints};
use crate::quality::QualityAdapter;
use crate::session::{SessionContext, SessionEvent, SessionHandle, SessionInput};
use crate::signaling::{SignalEvent, SignalEvents, SignalingOutput};
use crate::transport::TransportFactory;
use confer_core::{
    ConnectionQuality, ConnectionState, Participant, ParticipantId, ParticipantInfo, Signal,
    SignalMessage, UserAction,
};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Всё, из чего собирается координатор одного звонка.
pub struct CoordinatorParts {
    pub local: Participant,
    pub tracks: Vec<LocalTrack>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub signal_events: SignalEvents,
    pub media: Arc<dyn MediaSource>,
    pub transports: Arc<dyn TransportFactory>,
    pub observer: Arc<dyn CallObserver>,
    pub heartbeat_period: Duration,
    pub peer_retry: PeerRetryPolicy,
    /// Ограничения видео, с которыми захвачена камера.
    pub video: Option<VideoConstraints>,
}

#[derive(Default)]
struct LocalTracks {
    audio: Option<LocalTrack>,
    camera: Option<LocalTrack>,
    screen: Option<LocalTrack>,
}

impl LocalTracks {
    fn from_acquired(tracks: Vec<LocalTrack>) -> Self {
        let mut local = Self::default();
        for track in tracks {
            match track.source {
                TrackSource::Microphone => local.audio = Some(track),
                TrackSource::Camera => local.camera = Some(track),
                TrackSource::Screen => local.screen = Some(track),
            }
        }
        local
    }

    /// Текущий исходящий набор: звук и экран вместо камеры, если он показывается.
    fn outgoing(&self) -> Vec<LocalTrack> {
        let video = self.screen.as_ref().or(self.camera.as_ref());
        self.audio.iter().chain(video).cloned().collect()
    }
}

/// Единственный владелец состояния звонка.
///
/// Один цикл разбирает команды, события сигнального канала, события
/// сессий и тики heartbeat, поэтому реестры не требуют блокировок.
pub struct SessionCoordinator {
    local: Participant,
    status: CallStatus,
    participants: BTreeMap<ParticipantId, Participant>,
    sessions: HashMap<ParticipantId, SessionHandle>,
    next_generation: u64,
    tracks: LocalTracks,
    session_ctx: SessionContext,
    signaling: Arc<dyn SignalingOutput>,
    media: Arc<dyn MediaSource>,
    observer: Arc<dyn CallObserver>,
    heartbeat: HeartbeatMonitor,
    quality: QualityAdapter,
    command_rx: mpsc::UnboundedReceiver<CallCommand>,
    command_tx: mpsc::WeakUnboundedSender<CallCommand>,
    signal_events: SignalEvents,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionCoordinator {
    pub fn new(parts: CoordinatorParts) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        let session_ctx = SessionContext {
            local_id: parts.local.id.clone(),
            transports: parts.transports,
            signaling: parts.signaling.clone(),
            events: session_tx,
            retry: parts.peer_retry,
        };

        let coordinator = Self {
            local: parts.local,
            status: CallStatus::Connected,
            participants: BTreeMap::new(),
            sessions: HashMap::new(),
            next_generation: 0,
            tracks: LocalTracks::from_acquired(parts.tracks),
            session_ctx,
            signaling: parts.signaling,
            media: parts.media,
            observer: parts.observer,
            heartbeat: HeartbeatMonitor::new(parts.heartbeat_period, Instant::now()),
            quality: QualityAdapter::new(parts.video),
            command_rx,
            command_tx: command_tx.downgrade(),
            signal_events: parts.signal_events,
            session_rx,
        };

        (coordinator, CoordinatorHandle::new(command_tx))
    }

    pub async fn run(mut self) {
        info!("Call coordinator started for {}", self.local.id);

        self.local.connection_state = ConnectionState::Connected;
        self.notify_participants().await;
        self.observer
            .on_status_changed(self.status, self.heartbeat.quality())
            .await;

        // первый тик сразу
        let mut ticker = tokio::time::interval(self.heartbeat.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(CallCommand::Leave { reply }) => {
                        info!("Leaving call");
                        self.teardown(CallStatus::Left).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("Call handle dropped. Leaving call.");
                        self.teardown(CallStatus::Left).await;
                        break;
                    }
                },

                event = self.signal_events.recv() => match event {
                    Some(SignalEvent::Lost(err)) => {
                        self.observer.on_error(&CallError::Signaling(err)).await;
                        self.teardown(CallStatus::Disconnected).await;
                        break;
                    }
                    Some(event) => self.handle_signal_event(event).await,
                    None => {
                        warn!("Signaling events ended unexpectedly");
                        self.teardown(CallStatus::Disconnected).await;
                        break;
                    }
                },

                Some(event) = self.session_rx.recv() => self.handle_session_event(event).await,

                _ = ticker.tick() => self.heartbeat_tick().await,
            }
        }

        info!("Call coordinator finished");
    }

    async fn handle_command(&mut self, cmd: CallCommand) {
        match cmd {
            CallCommand::ToggleMute { reply } => {
                let muted = self.toggle_mute().await;
                let _ = reply.send(muted);
            }
            CallCommand::ToggleVideo { reply } => {
                let enabled = self.toggle_video().await;
                let _ = reply.send(enabled);
            }
            CallCommand::ToggleScreenShare { reply } => {
                let result = self.toggle_screen_share().await;
                let _ = reply.send(result);
            }
            CallCommand::ScreenTrackEnded { track_id } => {
                let current = self.tracks.screen.as_ref().map(|t| t.id.as_str());
                if current == Some(track_id.as_str()) {
                    info!("Screen capture ended by the source");
                    self.stop_screen_share().await;
                }
            }
            CallCommand::SendChat { text } => {
                self.signaling
                    .send(SignalMessage::ChatMessage {
                        message: text,
                        user_id: None,
                        user_name: None,
                    })
                    .await;
            }
            CallCommand::Participants { reply } => {
                let _ = reply.send(self.snapshot());
            }
            CallCommand::SessionStates { reply } => {
                let states = self
                    .sessions
                    .iter()
                    .map(|(id, session)| (id.clone(), session.state))
                    .collect();
                let _ = reply.send(states);
            }
            CallCommand::Leave { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_signal_event(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::Message(message) => self.handle_message(message).await,
            SignalEvent::Reconnecting { attempt } => {
                debug!("Signaling reconnect attempt {}", attempt);
                self.set_status(CallStatus::Reconnecting).await;
            }
            SignalEvent::Reconnected => {
                self.heartbeat.reset(Instant::now());
                self.set_status(CallStatus::Connected).await;
            }
            SignalEvent::Lost(_) => {}
        }
    }

    async fn handle_message(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::ParticipantsList { participants, .. } => {
                self.reconcile(participants).await;
            }

            SignalMessage::UserJoined {
                user_id, user_name, ..
            } => {
                self.on_user_joined(user_id, user_name).await;
            }

            SignalMessage::UserLeft { user_id, .. } => {
                if self.drop_participant(&user_id).await {
                    self.notify_participants().await;
                }
            }

            SignalMessage::WebRtcSignal {
                signal,
                from_user_id,
                ..
            } => {
                self.route_signal(from_user_id, signal).await;
            }

            SignalMessage::UserAction {
                action, user_id, ..
            } => {
                self.apply_action(user_id, action).await;
            }

            SignalMessage::ChatMessage {
                message,
                user_id,
                user_name,
            } => {
                let chat = ReceivedChat {
                    from: user_id,
                    user_name,
                    text: message,
                };
                self.observer.on_chat_message(&chat).await;
            }

            SignalMessage::Ping => self.signaling.send(SignalMessage::Pong).await,

            SignalMessage::Pong => {
                if let Some(quality) = self.heartbeat.pong_received(Instant::now()) {
                    self.on_link_quality(quality).await;
                }
            }

            SignalMessage::Error { message } => {
                warn!("Hub reported error: {}", message);
                self.observer.on_error(&CallError::Remote(message)).await;
            }

            other @ (SignalMessage::UserInfo { .. } | SignalMessage::GetParticipants) => {
                debug!("Ignoring {} from hub", other.kind());
            }
        }
    }

    async fn on_user_joined(&mut self, id: ParticipantId, name: Option<String>) {
        if id == self.local.id {
            return;
        }

        match self.participants.get_mut(&id) {
            Some(participant) => {
                if let Some(name) = name {
                    participant.display_name = name;
                }
            }
            None => {
                info!("User {} joined", id);
                let name = name.unwrap_or_else(|| id.to_string());
                self.participants
                    .insert(id.clone(), Participant::remote(id.clone(), name));
            }
        }

        if !self.sessions.contains_key(&id) {
            self.open_session(&id, true);
        }
        self.notify_participants().await;
    }

    /// Привести реестр к списку хаба: новых добавить, известных обновить,
    /// отсутствующих убрать.
    async fn reconcile(&mut self, list: Vec<ParticipantInfo>) {
        let listed: HashSet<ParticipantId> = list.iter().map(|p| p.user_id.clone()).collect();
        let stale: Vec<ParticipantId> = self
            .participants
            .keys()
            .filter(|id| !listed.contains(*id))
            .cloned()
            .collect();

        for id in &stale {
            self.drop_participant(id).await;
        }

        for info in list {
            if info.user_id == self.local.id {
                continue;
            }
            let media = info.media_flags();

            match self.participants.get_mut(&info.user_id) {
                Some(participant) => {
                    participant.display_name = info.user_name;
                    participant.media = media;
                }
                None => {
                    let mut participant =
                        Participant::remote(info.user_id.clone(), info.user_name);
                    participant.media = media;
                    self.participants.insert(info.user_id.clone(), participant);
                }
            }

            if !self.sessions.contains_key(&info.user_id) {
                self.open_session(&info.user_id, true);
            }
        }

        debug!(
            "Participants reconciled: {} remote, {} removed",
            self.participants.len(),
            stale.len()
        );
        self.notify_participants().await;
    }

    async fn route_signal(&mut self, from: Option<ParticipantId>, signal: Signal) {
        let Some(from) = from else {
            let err = SignalingError::MalformedMessage("webrtc_signal without sender".to_owned());
            warn!("{}; dropping", err);
            return;
        };
        if from == self.local.id {
            debug!("Ignoring echoed {:?}", signal.signal_type());
            return;
        }

        if let Some(session) = self.sessions.get(&from) {
            session.send(SessionInput::Signal(signal));
            return;
        }

        if let Signal::Answer { .. } = signal {
            debug!("Ignoring answer from {} without a session", from);
            return;
        }

        if !self.participants.contains_key(&from) {
            info!("First {:?} from unknown user {}", signal.signal_type(), from);
            self.participants
                .insert(from.clone(), Participant::remote(from.clone(), from.to_string()));
            self.notify_participants().await;
        }

        let session = self.open_session(&from, false);
        session.send(SessionInput::Signal(signal));
    }

    async fn apply_action(&mut self, user_id: Option<ParticipantId>, action: UserAction) {
        let Some(participant) = user_id.and_then(|id| self.participants.get_mut(&id)) else {
            return;
        };

        match action {
            UserAction::Mute => participant.media.muted = true,
            UserAction::Unmute => participant.media.muted = false,
            UserAction::VideoOn => participant.media.video_enabled = true,
            UserAction::VideoOff => participant.media.video_enabled = false,
            UserAction::ScreenShareStart => participant.media.screen_sharing = true,
            UserAction::ScreenShareStop => participant.media.screen_sharing = false,
            UserAction::Unknown => return,
        }
        self.notify_participants().await;
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        let current = self
            .sessions
            .get(event.remote())
            .map(|session| session.generation);
        if current != Some(event.generation()) {
            debug!("Dropping event from superseded session with {}", event.remote());
            return;
        }

        match event {
            SessionEvent::StateChanged { remote, state, .. } => {
                if let Some(session) = self.sessions.get_mut(&remote) {
                    session.state = state;
                }
                if let Some(participant) = self.participants.get_mut(&remote) {
                    participant.connection_state = state.connection_state();
                    participant.quality = state.quality();
                }
                self.notify_participants().await;
            }

            SessionEvent::LinkQuality {
                remote, quality, ..
            } => {
                if let Some(participant) = self.participants.get_mut(&remote) {
                    participant.quality = quality;
                }
                self.notify_participants().await;
            }

            SessionEvent::RemoteTrack { remote, track, .. } => {
                info!("Media from {} attached: {}", remote, track.id);
                self.observer.on_media_attached(&remote, track).await;
            }

            SessionEvent::Closed { remote, error, .. } => {
                self.sessions.remove(&remote);
                let Some(err) = error else {
                    return;
                };
                if let Some(participant) = self.participants.get_mut(&remote) {
                    participant.connection_state = ConnectionState::Failed;
                    participant.quality = ConnectionQuality::Bad;
                }
                self.observer.on_error(&CallError::Session(err)).await;
                self.notify_participants().await;
            }
        }
    }

    async fn heartbeat_tick(&mut self) {
        let now = Instant::now();
        if self.signaling.is_ready() {
            self.signaling.send(SignalMessage::Ping).await;
            self.heartbeat.ping_sent(now);
        }
        if let Some(quality) = self.heartbeat.evaluate(now) {
            self.on_link_quality(quality).await;
        }
    }

    async fn on_link_quality(&mut self, quality: ConnectionQuality) {
        info!("Link quality now {:?}", quality);
        self.local.quality = quality;
        self.observer.on_status_changed(self.status, quality).await;

        if let Some(constraints) = self.quality.on_quality(quality) {
            if let Err(e) = self.media.apply_constraints(&constraints).await {
                warn!("Failed to apply video constraints: {}", e);
            }
        }
    }

    async fn toggle_mute(&mut self) -> bool {
        let muted = !self.local.media.muted;
        if let Some(audio) = &self.tracks.audio {
            audio.set_enabled(!muted);
        }
        self.local.media.muted = muted;

        let action = if muted {
            UserAction::Mute
        } else {
            UserAction::Unmute
        };
        self.signaling.send(SignalMessage::action(action)).await;
        self.notify_participants().await;
        muted
    }

    async fn toggle_video(&mut self) -> bool {
        let enabled = !self.local.media.video_enabled;
        if let Some(camera) = &self.tracks.camera {
            camera.set_enabled(enabled);
        }
        self.local.media.video_enabled = enabled;

        let action = if enabled {
            UserAction::VideoOn
        } else {
            UserAction::VideoOff
        };
        self.signaling.send(SignalMessage::action(action)).await;
        self.notify_participants().await;
        enabled
    }

    async fn toggle_screen_share(&mut self) -> Result<bool, CallError> {
        if self.tracks.screen.is_some() {
            self.stop_screen_share().await;
            return Ok(false);
        }

        let capture = self.media.acquire_screen().await?;
        let track = capture.track;
        info!("Screen share started: {}", track.id);

        for session in self.sessions.values() {
            session.send(SessionInput::ReplaceTrack(track.clone()));
        }
        self.watch_screen_end(track.id.clone(), capture.ended);
        self.tracks.screen = Some(track);

        self.local.media.screen_sharing = true;
        self.signaling
            .send(SignalMessage::action(UserAction::ScreenShareStart))
            .await;
        self.notify_participants().await;
        Ok(true)
    }

    async fn stop_screen_share(&mut self) {
        if self.tracks.screen.take().is_none() {
            return;
        }

        if let Some(camera) = &self.tracks.camera {
            for session in self.sessions.values() {
                session.send(SessionInput::ReplaceTrack(camera.clone()));
            }
        }
        self.media.stop_screen().await;
        info!("Screen share stopped");

        self.local.media.screen_sharing = false;
        self.signaling
            .send(SignalMessage::action(UserAction::ScreenShareStop))
            .await;
        self.notify_participants().await;
    }

    fn watch_screen_end(&self, track_id: String, ended: oneshot::Receiver<()>) {
        let commands = self.command_tx.clone();
        tokio::spawn(async move {
            // отправитель сброшен: показ остановили мы сами
            if ended.await.is_err() {
                return;
            }
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(CallCommand::ScreenTrackEnded { track_id });
            }
        });
    }

    fn open_session(&mut self, remote: &ParticipantId, offer: bool) -> &SessionHandle {
        self.next_generation += 1;
        let session = SessionHandle::spawn(
            remote.clone(),
            self.next_generation,
            self.tracks.outgoing(),
            self.session_ctx.clone(),
        );
        if offer {
            session.send(SessionInput::StartOffer);
        }

        self.sessions.entry(remote.clone()).insert_entry(session).into_mut()
    }

    /// Убрать участника и закрыть его сессию. `false`, если он не был известен.
    async fn drop_participant(&mut self, id: &ParticipantId) -> bool {
        if self.participants.remove(id).is_none() {
            debug!("Leave for unknown user {}", id);
            return false;
        }
        info!("User {} left", id);

        if let Some(session) = self.sessions.remove(id) {
            session.close().await;
        }
        self.observer.on_media_detached(id).await;
        true
    }

    async fn teardown(&mut self, status: CallStatus) {
        let sessions: Vec<SessionHandle> = self.sessions.drain().map(|(_, s)| s).collect();
        join_all(sessions.into_iter().map(SessionHandle::close)).await;

        let remotes: Vec<ParticipantId> = std::mem::take(&mut self.participants)
            .into_keys()
            .collect();
        for id in &remotes {
            self.observer.on_media_detached(id).await;
        }

        if self.tracks.screen.take().is_some() {
            self.media.stop_screen().await;
        }
        self.media.release().await;
        self.signaling.close().await;

        self.local.connection_state = ConnectionState::Closed;
        self.observer.on_participants_changed(&[]).await;
        self.set_status(status).await;

        if status == CallStatus::Disconnected {
            error!("Call dropped: signaling connection lost");
        }
    }

    async fn set_status(&mut self, status: CallStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.observer
            .on_status_changed(status, self.heartbeat.quality())
            .await;
    }

    fn snapshot(&self) -> Vec<Participant> {
        std::iter::once(&self.local)
            .chain(self.participants.values())
            .cloned()
            .collect()
    }

    async fn notify_participants(&self) {
        self.observer
            .on_participants_changed(&self.snapshot())
            .await;
    }
}
