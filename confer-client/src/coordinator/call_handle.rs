use crate::config::CallConfig;
use crate::coordinator::call_command::CoordinatorHandle;
use crate::coordinator::call_observer::{CallObserver, CallStatus};
use crate::coordinator::coordinator::{CoordinatorParts, SessionCoordinator};
use crate::error::{CallError, ConnectError, JoinError};
use crate::media::MediaSource;
use crate::session::SessionState;
use crate::signaling::{SignalConnector, SignalingChannel, SignalingConfig};
use crate::transport::TransportFactory;
use confer_core::{ConnectionQuality, Participant, ParticipantId, SignalMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Внешние зависимости звонка.
#[derive(Clone)]
pub struct CallDeps {
    pub media: Arc<dyn MediaSource>,
    pub transports: Arc<dyn TransportFactory>,
    pub connector: Arc<dyn SignalConnector>,
    pub observer: Arc<dyn CallObserver>,
}

enum Phase {
    Idle,
    Joining {
        call_id: u64,
        cancel: watch::Sender<bool>,
    },
    Joined {
        call_id: u64,
        coordinator: CoordinatorHandle,
    },
}

struct HandleState {
    phase: Phase,
    next_call: u64,
}

/// Точка входа клиента: один активный звонок на хендл.
///
/// После `leave_call` или потери сигнального канала хендл снова
/// свободен и `join_call` можно вызвать повторно.
pub struct CallHandle {
    config: CallConfig,
    deps: CallDeps,
    local_id: ParticipantId,
    state: Arc<Mutex<HandleState>>,
}

impl CallHandle {
    pub fn new(config: CallConfig, deps: CallDeps) -> Self {
        let local_id = config.user_id.clone().unwrap_or_default();
        Self {
            config,
            deps,
            local_id,
            state: Arc::new(Mutex::new(HandleState {
                phase: Phase::Idle,
                next_call: 0,
            })),
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Joined { .. })
    }

    /// Захватить медиа, открыть сигнальный канал и запустить координатор.
    pub async fn join_call(&self, room_id: &str, display_name: &str) -> Result<(), JoinError> {
        let (cancel_tx, mut cancel) = watch::channel(false);
        let call_id = {
            let mut state = self.state.lock();
            if !matches!(state.phase, Phase::Idle) {
                return Err(JoinError::AlreadyJoined);
            }
            state.next_call += 1;
            let call_id = state.next_call;
            state.phase = Phase::Joining {
                call_id,
                cancel: cancel_tx,
            };
            call_id
        };

        info!("Joining room {} as {}", room_id, self.local_id);
        self.deps
            .observer
            .on_status_changed(CallStatus::Connecting, ConnectionQuality::Connecting)
            .await;

        let result = self.establish(call_id, room_id, display_name, &mut cancel).await;
        if let Err(e) = &result {
            warn!("Join to {} failed: {}", room_id, e);
            let mut state = self.state.lock();
            if matches!(state.phase, Phase::Joining { call_id: id, .. } if id == call_id) {
                state.phase = Phase::Idle;
            }
        }
        result
    }

    async fn establish(
        &self,
        call_id: u64,
        room_id: &str,
        display_name: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), JoinError> {
        let media = self.deps.media.clone();

        let tracks = match until_cancelled(cancel, media.acquire(&self.config.media)).await {
            None => {
                media.release().await;
                return Err(JoinError::Cancelled);
            }
            Some(result) => result.map_err(JoinError::MediaUnavailable)?,
        };

        let url = match self.config.signaling_url(room_id, &self.local_id, display_name) {
            Ok(url) => url,
            Err(e) => {
                media.release().await;
                return Err(JoinError::SignalingUnavailable(e));
            }
        };

        let signaling_config = SignalingConfig {
            url,
            reconnect: self.config.reconnect,
            handshake: vec![
                SignalMessage::UserInfo {
                    user_name: display_name.to_owned(),
                },
                SignalMessage::GetParticipants,
            ],
        };
        let timeout = self.config.join_timeout;
        let connect = tokio::time::timeout(
            timeout,
            SignalingChannel::connect(signaling_config, self.deps.connector.clone()),
        );

        let (signaling, signal_events) = match until_cancelled(cancel, connect).await {
            None => {
                media.release().await;
                return Err(JoinError::Cancelled);
            }
            Some(Err(_elapsed)) => {
                media.release().await;
                return Err(JoinError::SignalingUnavailable(ConnectError::Timeout(timeout)));
            }
            Some(Ok(Err(e))) => {
                media.release().await;
                return Err(JoinError::SignalingUnavailable(e));
            }
            Some(Ok(Ok(channel))) => channel,
        };

        let (coordinator, handle) = SessionCoordinator::new(CoordinatorParts {
            local: Participant::local(self.local_id.clone(), display_name),
            tracks,
            signaling: Arc::new(signaling.clone()),
            signal_events,
            media: media.clone(),
            transports: self.deps.transports.clone(),
            observer: self.deps.observer.clone(),
            heartbeat_period: self.config.heartbeat_period,
            peer_retry: self.config.peer_retry,
            video: self.config.media.video,
        });

        {
            let mut state = self.state.lock();
            let still_joining = matches!(
                state.phase,
                Phase::Joining { call_id: id, .. } if id == call_id
            );
            if still_joining && !*cancel.borrow() {
                state.phase = Phase::Joined {
                    call_id,
                    coordinator: handle,
                };

                let shared = self.state.clone();
                tokio::spawn(async move {
                    coordinator.run().await;
                    let mut state = shared.lock();
                    if matches!(state.phase, Phase::Joined { call_id: id, .. } if id == call_id) {
                        state.phase = Phase::Idle;
                    }
                });

                info!("Joined room {}", room_id);
                return Ok(());
            }
        }

        // leave пришёл между подключением и запуском координатора
        drop(coordinator);
        signaling.close_channel().await;
        media.release().await;
        Err(JoinError::Cancelled)
    }

    /// Покинуть звонок. Идемпотентно; прерывает незавершённый `join_call`.
    pub async fn leave_call(&self) {
        let coordinator = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut state.phase, Phase::Idle) {
                Phase::Idle => return,
                Phase::Joining { cancel, .. } => {
                    info!("Cancelling join in progress");
                    let _ = cancel.send(true);
                    return;
                }
                Phase::Joined { coordinator, .. } => coordinator,
            }
        };

        coordinator.leave().await;
        info!("Left call");
    }

    fn coordinator(&self) -> Result<CoordinatorHandle, CallError> {
        match &self.state.lock().phase {
            Phase::Joined { coordinator, .. } => Ok(coordinator.clone()),
            _ => Err(CallError::NotJoined),
        }
    }

    /// Новое состояние: `true`, если микрофон выключен.
    pub async fn toggle_mute(&self) -> Result<bool, CallError> {
        self.coordinator()?.toggle_mute().await
    }

    /// Новое состояние: `true`, если камера включена.
    pub async fn toggle_video(&self) -> Result<bool, CallError> {
        self.coordinator()?.toggle_video().await
    }

    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        self.coordinator()?.toggle_screen_share().await
    }

    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.coordinator()?.send_chat(text)
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, CallError> {
        self.coordinator()?.participants().await
    }

    pub async fn session_states(&self) -> Result<HashMap<ParticipantId, SessionState>, CallError> {
        self.coordinator()?.session_states().await
    }
}

/// `None`, если ожидание прервал `leave_call`.
async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.wait_for(|cancelled| *cancelled) => None,
        out = fut => Some(out),
    }
}
