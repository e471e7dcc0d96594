use crate::error::CallError;
use crate::session::SessionState;
use confer_core::{Participant, ParticipantId};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Команды координатору. Ответ, где он нужен, приходит через `reply`.
#[derive(Debug)]
pub enum CallCommand {
    /// Ответ: микрофон теперь выключен.
    ToggleMute { reply: oneshot::Sender<bool> },
    /// Ответ: камера теперь включена.
    ToggleVideo { reply: oneshot::Sender<bool> },
    /// Ответ: идёт ли показ экрана после переключения.
    ToggleScreenShare {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    /// Источник экрана остановился сам.
    ScreenTrackEnded { track_id: String },
    SendChat { text: String },
    Participants { reply: oneshot::Sender<Vec<Participant>> },
    SessionStates {
        reply: oneshot::Sender<HashMap<ParticipantId, SessionState>>,
    },
    Leave { reply: oneshot::Sender<()> },
}

/// Отправляющая сторона очереди команд координатора.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<CallCommand>,
}

impl CoordinatorHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<CallCommand>) -> Self {
        Self { commands }
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> CallCommand,
    ) -> Result<T, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| CallError::CoordinatorGone)?;
        rx.await.map_err(|_| CallError::CoordinatorGone)
    }

    pub async fn toggle_mute(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleMute { reply }).await
    }

    pub async fn toggle_video(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleVideo { reply }).await
    }

    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        self.request(|reply| CallCommand::ToggleScreenShare { reply })
            .await?
    }

    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.commands
            .send(CallCommand::SendChat { text: text.into() })
            .map_err(|_| CallError::CoordinatorGone)
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, CallError> {
        self.request(|reply| CallCommand::Participants { reply })
            .await
    }

    pub async fn session_states(&self) -> Result<HashMap<ParticipantId, SessionState>, CallError> {
        self.request(|reply| CallCommand::SessionStates { reply })
            .await
    }

    /// Завершить звонок и дождаться, пока координатор всё закроет.
    /// Если координатор уже остановился, возвращается сразу.
    pub async fn leave(&self) {
        let _ = self.request(|reply| CallCommand::Leave { reply }).await;
    }
}
