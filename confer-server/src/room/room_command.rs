use confer_core::{ParticipantId, Signal, UserAction};
use tokio::sync::oneshot;

/// Ответ комнаты на `RoomCommand::Join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Admitted,
    RoomFull,
    /// Комната уже опустела и завершается: нужно взять новую у `RoomManager`.
    RoomClosed,
}

/// Команды, поступающие в комнату от WebSocket обработчика.
#[derive(Debug)]
pub enum RoomCommand {
    /// Новое соединение участника. Повторный вход с тем же id
    /// переносит участника на новое соединение.
    Join {
        participant: ParticipantId,
        user_name: String,
        conn_id: u64,
        reply: oneshot::Sender<JoinOutcome>,
    },

    /// Соединение закрыто. Игнорируется, если участник уже перешёл на другое.
    Leave {
        participant: ParticipantId,
        conn_id: u64,
    },

    /// `webrtc_signal`: адресату, либо всем остальным, если адресат не указан.
    Signal {
        from: ParticipantId,
        signal: Signal,
        target: Option<ParticipantId>,
    },

    Action {
        from: ParticipantId,
        action: UserAction,
        value: Option<serde_json::Value>,
    },

    Chat {
        from: ParticipantId,
        message: String,
    },

    UserInfo {
        from: ParticipantId,
        user_name: String,
    },

    GetParticipants {
        from: ParticipantId,
    },
}
