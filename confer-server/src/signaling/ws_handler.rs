use crate::hub::HubState;
use crate::room::{JoinOutcome, RoomCommand};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use confer_core::{ParticipantId, SignalMessage};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Код закрытия при отказе во входе ("try again later").
pub const ROOM_FULL_CLOSE_CODE: u16 = 1013;

const JOIN_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<WsParams>,
    State(state): State<HubState>,
) -> impl IntoResponse {
    let participant = params
        .user_id
        .filter(|id| !id.is_empty())
        .map(ParticipantId::from)
        .unwrap_or_default();
    let user_name = params
        .user_name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("User {}", participant));

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, participant, user_name, state))
}

async fn handle_socket(
    socket: WebSocket,
    room_id: String,
    participant: ParticipantId,
    user_name: String,
    state: HubState,
) {
    info!("New WebSocket connection: {} in room {}", participant, room_id);

    let conn_id = state.signaling.next_conn_id();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_peer(participant.clone(), conn_id, tx.clone());

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let room_tx = match join_room(&state, &room_id, &participant, user_name, conn_id).await {
        Ok(room_tx) => room_tx,
        Err(reason) => {
            reject(&tx, reason);
            drop(tx);

            let _ = send_task.await;
            state.signaling.remove_peer(&participant, conn_id);
            info!("WebSocket rejected: {} ({})", participant, reason);
            return;
        }
    };

    let mut recv_task = tokio::spawn({
        let participant = participant.clone();
        let room_tx = room_tx.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(SignalMessage::Ping) => {
                            if let Ok(json) = serde_json::to_string(&SignalMessage::Pong) {
                                let _ = tx.send(Message::Text(json.into()));
                            }
                        }
                        Ok(msg) => {
                            let Some(cmd) = into_command(&participant, msg) else {
                                continue;
                            };
                            if let Err(e) = room_tx.send(cmd).await {
                                error!("Room died: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid SignalMessage from {}: {}", participant, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = room_tx
        .send(RoomCommand::Leave {
            participant: participant.clone(),
            conn_id,
        })
        .await;
    state.signaling.remove_peer(&participant, conn_id);
    info!("WebSocket disconnected: {}", participant);
}

/// Отказ: `error` с причиной и закрытие с кодом 1013.
fn reject(tx: &mpsc::UnboundedSender<Message>, reason: &'static str) {
    let rejection = SignalMessage::Error {
        message: reason.to_owned(),
    };
    if let Ok(json) = serde_json::to_string(&rejection) {
        let _ = tx.send(Message::Text(json.into()));
    }
    let _ = tx.send(Message::Close(Some(CloseFrame {
        code: ROOM_FULL_CLOSE_CODE,
        reason: reason.into(),
    })));
}

async fn join_room(
    state: &HubState,
    room_id: &str,
    participant: &ParticipantId,
    user_name: String,
    conn_id: u64,
) -> Result<mpsc::Sender<RoomCommand>, &'static str> {
    for _ in 0..JOIN_ATTEMPTS {
        let room_tx = state.rooms.get_room_sender(room_id);
        let (reply, outcome) = oneshot::channel();
        let cmd = RoomCommand::Join {
            participant: participant.clone(),
            user_name: user_name.clone(),
            conn_id,
            reply,
        };
        if room_tx.send(cmd).await.is_err() {
            debug!("Room {} closed before join, retrying", room_id);
            continue;
        }

        match outcome.await {
            Ok(JoinOutcome::Admitted) => return Ok(room_tx),
            Ok(JoinOutcome::RoomFull) => return Err("Room is full"),
            Ok(JoinOutcome::RoomClosed) | Err(_) => {
                debug!("Room {} closed during join, retrying", room_id);
            }
        }
    }

    error!("Could not join room {} after {} attempts", room_id, JOIN_ATTEMPTS);
    Err("Room unavailable")
}

/// Сообщения клиента, которые обрабатывает комната. Серверные типы отбрасываются.
fn into_command(from: &ParticipantId, msg: SignalMessage) -> Option<RoomCommand> {
    let from = from.clone();
    let cmd = match msg {
        SignalMessage::UserInfo { user_name } => RoomCommand::UserInfo { from, user_name },
        SignalMessage::GetParticipants => RoomCommand::GetParticipants { from },
        SignalMessage::WebRtcSignal {
            signal,
            target_user_id,
            ..
        } => RoomCommand::Signal {
            from,
            signal,
            target: target_user_id,
        },
        SignalMessage::UserAction { action, value, .. } => RoomCommand::Action { from, action, value },
        SignalMessage::ChatMessage { message, .. } => RoomCommand::Chat { from, message },
        other => {
            warn!("Unexpected {} from {}", other.kind(), from);
            return None;
        }
    };
    Some(cmd)
}
