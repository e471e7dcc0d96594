use crate::room::room_command::{JoinOutcome, RoomCommand};
use crate::room::room_manager::RoomSlot;
use crate::signaling::SignalingOutput;
use confer_core::{ParticipantId, ParticipantInfo, Signal, SignalMessage, UserAction};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Member {
    info: ParticipantInfo,
    conn_id: u64,
}

/// Запись комнаты в реестре `RoomManager`: опустевшая комната удаляет себя сама.
pub(crate) struct Registration {
    pub rooms: Arc<DashMap<String, RoomSlot>>,
    pub generation: u64,
}

/// Актор одной комнаты: список участников в порядке входа и ретрансляция сообщений.
pub struct Room {
    room_id: String,
    members: Vec<Member>,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    max_participants: usize,
    registration: Option<Registration>,
}

impl Room {
    pub fn new(
        room_id: impl Into<String>,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        max_participants: usize,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            members: Vec::new(),
            command_rx,
            signaling,
            max_participants,
            registration: None,
        }
    }

    pub(crate) fn registered(mut self, registration: Registration) -> Self {
        self.registration = Some(registration);
        self
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        loop {
            match self.command_rx.recv().await {
                Some(cmd) => {
                    self.handle_command(cmd).await;
                    if self.members.is_empty() && self.retire() {
                        break;
                    }
                }
                None => {
                    info!("Command channel closed. Shutting down room.");
                    break;
                }
            }
        }

        info!("Room {} event loop finished", self.room_id);
    }

    /// Снимает пустую комнату с учёта. Команды, успевшие попасть в очередь,
    /// дочитываются: входящим отвечаем `RoomClosed`.
    fn retire(&mut self) -> bool {
        let Some(registration) = &self.registration else {
            return false;
        };

        let generation = registration.generation;
        registration
            .rooms
            .remove_if(&self.room_id, |_, slot| slot.generation == generation);

        self.command_rx.close();
        while let Ok(cmd) = self.command_rx.try_recv() {
            if let RoomCommand::Join { reply, .. } = cmd {
                let _ = reply.send(JoinOutcome::RoomClosed);
            }
        }

        info!("Room {} is empty, removed", self.room_id);
        true
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                participant,
                user_name,
                conn_id,
                reply,
            } => {
                let outcome = self.join(participant, user_name, conn_id).await;
                let _ = reply.send(outcome);
            }

            RoomCommand::Leave {
                participant,
                conn_id,
            } => self.leave(&participant, conn_id).await,

            RoomCommand::Signal {
                from,
                signal,
                target,
            } => self.relay_signal(from, signal, target).await,

            RoomCommand::Action {
                from,
                action,
                value,
            } => self.relay_action(from, action, value).await,

            RoomCommand::Chat { from, message } => {
                let Some(member) = self.member(&from) else {
                    warn!("Chat message from non-member {}", from);
                    return;
                };
                let msg = SignalMessage::ChatMessage {
                    message,
                    user_id: Some(from.clone()),
                    user_name: Some(member.info.user_name.clone()),
                };
                self.broadcast(msg, Some(&from)).await;
            }

            RoomCommand::UserInfo { from, user_name } => {
                let Some(member) = self.members.iter_mut().find(|m| m.info.user_id == from) else {
                    return;
                };
                info!("User {} renamed to {}", from, user_name);
                member.info.user_name = user_name;
            }

            RoomCommand::GetParticipants { from } => {
                if self.member(&from).is_some() {
                    self.send_participants(&from).await;
                }
            }
        }
    }

    async fn join(&mut self, participant: ParticipantId, user_name: String, conn_id: u64) -> JoinOutcome {
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.info.user_id == participant)
        {
            info!("User {} reconnected to room {}", participant, self.room_id);
            member.conn_id = conn_id;
            member.info.user_name = user_name;
            self.send_participants(&participant).await;
            return JoinOutcome::Admitted;
        }

        if self.members.len() >= self.max_participants {
            warn!(
                "Room {} is full ({}), rejecting {}",
                self.room_id, self.max_participants, participant
            );
            return JoinOutcome::RoomFull;
        }

        info!("User {} joined room {}", participant, self.room_id);
        let mut info = ParticipantInfo::new(participant.clone(), user_name.clone());
        info.role = Some("participant".to_owned());
        self.members.push(Member { info, conn_id });

        self.send_participants(&participant).await;

        let msg = SignalMessage::UserJoined {
            user_id: participant.clone(),
            user_name: Some(user_name),
            room_id: Some(self.room_id.clone()),
            participants_count: Some(self.members.len()),
        };
        self.broadcast(msg, Some(&participant)).await;

        JoinOutcome::Admitted
    }

    async fn leave(&mut self, participant: &ParticipantId, conn_id: u64) {
        let Some(index) = self
            .members
            .iter()
            .position(|m| &m.info.user_id == participant && m.conn_id == conn_id)
        else {
            debug!("Ignoring stale leave of {} (conn {})", participant, conn_id);
            return;
        };

        let member = self.members.remove(index);
        info!("User {} left room {}", participant, self.room_id);

        let msg = SignalMessage::UserLeft {
            user_id: participant.clone(),
            user_name: Some(member.info.user_name),
            room_id: Some(self.room_id.clone()),
            participants_count: Some(self.members.len()),
        };
        self.broadcast(msg, None).await;
    }

    async fn relay_signal(&self, from: ParticipantId, signal: Signal, target: Option<ParticipantId>) {
        if self.member(&from).is_none() {
            warn!("Signal from non-member {}", from);
            return;
        }

        debug!(
            "Relaying {:?} from {} to {:?}",
            signal.signal_type(),
            from,
            target
        );
        let msg = SignalMessage::WebRtcSignal {
            signal,
            target_user_id: target.clone(),
            from_user_id: Some(from.clone()),
        };

        match target {
            Some(target) if self.member(&target).is_some() => {
                self.signaling.send_to(&target, msg).await;
            }
            Some(target) => warn!("Signal target {} not found in room {}", target, self.room_id),
            None => self.broadcast(msg, Some(&from)).await,
        }
    }

    async fn relay_action(
        &mut self,
        from: ParticipantId,
        action: UserAction,
        value: Option<serde_json::Value>,
    ) {
        let Some(member) = self.members.iter_mut().find(|m| m.info.user_id == from) else {
            warn!("Action from non-member {}", from);
            return;
        };

        let info = &mut member.info;
        match action {
            UserAction::Mute => info.is_audio_muted = true,
            UserAction::Unmute => info.is_audio_muted = false,
            UserAction::VideoOn => info.is_video_enabled = true,
            UserAction::VideoOff => info.is_video_enabled = false,
            UserAction::ScreenShareStart => info.is_screen_sharing = true,
            UserAction::ScreenShareStop => info.is_screen_sharing = false,
            UserAction::Unknown => {
                debug!("Dropping unknown action from {}", from);
                return;
            }
        }

        let user_name = info.user_name.clone();

        let msg = SignalMessage::UserAction {
            action,
            value,
            user_id: Some(from.clone()),
            user_name: Some(user_name),
        };
        self.broadcast(msg, Some(&from)).await;
    }

    async fn send_participants(&self, to: &ParticipantId) {
        let msg = SignalMessage::ParticipantsList {
            participants: self.members.iter().map(|m| m.info.clone()).collect(),
            your_id: Some(to.clone()),
            room_id: Some(self.room_id.clone()),
        };
        self.signaling.send_to(to, msg).await;
    }

    async fn broadcast(&self, msg: SignalMessage, except: Option<&ParticipantId>) {
        for member in &self.members {
            if Some(&member.info.user_id) == except {
                continue;
            }
            self.signaling.send_to(&member.info.user_id, msg.clone()).await;
        }
    }

    fn member(&self, id: &ParticipantId) -> Option<&Member> {
        self.members.iter().find(|m| &m.info.user_id == id)
    }
}
