use crate::room::room::Registration;
use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::info;

pub struct RoomSlot {
    pub(crate) generation: u64,
    tx: mpsc::Sender<RoomCommand>,
}

/// Реестр комнат: комната создаётся при первом входе и удаляет себя, опустев.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<String, RoomSlot>>,
    generations: Arc<AtomicU64>,
    signaling: Arc<dyn SignalingOutput>,
    max_participants: usize,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>, max_participants: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(1)),
            signaling,
            max_participants,
        }
    }

    pub fn get_room_sender(&self, room_id: &str) -> mpsc::Sender<RoomCommand> {
        self.rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| self.spawn_room(room_id))
            .tx
            .clone()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    fn spawn_room(&self, room_id: &str) -> RoomSlot {
        info!("Creating new room: {}", room_id);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(100);

        let room = Room::new(room_id, rx, self.signaling.clone(), self.max_participants).registered(
            Registration {
                rooms: self.rooms.clone(),
                generation,
            },
        );
        tokio::spawn(room.run());

        RoomSlot { generation, tx }
    }
}
