use async_trait::async_trait;
use confer_client::{CallError, CallObserver, CallStatus, ReceivedChat, RemoteTrack};
use confer_core::{ConnectionQuality, Participant, ParticipantId};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::wait::wait_until;

#[derive(Debug, Clone)]
pub enum ObserverEvent {
    Participants(Vec<Participant>),
    MediaAttached(ParticipantId, String),
    MediaDetached(ParticipantId),
    Status(CallStatus, ConnectionQuality),
    Chat(ReceivedChat),
    Error(CallError),
}

/// Mock CallObserver that records every callback.
#[derive(Clone, Default)]
pub struct MockObserver {
    events: Arc<Mutex<Vec<ObserverEvent>>>,
}

impl MockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().await.clone()
    }

    /// The last participant snapshot delivered, if any.
    pub async fn latest_participants(&self) -> Option<Vec<Participant>> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|e| match e {
                ObserverEvent::Participants(list) => Some(list.clone()),
                _ => None,
            })
    }

    /// Remote participant from the latest snapshot.
    pub async fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.latest_participants()
            .await?
            .into_iter()
            .find(|p| &p.id == id)
    }

    pub async fn statuses(&self) -> Vec<(CallStatus, ConnectionQuality)> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::Status(status, quality) => Some((*status, *quality)),
                _ => None,
            })
            .collect()
    }

    pub async fn errors(&self) -> Vec<CallError> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn detached(&self) -> Vec<ParticipantId> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::MediaDetached(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until a recorded event matches `predicate`.
    pub async fn wait_for<F>(&self, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&ObserverEvent) -> bool,
    {
        wait_until(timeout_ms, || async { self.events.lock().await.iter().any(&predicate) }).await
    }

    /// Wait until the latest snapshot satisfies `predicate`.
    pub async fn wait_for_participants<F>(&self, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&[Participant]) -> bool,
    {
        wait_until(timeout_ms, || async {
            self.latest_participants()
                .await
                .is_some_and(|list| predicate(&list))
        })
        .await
    }

    async fn push(&self, event: ObserverEvent) {
        self.events.lock().await.push(event);
    }
}

#[async_trait]
impl CallObserver for MockObserver {
    async fn on_participants_changed(&self, participants: &[Participant]) {
        self.push(ObserverEvent::Participants(participants.to_vec()))
            .await;
    }

    async fn on_media_attached(&self, participant: &ParticipantId, track: RemoteTrack) {
        self.push(ObserverEvent::MediaAttached(participant.clone(), track.id))
            .await;
    }

    async fn on_media_detached(&self, participant: &ParticipantId) {
        self.push(ObserverEvent::MediaDetached(participant.clone()))
            .await;
    }

    async fn on_status_changed(&self, status: CallStatus, quality: ConnectionQuality) {
        self.push(ObserverEvent::Status(status, quality)).await;
    }

    async fn on_chat_message(&self, message: &ReceivedChat) {
        self.push(ObserverEvent::Chat(message.clone())).await;
    }

    async fn on_error(&self, error: &CallError) {
        self.push(ObserverEvent::Error(error.clone())).await;
    }
}
