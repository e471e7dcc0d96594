use confer_client::{CallError, ReceivedChat};
use confer_core::{ParticipantId, SignalMessage};
use std::time::Duration;

use crate::integration::{init_tracing, start_call};
use crate::utils::{ObserverEvent, WAIT_TIMEOUT_MS};

#[tokio::test]
async fn test_chat_is_relayed_both_ways() {
    init_tracing();

    let call = start_call("alice", Duration::from_secs(30)).await;

    call.handle.send_chat("hello room").expect("running");
    call.deliver(SignalMessage::ChatMessage {
        message: "hi alice".to_string(),
        user_id: Some(ParticipantId::from("bob")),
        user_name: Some("Bob".to_string()),
    });

    let expected = ReceivedChat {
        from: Some(ParticipantId::from("bob")),
        user_name: Some("Bob".to_string()),
        text: "hi alice".to_string(),
    };
    let received = call
        .observer
        .wait_for(WAIT_TIMEOUT_MS, |e| {
            matches!(e, ObserverEvent::Chat(chat) if *chat == expected)
        })
        .await;
    assert!(received);

    let sent = call
        .signaling
        .sent()
        .await
        .into_iter()
        .any(|m| matches!(m, SignalMessage::ChatMessage { message, .. } if message == "hello room"));
    assert!(sent);

    call.handle.leave().await;
}

#[tokio::test]
async fn test_hub_error_is_surfaced() {
    init_tracing();

    let call = start_call("alice", Duration::from_secs(30)).await;
    call.deliver(SignalMessage::Error {
        message: "Room is full".to_string(),
    });

    let surfaced = call
        .observer
        .wait_for(WAIT_TIMEOUT_MS, |e| {
            matches!(e, ObserverEvent::Error(CallError::Remote(m)) if m == "Room is full")
        })
        .await;
    assert!(surfaced);

    call.handle.leave().await;
}
