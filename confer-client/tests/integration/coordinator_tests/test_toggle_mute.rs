use confer_client::SessionState;
use confer_core::{ParticipantId, SignalMessage, SignalType, UserAction};
use std::time::Duration;

use crate::integration::{init_tracing, start_call};
use crate::utils::{WAIT_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_toggle_mute_sends_one_action_and_no_offer() {
    init_tracing();

    let call = start_call("alice", Duration::from_secs(30)).await;
    call.user_joined("bob", "Bob");

    let bob = ParticipantId::from("bob");
    let negotiated = wait_until(WAIT_TIMEOUT_MS, || async {
        call.handle
            .session_states()
            .await
            .is_ok_and(|s| s.get(&bob) == Some(&SessionState::AwaitingAnswer))
    })
    .await;
    assert!(negotiated);
    let offers_before = call.signaling.count_signals(&bob, SignalType::Offer).await;

    assert!(call.handle.toggle_mute().await.expect("running"));

    assert_eq!(call.signaling.count_kind("user_action").await, 1);
    assert_eq!(
        call.signaling.count_signals(&bob, SignalType::Offer).await,
        offers_before
    );

    let local = call
        .handle
        .participants()
        .await
        .expect("running")
        .into_iter()
        .find(|p| p.is_local)
        .expect("local participant");
    assert!(local.media.muted);

    assert!(!call.handle.toggle_mute().await.expect("running"));
    let actions: Vec<UserAction> = call
        .signaling
        .sent()
        .await
        .into_iter()
        .filter_map(|m| match m {
            SignalMessage::UserAction { action, .. } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(actions, vec![UserAction::Mute, UserAction::Unmute]);

    call.handle.leave().await;
}

#[tokio::test]
async fn test_toggle_video_flips_camera_track() {
    init_tracing();

    let call = start_call("alice", Duration::from_secs(30)).await;

    assert!(!call.handle.toggle_video().await.expect("running"));
    assert!(call.handle.toggle_video().await.expect("running"));
    assert_eq!(call.signaling.count_kind("user_action").await, 2);

    call.handle.leave().await;
}

#[tokio::test]
async fn test_remote_actions_update_flags_only() {
    init_tracing();

    let call = start_call("alice", Duration::from_secs(30)).await;
    call.user_joined("bob", "Bob");
    call.deliver(SignalMessage::UserAction {
        action: UserAction::VideoOff,
        value: None,
        user_id: Some(ParticipantId::from("bob")),
        user_name: Some("Bob".to_string()),
    });

    let bob = ParticipantId::from("bob");
    let updated = wait_until(WAIT_TIMEOUT_MS, || async {
        call.observer
            .participant(&bob)
            .await
            .is_some_and(|p| !p.media.video_enabled)
    })
    .await;
    assert!(updated);
    assert!(call.transports.created_count() <= 1, "no renegotiation");

    call.handle.leave().await;
}
