use confer_client::{LocalTrack, SessionInput, SessionState, TrackKind, TrackSource, TransportState};
use confer_core::Signal;

use crate::integration::{fast_retry, init_tracing, spawn_session};
use crate::utils::{MockTransportFactory, TransportOp, WAIT_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_replace_track_swaps_sender_and_survives_renegotiation() {
    init_tracing();

    let mut session = spawn_session("alice", "bob", MockTransportFactory::new(), fast_retry(Some(5)));

    session.handle.send(SessionInput::Signal(Signal::Offer {
        sdp: "offer-from-bob".to_string(),
    }));
    session.states_until(SessionState::Connected).await;

    let (screen, _) = LocalTrack::sample("screen", "local", TrackKind::Video, TrackSource::Screen);
    session.handle.send(SessionInput::ReplaceTrack(screen));

    let first = session
        .transports
        .latest_for(&session.remote)
        .await
        .expect("transport created");
    let replaced = wait_until(WAIT_TIMEOUT_MS, || async {
        first.ops().await.contains(&TransportOp::ReplaceTrack {
            old: "camera".to_string(),
            new: "screen".to_string(),
        })
    })
    .await;
    assert!(replaced);
    assert_eq!(session.transports.created_count(), 1, "no renegotiation");

    first.emit_state(TransportState::Failed);
    session.states_until(SessionState::AwaitingAnswer).await;

    let second = session
        .transports
        .latest_for(&session.remote)
        .await
        .expect("replacement transport");
    let added: Vec<TransportOp> = second
        .ops()
        .await
        .into_iter()
        .filter(|op| matches!(op, TransportOp::AddTrack(_)))
        .collect();
    assert_eq!(
        added,
        vec![
            TransportOp::AddTrack("microphone".to_string()),
            TransportOp::AddTrack("screen".to_string()),
        ]
    );

    session.handle.close().await;
}
