use confer_client::{PeerRetryPolicy, SessionInput, SessionState};
use confer_core::{SdpKind, Signal, SignalType};

use crate::integration::{init_tracing, spawn_session};
use crate::utils::{MockTransportFactory, TransportOp};

#[tokio::test]
async fn test_outbound_offer_then_answer_connects() {
    init_tracing();

    let mut session = spawn_session(
        "alice",
        "bob",
        MockTransportFactory::new(),
        PeerRetryPolicy::default(),
    );

    session.handle.send(SessionInput::StartOffer);
    let states = session.states_until(SessionState::AwaitingAnswer).await;
    assert_eq!(states, vec![SessionState::Offering, SessionState::AwaitingAnswer]);

    let signals = session.signaling.signals_to(&session.remote).await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].signal_type(), SignalType::Offer);

    session.handle.send(SessionInput::Signal(Signal::Answer {
        sdp: "answer-from-bob".to_string(),
    }));
    let states = session.states_until(SessionState::Connected).await;
    assert_eq!(states, vec![SessionState::Connected]);

    let transport = session
        .transports
        .latest_for(&session.remote)
        .await
        .expect("transport created");
    let ops = transport.ops().await;
    assert_eq!(
        ops,
        vec![
            TransportOp::AddTrack("microphone".to_string()),
            TransportOp::AddTrack("camera".to_string()),
            TransportOp::CreateOffer,
            TransportOp::SetLocal(SdpKind::Offer),
            TransportOp::SetRemote(SdpKind::Answer, "answer-from-bob".to_string()),
        ]
    );

    session.handle.close().await;
    assert!(transport.is_closed().await);
}

#[tokio::test]
async fn test_stale_answer_is_ignored() {
    init_tracing();

    let mut session = spawn_session(
        "alice",
        "bob",
        MockTransportFactory::new(),
        PeerRetryPolicy::default(),
    );

    session.handle.send(SessionInput::StartOffer);
    session.states_until(SessionState::AwaitingAnswer).await;
    session.handle.send(SessionInput::Signal(Signal::Answer {
        sdp: "first".to_string(),
    }));
    session.states_until(SessionState::Connected).await;

    session.handle.send(SessionInput::Signal(Signal::Answer {
        sdp: "late duplicate".to_string(),
    }));
    session.handle.send(SessionInput::Close);
    session.closed().await;

    let transports = session.transports.transports_for(&session.remote).await;
    assert_eq!(transports.len(), 1, "no renegotiation for a stale answer");

    let remote_descriptions = transports[0]
        .ops()
        .await
        .into_iter()
        .filter(|op| matches!(op, TransportOp::SetRemote(..)))
        .count();
    assert_eq!(remote_descriptions, 1);
}

#[tokio::test]
async fn test_inbound_offer_is_answered() {
    init_tracing();

    let mut session = spawn_session(
        "alice",
        "bob",
        MockTransportFactory::new(),
        PeerRetryPolicy::default(),
    );

    session.handle.send(SessionInput::Signal(Signal::Offer {
        sdp: "offer-from-bob".to_string(),
    }));
    let states = session.states_until(SessionState::Connected).await;
    assert_eq!(states, vec![SessionState::AnsweringOffer, SessionState::Connected]);

    let signals = session.signaling.signals_to(&session.remote).await;
    let kinds: Vec<SignalType> = signals.iter().map(|s| s.signal_type()).collect();
    assert_eq!(kinds, vec![SignalType::Answer]);

    session.handle.close().await;
}
