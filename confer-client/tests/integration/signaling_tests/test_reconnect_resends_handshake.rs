use confer_client::{ChannelState, SignalEvent, SignalingChannel};
use confer_core::SignalMessage;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{ConnectOutcome, MockConnector, test_signaling_config};

#[tokio::test(start_paused = true)]
async fn test_reconnect_resends_handshake() {
    init_tracing();

    let (connector, mut accepted) = MockConnector::new(
        vec![
            ConnectOutcome::Accept,
            ConnectOutcome::Refuse,
            ConnectOutcome::Accept,
        ],
        ConnectOutcome::Refuse,
    );
    let (handle, mut events) =
        SignalingChannel::connect(test_signaling_config("Ann"), Arc::new(connector))
            .await
            .expect("initial connect");

    let mut first = accepted.recv().await.expect("first link");
    assert_eq!(
        first.next_message().await,
        Some(SignalMessage::UserInfo {
            user_name: "Ann".to_string()
        })
    );
    assert_eq!(first.next_message().await, Some(SignalMessage::GetParticipants));
    drop(first);

    assert_eq!(events.recv().await, Some(SignalEvent::Reconnecting { attempt: 1 }));
    assert_eq!(events.recv().await, Some(SignalEvent::Reconnecting { attempt: 2 }));
    assert_eq!(events.recv().await, Some(SignalEvent::Reconnected));
    assert_eq!(handle.state(), ChannelState::Ready);

    let mut second = accepted.recv().await.expect("second link");
    assert_eq!(
        second.next_message().await,
        Some(SignalMessage::UserInfo {
            user_name: "Ann".to_string()
        })
    );
    assert_eq!(second.next_message().await, Some(SignalMessage::GetParticipants));

    handle.send_message(&SignalMessage::Ping);
    assert_eq!(second.next_message().await, Some(SignalMessage::Ping));

    second.push(&SignalMessage::Pong);
    assert_eq!(
        events.recv().await,
        Some(SignalEvent::Message(SignalMessage::Pong))
    );

    handle.close_channel().await;
    assert_eq!(second.next_message().await, None, "normal close frame expected");
    assert_eq!(handle.state(), ChannelState::Closed);
}
