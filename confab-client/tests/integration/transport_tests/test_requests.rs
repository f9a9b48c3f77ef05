use std::time::Duration;

use confab_client::{ConnectionState, TransportError};
use confab_core::{ChatPayload, JoinPayload, Message, Payload, PeerId, RoomId};
use serde_json::json;
use tokio::time::Instant;

use crate::integration::{create_test_transport, test_transport_config};
use crate::utils::init_tracing;

fn join_request() -> Message {
    Message::to_relay(PeerId::from("a"), Payload::Join(JoinPayload::default()))
}

#[tokio::test(start_paused = true)]
async fn test_send_while_closed_is_an_error() {
    let t = create_test_transport(test_transport_config());

    let err = t.transport.send(join_request()).unwrap_err();
    assert!(matches!(err, TransportError::Closed(ConnectionState::Closed)));

    let err = t.transport.send_and_await(join_request()).await.unwrap_err();
    assert!(matches!(err, TransportError::Closed(_)));
    assert_eq!(t.transport.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reply_resolves_the_matching_request() {
    init_tracing();

    let mut t = create_test_transport(test_transport_config());
    t.transport.open();
    let mut server = t.accept().await.unwrap();

    let relay = tokio::spawn(async move {
        let request = server.recv_message().await.unwrap();
        // Unrelated traffic first, then the reply.
        server.send(&Message::new(Payload::Text(ChatPayload {
            content: json!("hello"),
        })));
        server.send(
            &request
                .reply_to(Payload::Join(JoinPayload::default()))
                .with_room(Some(RoomId::from("room-1"))),
        );
        server
    });

    let reply = t.transport.send_and_await(join_request()).await.unwrap();
    assert!(reply.reply);
    assert_eq!(reply.room_id, Some(RoomId::from("room-1")));
    assert_eq!(t.transport.pending_requests(), 0);

    let inbound = t.inbound.recv().await.unwrap();
    assert!(matches!(inbound.payload, Payload::Text(_)));
    assert!(t.inbound.try_recv().is_err(), "replies are not delivered as inbound");

    let _server = relay.await.unwrap();
    t.transport.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_leaves_no_pending_entry() {
    init_tracing();

    let mut t = create_test_transport(test_transport_config());
    t.transport.open();
    let mut server = t.accept().await.unwrap();

    // Keep the channel alive but never reply to the request.
    let relay = tokio::spawn(async move {
        let mut request = None;
        while let Some(message) = server.recv_any().await {
            match message.payload {
                Payload::Heartbeat(hb) => server.send(&Message::heartbeat(hb.id)),
                _ => request = Some(message),
            }
        }
        request
    });

    let started = Instant::now();
    let err = t.transport.send_and_await(join_request()).await.unwrap_err();
    match err {
        TransportError::Timeout { after, .. } => assert_eq!(after, Duration::from_secs(15)),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(t.transport.pending_requests(), 0);
    assert_eq!(t.transport.state(), ConnectionState::Open);

    t.transport.close().await;
    let request = relay.await.unwrap().expect("request never reached the relay");
    assert!(request.request_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_future_releases_its_entry() {
    let mut t = create_test_transport(test_transport_config());
    t.transport.open();
    let _server = t.accept().await.unwrap();

    let transport = t.transport.clone();
    let waiting = tokio::spawn(async move { transport.send_and_await(join_request()).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(t.transport.pending_requests(), 1);

    waiting.abort();
    let _ = waiting.await;
    assert_eq!(t.transport.pending_requests(), 0);

    t.transport.close().await;
}
