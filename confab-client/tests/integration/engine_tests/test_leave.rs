use std::sync::Arc;

use confab_client::{ConnectionState, EngineConfig, EngineEvent, NegotiationEngine, RtcMode};
use confab_core::{InvitePayload, MediaKind, Message, Payload, PeerId, PeerPayload, RoomId};
use serde_json::Value;

use super::{EVENT_TIMEOUT_MS, create_test_peer, create_test_room, start_relay};
use crate::utils::{
    ChannelConnector, FakeTrack, MockFactory, MockMediaSource, TrackRegistry, init_tracing,
    next_event, wait_for, with_timeout,
};

#[tokio::test]
async fn test_leave_tears_down_both_sides() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let registry = TrackRegistry::default();
    let mut a = create_test_peer(addr, "alice", RtcMode::NormalMode, &registry);
    let mut b = create_test_peer(addr, "bob", RtcMode::NormalMode, &registry);

    create_test_room(&mut a, &mut b).await?;
    let published = a.engine.publish(MediaKind::Video, Value::Null).await?;
    b.remote_stream_from(&a.id()).await?;

    let a_connection = a
        .factory
        .connection_to(&b.id())
        .expect("alice built a connection to bob");

    a.engine.leave().await;
    assert!(!a.engine.is_in_room());
    assert!(a.engine.peers().is_empty());
    assert!(a.engine.local_streams().is_empty());
    assert!(published.tracks.iter().all(|t| {
        t.as_any()
            .downcast_ref::<FakeTrack>()
            .is_some_and(FakeTrack::is_stopped)
    }));
    assert!(wait_for(|| a_connection.is_closed(), 1_000).await);
    assert_eq!(a.engine.connection_state(), ConnectionState::Closed);

    let a_id = a.id();
    let removed = b
        .next(|e| match e {
            EngineEvent::StreamRemoved { stream_id, owner } if owner == a_id => Some(stream_id),
            _ => None,
        })
        .await?;
    assert_eq!(removed, published.id);
    b.next(|e| matches!(e, EngineEvent::RemoteLeave(ref p) if *p == a_id).then_some(()))
        .await?;
    assert!(b.engine.link(&a_id).is_none());
    assert!(b.engine.streams().borrow().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_leave_twice_is_noop() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let registry = TrackRegistry::default();
    let mut a = create_test_peer(addr, "alice", RtcMode::NormalMode, &registry);
    let mut b = create_test_peer(addr, "bob", RtcMode::NormalMode, &registry);

    create_test_room(&mut a, &mut b).await?;
    a.engine.publish(MediaKind::Audio, Value::Null).await?;

    a.engine.leave().await;
    let mut removed = 0;
    while let Ok(event) = a.events.try_recv() {
        if matches!(event, EngineEvent::StreamRemoved { .. }) {
            removed += 1;
        }
    }
    assert_eq!(removed, 1);

    a.engine.leave().await;
    while let Ok(event) = a.events.try_recv() {
        assert!(
            !matches!(event, EngineEvent::StreamRemoved { .. }),
            "second leave removed streams again"
        );
    }
    assert!(!a.engine.is_in_room());
    Ok(())
}

#[tokio::test]
async fn test_rejoin_after_leave() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let registry = TrackRegistry::default();
    let mut a = create_test_peer(addr, "alice", RtcMode::NormalMode, &registry);
    let mut b = create_test_peer(addr, "bob", RtcMode::NormalMode, &registry);

    let room_id = create_test_room(&mut a, &mut b).await?;
    b.engine.leave().await;
    let b_id = b.id();
    a.next(|e| matches!(e, EngineEvent::RemoteLeave(ref p) if *p == b_id).then_some(()))
        .await?;

    b.engine
        .join(confab_client::JoinOptions::room(room_id))
        .await?;
    let a_id = a.id();
    a.connected_to(&b_id).await?;
    b.connected_to(&a_id).await?;
    // One connection per join.
    assert_eq!(b.factory.created_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_remote_leave_from_unknown_peer_emits_nothing() -> anyhow::Result<()> {
    init_tracing();
    let registry = TrackRegistry::default();
    let (connector, mut accepted) = ChannelConnector::new();
    let config = EngineConfig::new(PeerId::from("alice"), "ws://relay.test/ws/alice")
        .with_mode(RtcMode::InviteMode);
    let engine = NegotiationEngine::new(
        config,
        connector,
        Arc::new(MockFactory::new("alice", registry.clone())),
        Arc::new(MockMediaSource::new("alice", registry)),
    );
    let mut events = engine.subscribe();
    let server = with_timeout(EVENT_TIMEOUT_MS, accepted.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("engine never connected"))?;

    let stranger = PeerPayload {
        peer: PeerId::from("stranger"),
    };
    server.send(&Message::new(Payload::RemoteLeave(stranger.clone())));
    server.send(&Message::new(Payload::RemoteLeave(stranger)));
    // Dispatch is in order, so the invite marks the end of the leaves.
    server.send(
        &Message::new(Payload::Invite(InvitePayload {
            inviter: None,
            extra: Value::Null,
        }))
        .with_room(Some(RoomId::from("after-leaves"))),
    );

    let first = next_event(&mut events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, EngineEvent::RemoteLeave(_) | EngineEvent::RemoteInvite { .. }).then_some(e)
    })
    .await?;
    assert!(
        matches!(first, EngineEvent::RemoteInvite { .. }),
        "leave for a peer without a link was reported"
    );
    engine.shutdown().await;
    Ok(())
}
