use confab_core::{Payload, PeerId, RequestId};
use confab_relay::RoomCommand;

use crate::integration::{create_test_room, init_tracing};
use crate::utils::next_delivery;

fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}

#[tokio::test]
async fn test_join_replies_before_refresh() -> anyhow::Result<()> {
    init_tracing();
    let (room_id, tx, mut rx) = create_test_room();
    let request_id = RequestId::new();

    tx.send(RoomCommand::Join {
        peer_id: peer("a"),
        request_id: Some(request_id),
    })
    .await?;

    let (to, reply) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("a"));
    assert!(reply.reply);
    assert_eq!(reply.request_id, Some(request_id));
    assert_eq!(reply.room_id.as_ref(), Some(&room_id));
    assert!(matches!(reply.payload, Payload::Join(ref join) if join.error.is_none()));

    let (to, refresh) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("a"));
    match refresh.payload {
        Payload::RoomUserRefresh(users) => assert_eq!(users.users, vec![peer("a")]),
        other => panic!("expected refresh, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_second_join_announces_to_existing_members() -> anyhow::Result<()> {
    init_tracing();
    let (_room_id, tx, mut rx) = create_test_room();

    tx.send(RoomCommand::Join {
        peer_id: peer("a"),
        request_id: None,
    })
    .await?;
    next_delivery(&mut rx).await?; // reply
    next_delivery(&mut rx).await?; // refresh

    tx.send(RoomCommand::Join {
        peer_id: peer("b"),
        request_id: None,
    })
    .await?;

    let (to, reply) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("b"));
    assert!(reply.reply);

    let (to, joined) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("a"));
    assert!(matches!(joined.payload, Payload::RemoteJoin(ref p) if p.peer == peer("b")));

    let mut refreshed = Vec::new();
    for _ in 0..2 {
        let (to, refresh) = next_delivery(&mut rx).await?;
        let Payload::RoomUserRefresh(users) = refresh.payload else {
            panic!("expected refresh");
        };
        assert_eq!(users.users, vec![peer("a"), peer("b")]);
        refreshed.push(to);
    }
    refreshed.sort();
    assert_eq!(refreshed, vec![peer("a"), peer("b")]);
    Ok(())
}

#[tokio::test]
async fn test_rejoin_only_replies() -> anyhow::Result<()> {
    init_tracing();
    let (_room_id, tx, mut rx) = create_test_room();

    for _ in 0..2 {
        tx.send(RoomCommand::Join {
            peer_id: peer("a"),
            request_id: None,
        })
        .await?;
    }
    tx.send(RoomCommand::Broadcast {
        from: peer("x"),
        message: confab_core::Message::new(Payload::Leave),
    })
    .await?;

    let kinds: Vec<_> = {
        let mut kinds = Vec::new();
        for _ in 0..4 {
            kinds.push(next_delivery(&mut rx).await?.1.kind());
        }
        kinds
    };
    use confab_core::MessageKind::*;
    // reply, refresh, reply again, then the broadcast marker
    assert_eq!(kinds, vec![Join, RoomUserRefresh, Join, Leave]);
    Ok(())
}

#[tokio::test]
async fn test_leave_announces_remote_leave() -> anyhow::Result<()> {
    init_tracing();
    let (_room_id, tx, mut rx) = create_test_room();

    for id in ["a", "b"] {
        tx.send(RoomCommand::Join {
            peer_id: peer(id),
            request_id: None,
        })
        .await?;
    }
    // a: reply + refresh; b: reply, remote-join to a, two refreshes
    for _ in 0..6 {
        next_delivery(&mut rx).await?;
    }

    tx.send(RoomCommand::Disconnect { peer_id: peer("b") })
        .await?;

    let (to, left) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("a"));
    assert!(matches!(left.payload, Payload::RemoteLeave(ref p) if p.peer == peer("b")));

    let (to, refresh) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("a"));
    assert!(matches!(refresh.payload, Payload::RoomUserRefresh(ref u) if u.users == vec![peer("a")]));
    Ok(())
}

#[tokio::test]
async fn test_broadcast_skips_sender() -> anyhow::Result<()> {
    init_tracing();
    let (_room_id, tx, mut rx) = create_test_room();

    for id in ["a", "b"] {
        tx.send(RoomCommand::Join {
            peer_id: peer(id),
            request_id: None,
        })
        .await?;
    }
    for _ in 0..6 {
        next_delivery(&mut rx).await?;
    }

    tx.send(RoomCommand::Broadcast {
        from: peer("a"),
        message: confab_core::Message::new(Payload::Text(Default::default())),
    })
    .await?;

    let (to, text) = next_delivery(&mut rx).await?;
    assert_eq!(to, peer("b"));
    assert!(matches!(text.payload, Payload::Text(_)));
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_room_stops_when_empty() -> anyhow::Result<()> {
    init_tracing();
    let (_room_id, tx, mut rx) = create_test_room();

    tx.send(RoomCommand::Join {
        peer_id: peer("a"),
        request_id: None,
    })
    .await?;
    tx.send(RoomCommand::Leave { peer_id: peer("a") }).await?;
    next_delivery(&mut rx).await?;
    next_delivery(&mut rx).await?;

    tokio::time::timeout(std::time::Duration::from_secs(5), tx.closed()).await?;
    assert!(tx.is_closed());
    Ok(())
}
