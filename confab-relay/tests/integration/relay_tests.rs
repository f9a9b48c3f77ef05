use confab_core::{
    JoinPayload, Message, MessageKind, Payload, PeerId, RequestId, RoomError, RoomId, SdpPayload,
};

use crate::integration::init_tracing;
use crate::utils::{TestClient, start_relay};

fn join(client: &TestClient, room_id: Option<RoomId>, invite: Vec<PeerId>) -> Message {
    client
        .to_relay(Payload::Join(JoinPayload {
            invite,
            ..JoinPayload::default()
        }))
        .with_room(room_id)
        .with_request_id(RequestId::new())
}

/// Joins a fresh room as `client` and returns its id.
async fn create_room(client: &mut TestClient) -> anyhow::Result<RoomId> {
    let request = join(client, None, Vec::new());
    client.send(&request).await?;
    let reply = client.recv_kind(MessageKind::Join).await?;
    assert!(reply.reply);
    assert_eq!(reply.request_id, request.request_id);
    reply
        .room_id
        .ok_or_else(|| anyhow::anyhow!("join reply without room id"))
}

#[tokio::test]
async fn test_join_without_room_creates_one() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;

    create_room(&mut a).await?;
    let refresh = a.recv_kind(MessageKind::RoomUserRefresh).await?;
    assert!(matches!(refresh.payload, Payload::RoomUserRefresh(ref u) if u.users == vec![PeerId::from("a")]));
    Ok(())
}

#[tokio::test]
async fn test_unknown_room_is_not_found() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;

    let request = join(&a, Some(RoomId::from("nowhere")), Vec::new());
    a.send(&request).await?;

    let reply = a.recv_kind(MessageKind::Join).await?;
    assert!(reply.reply);
    assert_eq!(reply.request_id, request.request_id);
    assert!(matches!(
        reply.payload,
        Payload::Join(JoinPayload {
            error: Some(RoomError::NotFound),
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_invite_reaches_invitee() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;
    let mut b = TestClient::connect(addr, "b").await?;

    let request = join(&a, None, vec![PeerId::from("b")]);
    a.send(&request).await?;
    let reply = a.recv_kind(MessageKind::Join).await?;

    let invite = b.recv_kind(MessageKind::Invite).await?;
    assert_eq!(invite.from, Some(PeerId::from("a")));
    assert_eq!(invite.room_id, reply.room_id);
    assert!(matches!(invite.payload, Payload::Invite(ref i) if i.inviter == Some(PeerId::from("a"))));
    Ok(())
}

#[tokio::test]
async fn test_join_announces_remote_join() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;
    let mut b = TestClient::connect(addr, "b").await?;

    let room_id = create_room(&mut a).await?;
    let request = join(&b, Some(room_id.clone()), Vec::new());
    b.send(&request).await?;

    let reply = b.recv_kind(MessageKind::Join).await?;
    assert_eq!(reply.room_id, Some(room_id));
    assert!(matches!(reply.payload, Payload::Join(ref j) if j.error.is_none()));

    let joined = a.recv_kind(MessageKind::RemoteJoin).await?;
    assert!(matches!(joined.payload, Payload::RemoteJoin(ref p) if p.peer == PeerId::from("b")));
    Ok(())
}

#[tokio::test]
async fn test_peer_messages_are_forwarded_with_sender() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;
    let mut b = TestClient::connect(addr, "b").await?;

    // A forged `from` is overwritten with the socket's peer.
    let mut offer = Message::to_peer(
        PeerId::from("mallory"),
        PeerId::from("b"),
        Payload::Offer(SdpPayload {
            sdp: "v=0".to_owned(),
        }),
    );
    offer.room_id = Some(RoomId::from("r"));
    a.send(&offer).await?;

    let received = b.recv_kind(MessageKind::Offer).await?;
    assert_eq!(received.from, Some(PeerId::from("a")));
    assert_eq!(received.to, Some(PeerId::from("b")));
    assert_eq!(received.payload, offer.payload);
    Ok(())
}

#[tokio::test]
async fn test_heartbeat_is_echoed() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;

    a.send(&Message::heartbeat(42)).await?;
    let echo = a.recv_kind(MessageKind::Heartbeat).await?;
    assert!(matches!(echo.payload, Payload::Heartbeat(ref hb) if hb.id == 42));
    Ok(())
}

#[tokio::test]
async fn test_leave_and_disconnect_send_remote_leave() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;
    let mut b = TestClient::connect(addr, "b").await?;
    let mut c = TestClient::connect(addr, "c").await?;

    let room_id = create_room(&mut a).await?;
    for client in [&mut b, &mut c] {
        let request = join(client, Some(room_id.clone()), Vec::new());
        client.send(&request).await?;
        client.recv_kind(MessageKind::Join).await?;
        a.recv_kind(MessageKind::RemoteJoin).await?;
    }

    let leave = b.to_relay(Payload::Leave);
    b.send(&leave).await?;
    let left = a.recv_kind(MessageKind::RemoteLeave).await?;
    assert!(matches!(left.payload, Payload::RemoteLeave(ref p) if p.peer == PeerId::from("b")));

    c.close().await?;
    let left = a.recv_kind(MessageKind::RemoteLeave).await?;
    assert!(matches!(left.payload, Payload::RemoteLeave(ref p) if p.peer == PeerId::from("c")));
    Ok(())
}

#[tokio::test]
async fn test_reconnect_keeps_membership() -> anyhow::Result<()> {
    init_tracing();
    let addr = start_relay().await?;
    let mut a = TestClient::connect(addr, "a").await?;
    let mut b = TestClient::connect(addr, "b").await?;

    let room_id = create_room(&mut a).await?;
    let request = join(&b, Some(room_id.clone()), Vec::new());
    b.send(&request).await?;
    b.recv_kind(MessageKind::Join).await?;
    a.recv_kind(MessageKind::RemoteJoin).await?;

    // The new socket replaces the old one before the old one closes.
    let mut b2 = TestClient::connect(addr, "b").await?;
    b.close().await?;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    a.send(&Message::to_peer(
        PeerId::from("a"),
        PeerId::from("b"),
        Payload::Connect,
    ))
    .await?;
    let connect = b2.recv_kind(MessageKind::Connect).await?;
    assert_eq!(connect.from, Some(PeerId::from("a")));
    Ok(())
}
