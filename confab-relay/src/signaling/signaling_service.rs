use crate::room::{RoomCommand, RoomManager};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message as WsMessage;
use confab_core::{InvitePayload, JoinPayload, Message, Payload, PeerId, RoomError, RoomId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Outbound socket queues of every connected peer.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<DashMap<PeerId, mpsc::UnboundedSender<WsMessage>>>,
}

impl PeerRegistry {
    pub fn add_peer(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<WsMessage>) {
        self.peers.insert(peer_id, tx);
    }

    /// Forget the peer if `tx` is still its current socket. Returns whether
    /// it was.
    pub fn remove_peer(&self, peer_id: &PeerId, tx: &mpsc::UnboundedSender<WsMessage>) -> bool {
        self.peers
            .remove_if(peer_id, |_, current| current.same_channel(tx))
            .is_some()
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn send_signal(&self, peer_id: &PeerId, message: &Message) {
        let Some(peer) = self.peers.get(peer_id) else {
            warn!("Attempted to send {} to disconnected peer {}", message.kind(), peer_id);
            return;
        };
        match message.to_json() {
            Ok(json) => {
                if let Err(e) = peer.send(WsMessage::Text(json.into())) {
                    error!("Failed to send WS message to {}: {}", peer_id, e);
                }
            }
            Err(e) => error!("Failed to serialize {} message: {}", message.kind(), e),
        }
    }
}

#[async_trait]
impl SignalingOutput for PeerRegistry {
    async fn send_to(&self, peer_id: &PeerId, message: Message) {
        self.send_signal(peer_id, &message);
    }
}

/// Routes every inbound envelope: relay requests go to rooms, peer-directed
/// messages are forwarded.
#[derive(Clone)]
pub struct SignalingService {
    peers: PeerRegistry,
    rooms: RoomManager,
    memberships: Arc<DashMap<PeerId, RoomId>>,
}

impl SignalingService {
    pub fn new() -> Self {
        let peers = PeerRegistry::default();
        Self {
            rooms: RoomManager::new(Arc::new(peers.clone())),
            peers,
            memberships: Arc::new(DashMap::new()),
        }
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn room_of(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.memberships.get(peer_id).map(|r| r.clone())
    }

    pub async fn handle_message(&self, peer_id: &PeerId, mut message: Message) {
        message.from = Some(peer_id.clone());

        if message.kind().is_peer_directed()
            && let Some(to) = message.to.clone()
        {
            debug!("Forwarding {} from {} to {}", message.kind(), peer_id, to);
            self.peers.send_signal(&to, &message);
            return;
        }

        match message.payload {
            Payload::Heartbeat(hb) => {
                self.peers.send_signal(peer_id, &Message::heartbeat(hb.id));
            }
            Payload::Join(ref join) => {
                let join = join.clone();
                self.join(peer_id, message, join).await;
            }
            Payload::Leave => self.leave(peer_id, false).await,
            Payload::Text(_) | Payload::Notice(_) => {
                let Some(room) = self.room_sender(peer_id) else {
                    debug!("Chat from {} outside any room dropped", peer_id);
                    return;
                };
                let cmd = RoomCommand::Broadcast {
                    from: peer_id.clone(),
                    message,
                };
                if room.send(cmd).await.is_err() {
                    warn!("Room of {} went away", peer_id);
                }
            }
            _ => warn!("Unexpected {} from {}", message.kind(), peer_id),
        }
    }

    /// The peer's socket `tx` closed. A peer that already reconnected on a
    /// newer socket keeps its membership.
    pub async fn disconnect(&self, peer_id: &PeerId, tx: &mpsc::UnboundedSender<WsMessage>) {
        if self.peers.remove_peer(peer_id, tx) {
            self.leave(peer_id, true).await;
        }
    }

    async fn join(&self, peer_id: &PeerId, request: Message, join: JoinPayload) {
        let (room_id, room) = match &request.room_id {
            Some(room_id) => match self.rooms.get_room_sender(room_id) {
                Some(room) => (room_id.clone(), room),
                None => {
                    info!("{} asked for unknown room {}", peer_id, room_id);
                    let reply = request.reply_to(Payload::Join(JoinPayload {
                        error: Some(RoomError::NotFound),
                        ..JoinPayload::default()
                    }));
                    self.peers.send_signal(peer_id, &reply);
                    return;
                }
            },
            None => {
                let (room_id, room) = self.rooms.create_room();
                self.invite(peer_id, &room_id, &join);
                (room_id, room)
            }
        };

        if let Some(previous) = self.room_of(peer_id)
            && previous != room_id
        {
            self.leave(peer_id, false).await;
        }
        self.memberships.insert(peer_id.clone(), room_id);

        let cmd = RoomCommand::Join {
            peer_id: peer_id.clone(),
            request_id: request.request_id,
        };
        if room.send(cmd).await.is_err() {
            error!("Room for {} died before the join", peer_id);
            self.memberships.remove(peer_id);
            let reply = request.reply_to(Payload::Join(JoinPayload {
                error: Some(RoomError::Unknown),
                ..JoinPayload::default()
            }));
            self.peers.send_signal(peer_id, &reply);
        }
    }

    fn invite(&self, inviter: &PeerId, room_id: &RoomId, join: &JoinPayload) {
        for invitee in join.invite.iter().filter(|p| *p != inviter) {
            info!("{} invites {} to room {}", inviter, invitee, room_id);
            let invite = Message::to_peer(
                inviter.clone(),
                invitee.clone(),
                Payload::Invite(InvitePayload {
                    inviter: Some(inviter.clone()),
                    extra: join.extra.clone(),
                }),
            )
            .with_room(Some(room_id.clone()));
            self.peers.send_signal(invitee, &invite);
        }
    }

    async fn leave(&self, peer_id: &PeerId, disconnected: bool) {
        let Some((_, room_id)) = self.memberships.remove(peer_id) else {
            return;
        };
        let Some(room) = self.rooms.get_room_sender(&room_id) else {
            return;
        };
        let cmd = if disconnected {
            RoomCommand::Disconnect {
                peer_id: peer_id.clone(),
            }
        } else {
            RoomCommand::Leave {
                peer_id: peer_id.clone(),
            }
        };
        let _ = room.send(cmd).await;
    }

    fn room_sender(&self, peer_id: &PeerId) -> Option<mpsc::Sender<RoomCommand>> {
        let room_id = self.room_of(peer_id)?;
        self.rooms.get_room_sender(&room_id)
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}
