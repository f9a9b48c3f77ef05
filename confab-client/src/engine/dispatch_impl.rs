use super::{EngineEvent, NegotiationEngine};
use crate::link::{PeerLink, Politeness};
use confab_core::{Message, MessageKind, Payload, PeerId, StreamInfoUpdate};
use tracing::{debug, info, warn};

impl NegotiationEngine {
    /// Route one inbound envelope. Replies to our own requests never get here;
    /// the transport resolves them.
    pub(crate) async fn handle_message(&self, message: Message) {
        let kind = message.kind();
        let Message {
            from,
            room_id,
            request_id,
            payload,
            ..
        } = message;

        match payload {
            Payload::Invite(invite) => {
                let Some(room_id) = room_id else {
                    warn!("Invite without a room id dropped");
                    return;
                };
                info!("Invited to room {}", room_id);
                self.lock_state().invited_room_id = Some(room_id.clone());
                self.emit(EngineEvent::RemoteInvite {
                    room_id,
                    inviter: invite.inviter.or(from),
                    extra: invite.extra,
                });
            }
            Payload::RemoteJoin(joined) => {
                let peer = joined.peer;
                if peer == self.inner.config.local_peer || !self.accepts_peers() {
                    return;
                }
                // The newcomer needs a link before our offer can land.
                let connect = Message::to_peer(
                    self.inner.config.local_peer.clone(),
                    peer.clone(),
                    Payload::Connect,
                )
                .with_room(room_id.clone());
                if let Err(e) = self.inner.transport.send(connect) {
                    warn!("Failed to send connect to {}: {}", peer, e);
                    return;
                }
                if self
                    .create_link(peer.clone(), Politeness::Impolite, room_id)
                    .await
                    .is_some()
                {
                    self.emit(EngineEvent::PeerJoined(peer));
                }
            }
            Payload::Connect => {
                let Some(peer) = from else {
                    warn!("Connect without a sender dropped");
                    return;
                };
                if peer == self.inner.config.local_peer {
                    return;
                }
                if self
                    .create_link(peer.clone(), Politeness::Polite, room_id)
                    .await
                    .is_some()
                {
                    self.emit(EngineEvent::PeerJoined(peer));
                }
            }
            Payload::Offer(offer) => {
                if let Some(link) = self.link_from(from.as_ref(), kind) {
                    link.handle_offer(offer.sdp).await;
                }
            }
            Payload::Answer(answer) => {
                if let Some(link) = self.link_from(from.as_ref(), kind) {
                    link.handle_answer(answer).await;
                }
            }
            Payload::AnswerAck(ack) => {
                if let Some(link) = self.link_from(from.as_ref(), kind) {
                    link.handle_answer_ack(ack);
                }
            }
            Payload::Candidate(candidate) => {
                if let Some(link) = self.link_from(from.as_ref(), kind) {
                    link.handle_candidate(candidate);
                }
            }
            Payload::StreamInfo(info) => {
                if let Some(link) = self.link_from(from.as_ref(), kind) {
                    link.handle_stream_info(info, request_id).await;
                }
            }
            Payload::StreamInfoUpdate(update) => {
                let Some(peer) = from else {
                    warn!("Stream info update without a sender dropped");
                    return;
                };
                self.apply_remote_update(&peer, &update);

                let mut reply = Message::to_peer(
                    self.inner.config.local_peer.clone(),
                    peer.clone(),
                    Payload::StreamInfoUpdate(update),
                )
                .with_room(room_id);
                reply.request_id = request_id;
                reply.reply = true;
                if let Err(e) = self.inner.transport.send(reply) {
                    warn!("Failed to confirm stream update to {}: {}", peer, e);
                }
            }
            Payload::RemoteLeave(left) => self.remove_peer(&left.peer),
            Payload::RoomUserRefresh(users) => self.emit(EngineEvent::RoomUsers(users.users)),
            Payload::Text(chat) | Payload::Notice(chat) => self.emit(EngineEvent::Chat {
                kind,
                from,
                content: chat.content,
            }),
            Payload::Join(_) | Payload::Leave | Payload::Heartbeat(_) => {
                debug!("Ignoring unsolicited {} message", kind);
            }
        }
    }

    fn accepts_peers(&self) -> bool {
        let state = self.lock_state();
        state.in_room || state.joining
    }

    fn link_from(&self, from: Option<&PeerId>, kind: MessageKind) -> Option<PeerLink> {
        let Some(peer) = from else {
            warn!("{} without a sender dropped", kind);
            return None;
        };
        let link = self.link(peer);
        if link.is_none() {
            debug!("{} from {} has no link, dropped", kind, peer);
        }
        link
    }

    fn apply_remote_update(&self, peer: &PeerId, update: &StreamInfoUpdate) {
        let updated = {
            let mut state = self.lock_state();
            state
                .streams
                .iter_mut()
                .find(|s| !s.local && &s.owner == peer && s.id == update.stream_id)
                .and_then(|stream| {
                    stream
                        .apply_remote_patch(&update.patch)
                        .then(|| stream.clone())
                })
        };

        match updated {
            Some(stream) => {
                debug!("Stream {} from {} updated", stream.id, peer);
                self.publish_streams();
                self.emit(EngineEvent::StreamUpdated(stream));
            }
            None => debug!(
                "Update for unknown or unchanged stream {} from {}",
                update.stream_id, peer
            ),
        }
    }

    /// Tear down everything a departed peer left behind.
    fn remove_peer(&self, peer: &PeerId) {
        let Some((_, link)) = self.inner.links.remove(peer) else {
            debug!("Leave from unknown peer {}", peer);
            return;
        };
        link.destroy();

        let removed: Vec<_> = {
            let mut state = self.lock_state();
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.streams)
                .into_iter()
                .partition(|s| !s.local && &s.owner == peer);
            state.streams = kept;
            gone
        };

        for stream in &removed {
            stream.stop();
            self.emit(EngineEvent::StreamRemoved {
                stream_id: stream.id,
                owner: stream.owner.clone(),
            });
        }
        info!("{} left, {} stream(s) removed", peer, removed.len());
        self.emit(EngineEvent::RemoteLeave(peer.clone()));
        self.publish_streams();
    }
}
