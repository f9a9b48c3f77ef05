use super::{EngineEvent, NegotiationEngine, RoomSignaling};
use crate::link::{LinkEvent, PeerLink, Politeness};
use crate::media::ExtendedStream;
use confab_core::{PeerId, RoomId};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl NegotiationEngine {
    /// Build a link to `remote`, replacing any existing one, and publish every
    /// local stream over it.
    pub(crate) async fn create_link(
        &self,
        remote: PeerId,
        politeness: Politeness,
        room_id: Option<RoomId>,
    ) -> Option<PeerLink> {
        let generation = {
            let state = self.lock_state();
            if !(state.in_room || state.joining) {
                debug!("Not in a room, no link to {}", remote);
                return None;
            }
            state.generation
        };

        if let Some((_, old)) = self.inner.links.remove(&remote) {
            debug!("Replacing link to {}", remote);
            old.destroy();
        }

        let (connection, connection_events) = match self
            .inner
            .factory
            .create(&remote, &self.inner.config.ice_servers)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                warn!("Failed to create connection to {}: {}", remote, e);
                return None;
            }
        };

        // The room may have been left while the connection was being built.
        if self.lock_state().generation != generation {
            debug!("Room changed, dropping new connection to {}", remote);
            tokio::spawn(async move {
                let _ = connection.close().await;
            });
            return None;
        }

        let signaling = Arc::new(RoomSignaling::new(
            self.inner.config.local_peer.clone(),
            room_id.or_else(|| self.room_id()),
            self.inner.transport.clone(),
        ));
        let link = PeerLink::new(
            remote.clone(),
            politeness,
            connection,
            connection_events,
            signaling,
            self.inner.link_events.clone(),
        );

        if let Some(old) = self.inner.links.insert(remote.clone(), link.clone()) {
            old.destroy();
        }
        info!("Link to {} ready ({:?})", remote, politeness);

        for stream in self.local_streams() {
            self.publish_to(&link, &stream);
        }
        Some(link)
    }

    pub(crate) fn handle_link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { peer } => {
                info!("Connected to {}", peer);
                self.emit(EngineEvent::PeerConnected(peer));
            }
            LinkEvent::StreamAssembled(assembled) => {
                let owner = assembled.owner.clone();
                let live = self
                    .link(&owner)
                    .is_some_and(|link| !link.is_destroyed());
                if !live {
                    debug!("Stream from {} arrived after its link went away", owner);
                    return;
                }

                let stream = ExtendedStream::remote(assembled);
                {
                    let mut state = self.lock_state();
                    if !(state.in_room || state.joining) {
                        return;
                    }
                    state.streams.retain(|s| s.id != stream.id);
                    state.streams.push(stream.clone());
                }
                info!("Remote stream {} from {} added", stream.id, owner);
                self.publish_streams();
                self.emit(EngineEvent::RemoteStreamAdded(stream));
            }
        }
    }
}
