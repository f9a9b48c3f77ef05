use super::{EngineEvent, NegotiationEngine};
use crate::config::RtcMode;
use confab_core::{Message, Payload};
use tracing::{debug, info};

impl NegotiationEngine {
    /// Leave the current room. Calling it outside a room does nothing.
    pub async fn leave(&self) {
        let (room_id, streams) = {
            let mut state = self.lock_state();
            if !state.in_room {
                return;
            }
            state.in_room = false;
            state.joining = false;
            state.invited_room_id = None;
            state.generation += 1;
            (state.room_id.take(), std::mem::take(&mut state.streams))
        };
        info!("Leaving room {:?}", room_id);

        let peers: Vec<_> = self.inner.links.iter().map(|l| l.key().clone()).collect();
        for peer in peers {
            if let Some((_, link)) = self.inner.links.remove(&peer) {
                link.destroy();
            }
        }

        for stream in &streams {
            stream.stop();
            self.emit(EngineEvent::StreamRemoved {
                stream_id: stream.id,
                owner: stream.owner.clone(),
            });
        }
        self.publish_streams();

        let leave = Message::to_relay(self.inner.config.local_peer.clone(), Payload::Leave)
            .with_room(room_id);
        if let Err(e) = self.inner.transport.send(leave) {
            debug!("Leave notice not sent: {}", e);
        }

        if self.inner.config.mode == RtcMode::NormalMode {
            self.inner.transport.close().await;
        }
    }
}
