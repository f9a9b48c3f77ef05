use super::{LinkEvent, PeerLink, lock};
use crate::assembler::AssembledStream;
use crate::error::LinkError;
use crate::media::{ExtendedStream, MediaTrack};
use crate::queue::QueueTicket;
use confab_core::{RequestId, StreamInfo, StreamInfoUpdate};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl PeerLink {
    /// Add the stream's tracks and announce it. Publishes to one link never
    /// interleave; the next one starts after the subscriber replied.
    pub fn publish(&self, stream: &ExtendedStream) -> QueueTicket<Result<(), LinkError>> {
        let weak = self.weak();
        let tracks = stream.tracks.clone();
        let info = stream.info.clone();
        info!("Queueing stream {} for {}", info.stream_id, self.inner.remote);

        self.inner.publish_queue.enqueue(async move {
            let link = PeerLink::upgrade(&weak).ok_or(LinkError::Destroyed)?;
            link.publish_now(tracks, info).await
        })
    }

    async fn publish_now(
        &self,
        tracks: Vec<Arc<dyn MediaTrack>>,
        info: StreamInfo,
    ) -> Result<(), LinkError> {
        for track in tracks {
            self.ensure_alive()?;
            self.inner.connection.add_track(track).await?;
        }
        self.ensure_alive()?;

        debug!(
            "Announcing stream {} ({} tracks) to {}",
            info.stream_id, info.need_track_count, self.inner.remote
        );
        self.inner
            .signaling
            .send_stream_info(&self.inner.remote, info)
            .await?;
        Ok(())
    }

    /// Send a metadata patch, ordered after any publish still in flight.
    pub fn update_stream_info(
        &self,
        update: StreamInfoUpdate,
    ) -> QueueTicket<Result<(), LinkError>> {
        let weak = self.weak();
        self.inner.publish_queue.enqueue(async move {
            let link = PeerLink::upgrade(&weak).ok_or(LinkError::Destroyed)?;
            link.ensure_alive()?;
            link.inner
                .signaling
                .send_stream_info_update(&link.inner.remote, update)
                .await?;
            Ok(())
        })
    }

    pub async fn handle_stream_info(&self, info: StreamInfo, request_id: Option<RequestId>) {
        if self.is_destroyed() {
            return;
        }
        let assembled = lock(&self.inner.assembler).add_info(info, request_id);
        if let Some(assembled) = assembled {
            self.on_assembled(assembled).await;
        }
    }

    pub(super) async fn on_assembled(&self, assembled: AssembledStream) {
        let request_id = assembled.request_id;
        let info = assembled.info.clone();
        info!(
            "Stream {} from {} complete",
            info.stream_id, self.inner.remote
        );

        let _ = self.inner.events.send(LinkEvent::StreamAssembled(assembled));

        if let Err(e) = self
            .inner
            .signaling
            .send_stream_info_reply(&self.inner.remote, request_id, info)
            .await
        {
            warn!("Failed to confirm stream to {}: {}", self.inner.remote, e);
        }
    }
}
