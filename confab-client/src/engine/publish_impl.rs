use super::{EngineEvent, NegotiationEngine};
use crate::error::EngineError;
use crate::link::PeerLink;
use crate::media::ExtendedStream;
use confab_core::{MediaKind, StreamId, StreamInfoPatch, StreamInfoUpdate};
use serde_json::Value;
use tracing::{debug, info, warn};

impl NegotiationEngine {
    /// Capture a new local stream and offer it to every connected peer.
    pub async fn publish(&self, kind: MediaKind, extra: Value) -> Result<ExtendedStream, EngineError> {
        if !self.is_in_room() {
            return Err(EngineError::NotInRoom);
        }
        let captured = self.inner.media.acquire(kind).await?;
        let stream = ExtendedStream::local(self.inner.config.local_peer.clone(), captured, kind, extra);
        info!(
            "Publishing {:?} stream {} with {} track(s)",
            kind,
            stream.id,
            stream.tracks.len()
        );

        {
            let mut state = self.lock_state();
            if !state.in_room {
                stream.stop();
                return Err(EngineError::NotInRoom);
            }
            state.streams.push(stream.clone());
        }
        self.publish_streams();
        self.emit(EngineEvent::LocalStreamAdded(stream.clone()));

        let links: Vec<_> = self.inner.links.iter().map(|l| l.value().clone()).collect();
        for link in &links {
            self.publish_to(link, &stream);
        }
        Ok(stream)
    }

    /// Queue `stream` on `link`; the outcome is only logged.
    pub(crate) fn publish_to(&self, link: &PeerLink, stream: &ExtendedStream) {
        let ticket = link.publish(stream);
        let remote = link.remote().clone();
        let stream_id = stream.id;
        tokio::spawn(async move {
            match ticket.await {
                Ok(Ok(())) => debug!("Stream {} accepted by {}", stream_id, remote),
                Ok(Err(e)) => warn!("Publishing {} to {} failed: {}", stream_id, remote, e),
                Err(e) => debug!("Publishing {} to {} dropped: {}", stream_id, remote, e),
            }
        });
    }

    pub fn set_video_muted(&self, stream_id: StreamId, muted: bool) -> Result<(), EngineError> {
        self.update_stream(stream_id, |s| s.set_video_muted(muted))
    }

    pub fn set_audio_muted(&self, stream_id: StreamId, muted: bool) -> Result<(), EngineError> {
        self.update_stream(stream_id, |s| s.set_audio_muted(muted))
    }

    /// Local playback volume; for our own streams the new value is also sent
    /// to every peer.
    pub fn set_volume(&self, stream_id: StreamId, volume: f32) -> Result<(), EngineError> {
        self.update_stream(stream_id, |s| s.set_volume(volume))
    }

    fn update_stream<F>(&self, stream_id: StreamId, change: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut ExtendedStream) -> Option<StreamInfoPatch>,
    {
        let (stream, patch) = {
            let mut state = self.lock_state();
            let stream = state
                .streams
                .iter_mut()
                .find(|s| s.id == stream_id)
                .ok_or(EngineError::UnknownStream(stream_id))?;
            let patch = change(stream);
            (stream.clone(), patch)
        };
        self.publish_streams();
        self.emit(EngineEvent::StreamUpdated(stream));

        let Some(patch) = patch.filter(|p| !p.is_empty()) else {
            return Ok(());
        };
        let update = StreamInfoUpdate { stream_id, patch };
        for link in self.inner.links.iter() {
            let ticket = link.update_stream_info(update.clone());
            let remote = link.key().clone();
            tokio::spawn(async move {
                if let Ok(Err(e)) = ticket.await {
                    warn!("Stream update to {} failed: {}", remote, e);
                }
            });
        }
        Ok(())
    }
}
