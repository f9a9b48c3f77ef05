//! Reassembly of a remote stream from tracks and metadata arriving in any
//! order.

use crate::media::MediaTrack;
use confab_core::{PeerId, RequestId, StreamInfo};
use std::sync::Arc;
use tracing::{debug, warn};

/// A remote stream whose declared track count has been reached.
pub struct AssembledStream {
    pub owner: PeerId,
    pub tracks: Vec<Arc<dyn MediaTrack>>,
    pub info: StreamInfo,
    /// Request id of the stream-info message, echoed in the completion reply.
    pub request_id: Option<RequestId>,
}

#[derive(Default)]
struct PartialStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
    info: Option<StreamInfo>,
    request_id: Option<RequestId>,
}

/// Holds at most one partial stream for one remote peer.
pub struct StreamAssembler {
    owner: PeerId,
    partial: Option<PartialStream>,
}

impl StreamAssembler {
    pub fn new(owner: PeerId) -> Self {
        Self {
            owner,
            partial: None,
        }
    }

    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) -> Option<AssembledStream> {
        debug!("Track {} arrived from {}", track.id(), self.owner);
        self.partial.get_or_insert_with(Default::default).tracks.push(track);
        self.try_complete()
    }

    pub fn add_info(
        &mut self,
        info: StreamInfo,
        request_id: Option<RequestId>,
    ) -> Option<AssembledStream> {
        let partial = self.partial.get_or_insert_with(Default::default);
        if let Some(previous) = &partial.info {
            warn!(
                "Stream info {} from {} replaces incomplete {}",
                info.stream_id, self.owner, previous.stream_id
            );
        }
        partial.info = Some(info);
        partial.request_id = request_id;
        self.try_complete()
    }

    /// Tracks received so far for the partial stream.
    pub fn received_track_count(&self) -> usize {
        self.partial.as_ref().map_or(0, |p| p.tracks.len())
    }

    pub fn is_pending(&self) -> bool {
        self.partial.is_some()
    }

    pub fn clear(&mut self) {
        self.partial = None;
    }

    fn try_complete(&mut self) -> Option<AssembledStream> {
        let partial = self.partial.as_mut()?;
        let need = partial.info.as_ref()?.need_track_count;
        if partial.tracks.len() < need {
            return None;
        }

        let mut partial = self.partial.take()?;
        let info = partial.info.take()?;

        // Tracks beyond the declared count belong to the next stream.
        let surplus = partial.tracks.split_off(need);
        if !surplus.is_empty() {
            self.partial = Some(PartialStream {
                tracks: surplus,
                ..Default::default()
            });
        }

        debug!(
            "Stream {} from {} assembled with {} tracks",
            info.stream_id, self.owner, need
        );
        Some(AssembledStream {
            owner: self.owner.clone(),
            tracks: partial.tracks,
            info,
            request_id: partial.request_id,
        })
    }
}
