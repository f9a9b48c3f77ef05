//! Capture and render capabilities the engine consumes but does not implement.

mod stream;

pub use stream::ExtendedStream;

use crate::error::MediaError;
use async_trait::async_trait;
use confab_core::{MediaKind, TrackKind};
use std::any::Any;
use std::sync::Arc;

pub trait MediaTrack: Send + Sync {
    fn id(&self) -> String;
    fn kind(&self) -> TrackKind;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn stop(&self);
    /// Lets a backend recover its concrete track type.
    fn as_any(&self) -> &dyn Any;
}

/// Result of a successful capture.
pub struct CapturedMedia {
    pub tracks: Vec<Arc<dyn MediaTrack>>,
    pub expected_track_count: usize,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, kind: MediaKind) -> Result<CapturedMedia, MediaError>;
}

pub trait MediaSink: Send + Sync {
    fn render(&self, track: &Arc<dyn MediaTrack>, volume: f32);
}
