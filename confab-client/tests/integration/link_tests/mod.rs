
use std::sync::Arc;

use confab_client::{CapturedMedia, ExtendedStream, MediaTrack};
use confab_core::{MediaKind, PeerId, TrackKind};
use serde_json::Value;

use crate::utils::{FakeTrack, TrackRegistry};

/// A local two-track video stream whose tracks are known to `registry`.
pub fn video_stream(registry: &TrackRegistry, label: &str) -> ExtendedStream {
    let tracks: Vec<Arc<dyn MediaTrack>> = vec![
        Arc::new(FakeTrack::new(format!("{}-video", label), TrackKind::Video)),
        Arc::new(FakeTrack::new(format!("{}-audio", label), TrackKind::Audio)),
    ];
    for track in &tracks {
        registry.insert(track.clone());
    }
    ExtendedStream::local(
        PeerId::from("local"),
        CapturedMedia {
            tracks,
            expected_track_count: 2,
        },
        MediaKind::Video,
        Value::Null,
    )
}

/// Register `count` remote tracks and return their ids.
pub fn remote_tracks(registry: &TrackRegistry, label: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|n| {
            let kind = if n == 0 { TrackKind::Video } else { TrackKind::Audio };
            let track: Arc<dyn MediaTrack> =
                Arc::new(FakeTrack::new(format!("{}-{}", label, n), kind));
            registry.insert(track.clone());
            track.id()
        })
        .collect()
}
