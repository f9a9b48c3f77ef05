use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Volume a freshly published stream starts with.
pub const DEFAULT_VOLUME: f32 = 0.75;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct StreamId(pub Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the publisher asked the capture layer for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Video,
    Audio,
    Screen,
}

impl MediaKind {
    /// Tracks a capture of this kind produces: camera and screen carry
    /// video plus audio, audio-only carries one track.
    pub fn expected_track_count(self) -> usize {
        match self {
            MediaKind::Video | MediaKind::Screen => 2,
            MediaKind::Audio => 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Declarative description of a published stream.
///
/// The publisher sends this after adding its tracks so the subscriber knows
/// how many tracks to wait for. The `remote*` fields mirror the publisher's
/// own mute and volume state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub stream_id: StreamId,
    pub media_kind: MediaKind,
    pub need_track_count: usize,
    #[serde(default)]
    pub remote_video_muted: bool,
    #[serde(default)]
    pub remote_audio_muted: bool,
    #[serde(default = "default_volume")]
    pub remote_volume: f32,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

/// Clamp into `0.0..=1.0`. Non-finite input has no volume to clamp to.
pub fn clamp_volume(volume: f32) -> Option<f32> {
    volume.is_finite().then(|| volume.clamp(0.0, 1.0))
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

impl StreamInfo {
    pub fn new(media_kind: MediaKind, need_track_count: usize) -> Self {
        Self {
            stream_id: StreamId::new(),
            media_kind,
            need_track_count,
            remote_video_muted: false,
            remote_audio_muted: false,
            remote_volume: DEFAULT_VOLUME,
            extra: serde_json::Value::Null,
        }
    }

    /// Merge the fields present in `patch`. Returns whether anything changed.
    pub fn apply(&mut self, patch: &StreamInfoPatch) -> bool {
        let mut changed = false;
        if let Some(muted) = patch.remote_video_muted {
            changed |= self.remote_video_muted != muted;
            self.remote_video_muted = muted;
        }
        if let Some(muted) = patch.remote_audio_muted {
            changed |= self.remote_audio_muted != muted;
            self.remote_audio_muted = muted;
        }
        if let Some(volume) = patch.remote_volume.and_then(clamp_volume) {
            changed |= self.remote_volume != volume;
            self.remote_volume = volume;
        }
        changed
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_video_muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_audio_muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_volume: Option<f32>,
}

impl StreamInfoPatch {
    pub fn is_empty(&self) -> bool {
        self.remote_video_muted.is_none()
            && self.remote_audio_muted.is_none()
            && self.remote_volume.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfoUpdate {
    pub stream_id: StreamId,
    pub patch: StreamInfoPatch,
}
