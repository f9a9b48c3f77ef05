use crate::assembler::AssembledStream;
use crate::media::{CapturedMedia, MediaSink, MediaTrack};
use confab_core::{
    DEFAULT_VOLUME, MediaKind, PeerId, StreamId, StreamInfo, StreamInfoPatch, TrackKind,
    clamp_volume,
};
use std::fmt;
use std::sync::Arc;

/// A published or received media stream plus its negotiated metadata.
///
/// `video_muted`, `audio_muted` and `volume` are what the local user wants.
/// The `remote*` fields of `info` mirror the publisher's own flags.
#[derive(Clone)]
pub struct ExtendedStream {
    pub id: StreamId,
    pub owner: PeerId,
    pub local: bool,
    pub tracks: Vec<Arc<dyn MediaTrack>>,
    pub info: StreamInfo,
    pub video_muted: bool,
    pub audio_muted: bool,
    pub volume: f32,
}

impl ExtendedStream {
    pub fn local(
        owner: PeerId,
        captured: CapturedMedia,
        kind: MediaKind,
        extra: serde_json::Value,
    ) -> Self {
        let mut info = StreamInfo::new(kind, captured.expected_track_count);
        info.extra = extra;

        Self {
            id: info.stream_id,
            owner,
            local: true,
            tracks: captured.tracks,
            info,
            video_muted: false,
            audio_muted: false,
            volume: DEFAULT_VOLUME,
        }
    }

    /// Remote streams play at full local volume; the publisher's own
    /// volume still scales them through `info.remote_volume`.
    pub fn remote(assembled: AssembledStream) -> Self {
        Self {
            id: assembled.info.stream_id,
            owner: assembled.owner,
            local: false,
            tracks: assembled.tracks,
            info: assembled.info,
            video_muted: false,
            audio_muted: false,
            volume: 1.0,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.info.media_kind
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Returns the patch remote subscribers need, if any.
    pub fn set_video_muted(&mut self, muted: bool) -> Option<StreamInfoPatch> {
        if self.video_muted == muted {
            return None;
        }
        self.video_muted = muted;
        self.tracks_of(TrackKind::Video)
            .for_each(|t| t.set_enabled(!muted));

        self.local.then(|| {
            self.info.remote_video_muted = muted;
            StreamInfoPatch {
                remote_video_muted: Some(muted),
                ..Default::default()
            }
        })
    }

    pub fn set_audio_muted(&mut self, muted: bool) -> Option<StreamInfoPatch> {
        if self.audio_muted == muted {
            return None;
        }
        self.audio_muted = muted;
        self.tracks_of(TrackKind::Audio)
            .for_each(|t| t.set_enabled(!muted));

        self.local.then(|| {
            self.info.remote_audio_muted = muted;
            StreamInfoPatch {
                remote_audio_muted: Some(muted),
                ..Default::default()
            }
        })
    }

    /// Ignores non-finite volumes.
    pub fn set_volume(&mut self, volume: f32) -> Option<StreamInfoPatch> {
        let volume = clamp_volume(volume)?;
        if self.volume == volume {
            return None;
        }
        self.volume = volume;

        self.local.then(|| {
            self.info.remote_volume = volume;
            StreamInfoPatch {
                remote_volume: Some(volume),
                ..Default::default()
            }
        })
    }

    /// Merge what the publisher reported about its own stream.
    pub fn apply_remote_patch(&mut self, patch: &StreamInfoPatch) -> bool {
        self.info.apply(patch)
    }

    pub fn effective_volume(&self) -> f32 {
        if self.local {
            self.volume
        } else {
            self.volume * self.info.remote_volume
        }
    }

    pub fn render(&self, sink: &dyn MediaSink, video: bool, audio: bool) {
        let volume = self.effective_volume();
        for track in &self.tracks {
            let wanted = match track.kind() {
                TrackKind::Video => video,
                TrackKind::Audio => audio,
            };
            if wanted {
                sink.render(track, volume);
            }
        }
    }

    pub fn stop(&self) {
        self.tracks.iter().for_each(|t| t.stop());
    }
}

impl fmt::Debug for ExtendedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedStream")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("local", &self.local)
            .field("tracks", &self.tracks.iter().map(|t| t.id()).collect::<Vec<_>>())
            .field("info", &self.info)
            .field("video_muted", &self.video_muted)
            .field("audio_muted", &self.audio_muted)
            .field("volume", &self.volume)
            .finish()
    }
}
