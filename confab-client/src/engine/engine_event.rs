use crate::media::ExtendedStream;
use confab_core::{MessageKind, PeerId, RoomId, StreamId};
use serde_json::Value;

/// What observers of the engine are told about.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    RemoteInvite {
        room_id: RoomId,
        inviter: Option<PeerId>,
        extra: Value,
    },
    PeerJoined(PeerId),
    PeerConnected(PeerId),
    RemoteLeave(PeerId),
    LocalStreamAdded(ExtendedStream),
    RemoteStreamAdded(ExtendedStream),
    StreamUpdated(ExtendedStream),
    StreamRemoved {
        stream_id: StreamId,
        owner: PeerId,
    },
    RoomUsers(Vec<PeerId>),
    /// `text` or `notice` envelopes, passed through untouched.
    Chat {
        kind: MessageKind,
        from: Option<PeerId>,
        content: Value,
    },
    Reconnected {
        attempts: u32,
    },
}

/// Which room to join. Without a room id the relay creates one and invites
/// `invite`.
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub room_id: Option<RoomId>,
    pub invite: Vec<PeerId>,
    pub extra: Value,
}

impl JoinOptions {
    pub fn create(invite: Vec<PeerId>) -> Self {
        Self {
            invite,
            ..Default::default()
        }
    }

    pub fn room(room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            ..Default::default()
        }
    }

    /// Accept an invite received earlier.
    pub fn invited(room_id: RoomId) -> Self {
        Self::room(room_id)
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}
