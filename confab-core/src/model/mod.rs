mod message;
mod peer;
mod request;
mod room;
mod signaling;
mod stream;

pub use message::{
    AnswerAckPayload, AnswerPayload, ChatPayload, CodecError, HeartbeatPayload, InvitePayload,
    JoinPayload, Message, MessageKind, Payload, PeerPayload, RoomUsersPayload, SdpPayload,
};
pub use peer::PeerId;
pub use request::RequestId;
pub use room::{RoomError, RoomId};
pub use signaling::{IceCandidate, IceServerConfig};
pub use stream::{
    DEFAULT_VOLUME, MediaKind, StreamId, StreamInfo, StreamInfoPatch, StreamInfoUpdate, TrackKind,
    clamp_volume,
};
