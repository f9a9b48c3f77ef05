use crate::transport::ConnectionState;
use confab_core::{CodecError, RequestId, RoomError};
use std::time::Duration;
use thiserror::Error;

/// Failures of the signaling channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply carrying the request id arrived in time.
    #[error("request {request_id} timed out after {after:?}")]
    Timeout {
        request_id: RequestId,
        after: Duration,
    },

    /// Send attempted while the channel cannot deliver.
    #[error("transport is {0:?}")]
    Closed(ConnectionState),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("socket error: {0}")]
    Socket(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The transport went away before the request settled.
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum RtcError {
    #[error("session description rejected: {0}")]
    Sdp(String),

    #[error("ice candidate rejected: {0}")]
    Ice(String),

    #[error("operation not allowed in signaling state {0}")]
    InvalidState(String),

    #[error("peer connection closed")]
    Closed,

    #[error("rtc backend error: {0}")]
    Backend(String),
}

impl From<webrtc::Error> for RtcError {
    fn from(err: webrtc::Error) -> Self {
        RtcError::Backend(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queued operation was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media of this kind is not available: {0}")]
    Unavailable(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

/// Failures inside one peer link. These never leave the link; they are
/// logged or turned into a negative signaling message.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Rtc(#[from] RtcError),

    #[error(transparent)]
    Signaling(#[from] TransportError),

    #[error("link destroyed")]
    Destroyed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Join reply carried a room-level error.
    #[error("join failed: {0}")]
    Room(#[from] RoomError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Rtc(#[from] RtcError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("no stream with id {0}")]
    UnknownStream(confab_core::StreamId),

    #[error("not in a room")]
    NotInRoom,

    #[error("unexpected reply to {0}")]
    UnexpectedReply(confab_core::MessageKind),
}
