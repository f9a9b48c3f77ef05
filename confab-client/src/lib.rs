pub mod assembler;
pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod media;
pub mod queue;
pub mod rtc;
pub mod transport;

pub use assembler::{AssembledStream, StreamAssembler};
pub use config::{EngineConfig, RtcMode, TransportConfig};
pub use engine::{EngineEvent, JoinOptions, NegotiationEngine};
pub use error::{EngineError, LinkError, MediaError, QueueError, RtcError, TransportError};
pub use link::{LinkEvent, PeerLink, Politeness, SignalingOutput};
pub use media::{CapturedMedia, ExtendedStream, MediaSink, MediaSource, MediaTrack};
pub use queue::{QueueTicket, SerialQueue};
pub use rtc::{
    ConnectionEvent, PeerConnection, PeerConnectionFactory, SdpType, SessionDescription,
    SignalingState,
};
pub use transport::{ConnectionState, Connector, Frame, Transport, TransportEvent, WsConnector};
