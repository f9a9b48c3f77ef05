//! The seam between negotiation logic and a real-time media stack.

mod connection_wrapper;

pub use connection_wrapper::{RtcLocalTrack, RtcRemoteTrack, WebRtcConnection, WebRtcFactory};

use crate::error::RtcError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use confab_core::{IceCandidate, IceServerConfig, PeerId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveLocalPranswer,
    HaveRemoteOffer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn rollback() -> Self {
        Self {
            sdp_type: SdpType::Rollback,
            sdp: String::new(),
        }
    }
}

/// Everything a peer connection reports back to its link.
pub enum ConnectionEvent {
    NegotiationNeeded,
    SignalingStateChange(SignalingState),
    LocalCandidate(IceCandidate),
    /// Local candidate gathering finished.
    IceGatheringComplete,
    Track(Arc<dyn MediaTrack>),
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            Self::SignalingStateChange(s) => f.debug_tuple("SignalingStateChange").field(s).finish(),
            Self::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(c).finish(),
            Self::IceGatheringComplete => f.write_str("IceGatheringComplete"),
            Self::Track(t) => f.debug_tuple("Track").field(&t.id()).finish(),
        }
    }
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn signaling_state(&self) -> SignalingState;
    async fn create_offer(&self) -> Result<SessionDescription, RtcError>;
    async fn create_answer(&self) -> Result<SessionDescription, RtcError>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), RtcError>;
    /// Applying a remote offer while a local offer is pending rolls the
    /// local one back first.
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), RtcError>;
    async fn local_description(&self) -> Option<SessionDescription>;
    /// Fails while no remote description is set.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), RtcError>;
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), RtcError>;
    async fn close(&self) -> Result<(), RtcError>;
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        remote: &PeerId,
        ice_servers: &[IceServerConfig],
    ) -> Result<(Arc<dyn PeerConnection>, mpsc::UnboundedReceiver<ConnectionEvent>), RtcError>;
}
