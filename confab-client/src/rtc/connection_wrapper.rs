use crate::error::RtcError;
use crate::media::MediaTrack;
use crate::rtc::{
    ConnectionEvent, PeerConnection, PeerConnectionFactory, SdpType, SessionDescription,
    SignalingState,
};
use async_trait::async_trait;
use confab_core::{IceCandidate, IceServerConfig, PeerId, TrackKind};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Builds peer connections on the `webrtc` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcFactory;

#[async_trait]
impl PeerConnectionFactory for WebRtcFactory {
    async fn create(
        &self,
        remote: &PeerId,
        ice_servers: &[IceServerConfig],
    ) -> Result<(Arc<dyn PeerConnection>, mpsc::UnboundedReceiver<ConnectionEvent>), RtcError>
    {
        let (connection, events) = WebRtcConnection::new(remote.clone(), ice_servers).await?;
        Ok((Arc::new(connection), events))
    }
}

pub struct WebRtcConnection {
    remote: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcConnection {
    pub async fn new(
        remote: PeerId,
        ice_servers: &[IceServerConfig],
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), RtcError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let tx = event_tx.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let _ = tx.send(ConnectionEvent::NegotiationNeeded);
            Box::pin(async {})
        }));

        let tx = event_tx.clone();
        let uid = remote.clone();
        peer_connection.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
            debug!("Signaling state for {} changed: {:?}", uid, s);
            if let Some(state) = from_rtc_state(s) {
                let _ = tx.send(ConnectionEvent::SignalingStateChange(state));
            }
            Box::pin(async {})
        }));

        // Trickle ICE; `None` marks the end of gathering.
        let tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let event = match c {
                None => Some(ConnectionEvent::IceGatheringComplete),
                Some(candidate) => candidate.to_json().ok().map(|init| {
                    ConnectionEvent::LocalCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    })
                }),
            };
            if let Some(event) = event {
                let _ = tx.send(event);
            }
            Box::pin(async {})
        }));

        let tx = event_tx;
        let uid = remote.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                info!("Remote track {} from {}", track.id(), uid);
                let _ = tx.send(ConnectionEvent::Track(Arc::new(RtcRemoteTrack::new(track))));
                Box::pin(async {})
            },
        ));

        Ok((
            Self {
                remote,
                peer_connection,
            },
            event_rx,
        ))
    }

    pub fn inner(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    fn signaling_state(&self) -> SignalingState {
        from_rtc_state(self.peer_connection.signaling_state()).unwrap_or(SignalingState::Stable)
    }

    async fn create_offer(&self) -> Result<SessionDescription, RtcError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| RtcError::Sdp(e.to_string()))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, RtcError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| RtcError::Sdp(e.to_string()))?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| RtcError::Sdp(e.to_string()))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        // This stack has no implicit rollback.
        if desc.sdp_type == SdpType::Offer
            && self.signaling_state() == SignalingState::HaveLocalOffer
        {
            debug!("Rolling back local offer to {}", self.remote);
            self.set_local_description(SessionDescription::rollback())
                .await?;
        }

        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| RtcError::Sdp(e.to_string()))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection.local_description().await?;
        from_rtc(desc).ok()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), RtcError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| RtcError::Ice(e.to_string()))
    }

    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), RtcError> {
        let local = track
            .as_any()
            .downcast_ref::<RtcLocalTrack>()
            .ok_or_else(|| RtcError::Backend(format!("track {} is not an RtcLocalTrack", track.id())))?;

        let sample_track: Arc<dyn TrackLocal + Send + Sync> = local.inner();
        self.peer_connection.add_track(sample_track).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn from_rtc_state(state: RTCSignalingState) -> Option<SignalingState> {
    match state {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPranswer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemotePranswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        _ => None,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, RtcError> {
    let sdp_error = |e: webrtc::Error| RtcError::Sdp(e.to_string());
    match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp).map_err(sdp_error),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp).map_err(sdp_error),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp).map_err(sdp_error),
        SdpType::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            Ok(rollback)
        }
    }
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, RtcError> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => return Err(RtcError::Sdp(format!("unsupported sdp type {other:?}"))),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

/// A local track fed with encoded samples by the capture layer.
pub struct RtcLocalTrack {
    track: Arc<TrackLocalStaticSample>,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl RtcLocalTrack {
    /// VP8 for video, Opus for audio.
    pub fn new(kind: TrackKind, id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        let mime_type = match kind {
            TrackKind::Video => MIME_TYPE_VP8,
            TrackKind::Audio => MIME_TYPE_OPUS,
        };
        let capability = RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            ..Default::default()
        };

        Self {
            track: Arc::new(TrackLocalStaticSample::new(
                capability,
                id.into(),
                stream_id.into(),
            )),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> Arc<TrackLocalStaticSample> {
        self.track.clone()
    }

    /// Samples written while disabled or stopped are dropped.
    pub async fn write_sample(&self, sample: &Sample) -> Result<(), RtcError> {
        if !self.is_enabled() || self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }
        self.track.write_sample(sample).await?;
        Ok(())
    }
}

impl MediaTrack for RtcLocalTrack {
    fn id(&self) -> String {
        self.track.id().to_owned()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct RtcRemoteTrack {
    track: Arc<TrackRemote>,
    enabled: AtomicBool,
}

impl RtcRemoteTrack {
    pub fn new(track: Arc<TrackRemote>) -> Self {
        Self {
            track,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn inner(&self) -> Arc<TrackRemote> {
        self.track.clone()
    }
}

impl MediaTrack for RtcRemoteTrack {
    fn id(&self) -> String {
        self.track.id()
    }

    fn kind(&self) -> TrackKind {
        match self.track.kind() {
            RTPCodecType::Video => TrackKind::Video,
            _ => TrackKind::Audio,
        }
    }

    /// Playback gate for the render side; the RTP flow is unaffected.
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.set_enabled(false);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
