use crate::error::TransportError;
use async_trait::async_trait;
use confab_core::{
    AnswerAckPayload, AnswerPayload, IceCandidate, PeerId, RequestId, StreamInfo, StreamInfoUpdate,
};

/// Where a peer link sends the signaling it produces.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_offer(&self, peer_id: &PeerId, sdp: String) -> Result<(), TransportError>;

    async fn send_answer(&self, peer_id: &PeerId, answer: AnswerPayload)
    -> Result<(), TransportError>;

    async fn send_answer_ack(
        &self,
        peer_id: &PeerId,
        ack: AnswerAckPayload,
    ) -> Result<(), TransportError>;

    async fn send_candidate(
        &self,
        peer_id: &PeerId,
        candidate: IceCandidate,
    ) -> Result<(), TransportError>;

    /// Resolves once the subscriber has assembled the stream and replied.
    async fn send_stream_info(&self, peer_id: &PeerId, info: StreamInfo)
    -> Result<(), TransportError>;

    /// Resolves once the subscriber acknowledged the update.
    async fn send_stream_info_update(
        &self,
        peer_id: &PeerId,
        update: StreamInfoUpdate,
    ) -> Result<(), TransportError>;

    async fn send_stream_info_reply(
        &self,
        peer_id: &PeerId,
        request_id: Option<RequestId>,
        info: StreamInfo,
    ) -> Result<(), TransportError>;
}
