use crate::error::TransportError;
use crate::link::SignalingOutput;
use crate::transport::Transport;
use async_trait::async_trait;
use confab_core::{
    AnswerAckPayload, AnswerPayload, IceCandidate, Message, Payload, PeerId, RequestId, RoomId,
    SdpPayload, StreamInfo, StreamInfoUpdate,
};

/// Link signaling relayed to the peer through the room's transport.
pub struct RoomSignaling {
    local: PeerId,
    room_id: Option<RoomId>,
    transport: Transport,
}

impl RoomSignaling {
    pub fn new(local: PeerId, room_id: Option<RoomId>, transport: Transport) -> Self {
        Self {
            local,
            room_id,
            transport,
        }
    }

    fn message(&self, peer_id: &PeerId, payload: Payload) -> Message {
        Message::to_peer(self.local.clone(), peer_id.clone(), payload).with_room(self.room_id.clone())
    }
}

#[async_trait]
impl SignalingOutput for RoomSignaling {
    async fn send_offer(&self, peer_id: &PeerId, sdp: String) -> Result<(), TransportError> {
        self.transport
            .send(self.message(peer_id, Payload::Offer(SdpPayload { sdp })))
    }

    async fn send_answer(
        &self,
        peer_id: &PeerId,
        answer: AnswerPayload,
    ) -> Result<(), TransportError> {
        self.transport
            .send(self.message(peer_id, Payload::Answer(answer)))
    }

    async fn send_answer_ack(
        &self,
        peer_id: &PeerId,
        ack: AnswerAckPayload,
    ) -> Result<(), TransportError> {
        self.transport
            .send(self.message(peer_id, Payload::AnswerAck(ack)))
    }

    async fn send_candidate(
        &self,
        peer_id: &PeerId,
        candidate: IceCandidate,
    ) -> Result<(), TransportError> {
        self.transport
            .send(self.message(peer_id, Payload::Candidate(candidate)))
    }

    async fn send_stream_info(
        &self,
        peer_id: &PeerId,
        info: StreamInfo,
    ) -> Result<(), TransportError> {
        self.transport
            .send_and_await(self.message(peer_id, Payload::StreamInfo(info)))
            .await?;
        Ok(())
    }

    async fn send_stream_info_update(
        &self,
        peer_id: &PeerId,
        update: StreamInfoUpdate,
    ) -> Result<(), TransportError> {
        self.transport
            .send_and_await(self.message(peer_id, Payload::StreamInfoUpdate(update)))
            .await?;
        Ok(())
    }

    async fn send_stream_info_reply(
        &self,
        peer_id: &PeerId,
        request_id: Option<RequestId>,
        info: StreamInfo,
    ) -> Result<(), TransportError> {
        let mut reply = self.message(peer_id, Payload::StreamInfo(info));
        reply.request_id = request_id;
        reply.reply = true;
        self.transport.send(reply)
    }
}
