use async_trait::async_trait;
use confab_client::{SignalingOutput, TransportError};
use confab_core::{
    AnswerAckPayload, AnswerPayload, IceCandidate, PeerId, RequestId, StreamInfo, StreamInfoUpdate,
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone)]
pub enum SignalRecord {
    Offer { peer_id: PeerId, sdp: String },
    Answer { peer_id: PeerId, answer: AnswerPayload },
    AnswerAck { peer_id: PeerId, ack: AnswerAckPayload },
    Candidate { peer_id: PeerId, candidate: IceCandidate },
    StreamInfo { peer_id: PeerId, info: StreamInfo },
    StreamInfoUpdate { peer_id: PeerId, update: StreamInfoUpdate },
    StreamInfoReply { peer_id: PeerId, request_id: Option<RequestId>, info: StreamInfo },
}

/// SignalingOutput that captures every outgoing signal.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<SignalRecord>,
    signals: Arc<Mutex<Vec<SignalRecord>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub async fn signals(&self) -> Vec<SignalRecord> {
        self.signals.lock().await.clone()
    }

    pub async fn offers(&self) -> Vec<String> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SignalRecord::Offer { sdp, .. } => Some(sdp.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn answers(&self) -> Vec<AnswerPayload> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                SignalRecord::Answer { answer, .. } => Some(answer.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, signal: SignalRecord) {
        tracing::debug!("[MockSignaling] {:?}", signal);
        self.signals.lock().await.push(signal.clone());
        let _ = self.tx.send(signal);
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_offer(&self, peer_id: &PeerId, sdp: String) -> Result<(), TransportError> {
        self.record(SignalRecord::Offer {
            peer_id: peer_id.clone(),
            sdp,
        })
        .await;
        Ok(())
    }

    async fn send_answer(
        &self,
        peer_id: &PeerId,
        answer: AnswerPayload,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::Answer {
            peer_id: peer_id.clone(),
            answer,
        })
        .await;
        Ok(())
    }

    async fn send_answer_ack(
        &self,
        peer_id: &PeerId,
        ack: AnswerAckPayload,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::AnswerAck {
            peer_id: peer_id.clone(),
            ack,
        })
        .await;
        Ok(())
    }

    async fn send_candidate(
        &self,
        peer_id: &PeerId,
        candidate: IceCandidate,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::Candidate {
            peer_id: peer_id.clone(),
            candidate,
        })
        .await;
        Ok(())
    }

    async fn send_stream_info(
        &self,
        peer_id: &PeerId,
        info: StreamInfo,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::StreamInfo {
            peer_id: peer_id.clone(),
            info,
        })
        .await;
        Ok(())
    }

    async fn send_stream_info_update(
        &self,
        peer_id: &PeerId,
        update: StreamInfoUpdate,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::StreamInfoUpdate {
            peer_id: peer_id.clone(),
            update,
        })
        .await;
        Ok(())
    }

    async fn send_stream_info_reply(
        &self,
        peer_id: &PeerId,
        request_id: Option<RequestId>,
        info: StreamInfo,
    ) -> Result<(), TransportError> {
        self.record(SignalRecord::StreamInfoReply {
            peer_id: peer_id.clone(),
            request_id,
            info,
        })
        .await;
        Ok(())
    }
}
