use super::{JoinOptions, NegotiationEngine};
use crate::config::RtcMode;
use crate::error::EngineError;
use confab_core::{JoinPayload, Message, Payload, RoomError, RoomId};
use tracing::{info, warn};

impl NegotiationEngine {
    /// Join (or create) a room. On failure nothing but the error is left
    /// behind.
    pub async fn join(&self, options: JoinOptions) -> Result<RoomId, EngineError> {
        info!(
            "{} joining room {:?}",
            self.inner.config.local_peer, options.room_id
        );

        let normal_mode = self.inner.config.mode == RtcMode::NormalMode;
        if normal_mode {
            self.inner.transport.open();
        }
        self.lock_state().joining = true;

        let result = self.request_join(options).await;
        match &result {
            Ok(room_id) => {
                let mut state = self.lock_state();
                state.joining = false;
                if state.invited_room_id.as_ref() == Some(room_id) {
                    state.invited_room_id = None;
                }
                state.room_id = Some(room_id.clone());
                state.in_room = true;
                info!("Joined room {}", room_id);
            }
            Err(e) => {
                self.lock_state().joining = false;
                warn!("Join failed: {}", e);
                if normal_mode && !self.is_in_room() {
                    self.inner.transport.close().await;
                }
            }
        }
        result
    }

    async fn request_join(&self, options: JoinOptions) -> Result<RoomId, EngineError> {
        let request = Message::to_relay(
            self.inner.config.local_peer.clone(),
            Payload::Join(JoinPayload {
                invite: options.invite,
                extra: options.extra,
                error: None,
            }),
        )
        .with_room(options.room_id.clone());

        let reply = self.inner.transport.send_and_await(request).await?;
        let kind = reply.kind();
        let Payload::Join(payload) = reply.payload else {
            return Err(EngineError::UnexpectedReply(kind));
        };
        if let Some(error) = payload.error {
            return Err(EngineError::Room(error));
        }

        reply
            .room_id
            .or(options.room_id)
            .ok_or(EngineError::Room(RoomError::Unknown))
    }
}
