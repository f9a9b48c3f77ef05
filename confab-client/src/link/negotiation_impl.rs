use super::{PeerLink, Politeness};
use crate::error::{LinkError, RtcError};
use crate::rtc::{SessionDescription, SignalingState};
use confab_core::{AnswerAckPayload, AnswerPayload, IceCandidate};
use tracing::{debug, info, warn};

impl PeerLink {
    /// Offer routine run on `negotiationneeded`.
    pub(crate) async fn negotiate(&self) {
        let epoch = {
            let mut state = self.lock_state();
            if state.destroyed || state.making_offer {
                return;
            }
            state.making_offer = true;
            state.offer_epoch
        };

        let result = self.send_local_offer(epoch).await;
        {
            let mut state = self.lock_state();
            if state.offer_epoch == epoch {
                state.making_offer = false;
            }
        }

        match result {
            Ok(()) | Err(LinkError::Destroyed) => {}
            Err(e) if self.offer_superseded(epoch) => {
                debug!("Superseded offer to {} failed: {}", self.inner.remote, e)
            }
            Err(e) => warn!("Offer to {} failed: {}", self.inner.remote, e),
        }
    }

    fn offer_superseded(&self, epoch: u64) -> bool {
        self.lock_state().offer_epoch != epoch
    }

    async fn send_local_offer(&self, epoch: u64) -> Result<(), LinkError> {
        let connection = &self.inner.connection;

        let offer = connection.create_offer().await?;
        self.ensure_alive()?;
        if self.offer_superseded(epoch) {
            debug!("Offer to {} superseded before it was applied", self.inner.remote);
            return Ok(());
        }

        let stale_sdp = offer.sdp.clone();
        connection.set_local_description(offer).await?;
        self.ensure_alive()?;
        if self.offer_superseded(epoch) {
            debug!("Offer to {} superseded, rolling back", self.inner.remote);
            return self.rollback_stale_offer(&stale_sdp).await;
        }

        let local = connection
            .local_description()
            .await
            .ok_or_else(|| RtcError::InvalidState("no local offer".to_owned()))?;
        self.ensure_alive()?;
        if self.offer_superseded(epoch) {
            return self.rollback_stale_offer(&stale_sdp).await;
        }

        debug!("Sending offer to {}", self.inner.remote);
        self.inner
            .signaling
            .send_offer(&self.inner.remote, local.sdp)
            .await?;
        Ok(())
    }

    /// Undo a yielded offer that landed after the remote exchange.
    /// A newer local offer is left alone.
    async fn rollback_stale_offer(&self, stale_sdp: &str) -> Result<(), LinkError> {
        let connection = &self.inner.connection;
        if connection.signaling_state() != SignalingState::HaveLocalOffer {
            return Ok(());
        }
        let current = connection.local_description().await;
        if current.is_some_and(|desc| desc.sdp != stale_sdp) {
            return Ok(());
        }
        connection
            .set_local_description(SessionDescription::rollback())
            .await?;
        Ok(())
    }

    pub async fn handle_offer(&self, sdp: String) {
        if self.is_destroyed() {
            return;
        }

        let collision = {
            let state = self.lock_state();
            state.making_offer || self.inner.connection.signaling_state() != SignalingState::Stable
        };

        if collision {
            if self.inner.politeness == Politeness::Impolite {
                info!("Ignoring colliding offer from {}", self.inner.remote);
                return;
            }
            debug!("Offer collision with {}, yielding", self.inner.remote);
            let mut state = self.lock_state();
            state.making_offer = false;
            state.offer_epoch += 1;
        }

        let payload = match self.answer_offer(sdp).await {
            Ok(sdp) => AnswerPayload {
                sdp: Some(sdp),
                error: None,
            },
            Err(LinkError::Destroyed) => return,
            Err(e) => {
                warn!("Failed to answer offer from {}: {}", self.inner.remote, e);
                AnswerPayload {
                    sdp: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if self.is_destroyed() {
            return;
        }
        if let Err(e) = self
            .inner
            .signaling
            .send_answer(&self.inner.remote, payload)
            .await
        {
            warn!("Failed to send answer to {}: {}", self.inner.remote, e);
        }
    }

    async fn answer_offer(&self, sdp: String) -> Result<String, LinkError> {
        let connection = &self.inner.connection;

        connection
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        self.ensure_alive()?;
        self.inner.ice_queue.resume();

        let answer = connection.create_answer().await?;
        self.ensure_alive()?;
        connection.set_local_description(answer).await?;
        self.ensure_alive()?;

        let local = connection
            .local_description()
            .await
            .ok_or_else(|| RtcError::InvalidState("no local answer".to_owned()))?;
        Ok(local.sdp)
    }

    pub async fn handle_answer(&self, answer: AnswerPayload) {
        if self.is_destroyed() {
            return;
        }
        let connection = &self.inner.connection;

        let Some(sdp) = answer.sdp else {
            warn!(
                "{} could not answer our offer: {}",
                self.inner.remote,
                answer.error.as_deref().unwrap_or("no reason given")
            );
            // Back to stable so the next negotiation can start clean.
            if connection.signaling_state() == SignalingState::HaveLocalOffer
                && let Err(e) = connection
                    .set_local_description(SessionDescription::rollback())
                    .await
            {
                warn!("Rollback for {} failed: {}", self.inner.remote, e);
            }
            return;
        };

        let applied = connection
            .set_remote_description(SessionDescription::answer(sdp))
            .await;
        if self.is_destroyed() {
            return;
        }

        let ack = match applied {
            Ok(()) => {
                self.lock_state().sdp_ok = true;
                self.inner.ice_queue.resume();
                AnswerAckPayload { error: None }
            }
            Err(e) => {
                warn!("Failed to apply answer from {}: {}", self.inner.remote, e);
                AnswerAckPayload {
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = self
            .inner
            .signaling
            .send_answer_ack(&self.inner.remote, ack)
            .await
        {
            warn!("Failed to send answer ack to {}: {}", self.inner.remote, e);
        }
        self.check_connected();
    }

    pub fn handle_answer_ack(&self, ack: AnswerAckPayload) {
        if self.is_destroyed() {
            return;
        }
        match ack.error {
            None => {
                self.lock_state().sdp_ok = true;
                self.check_connected();
            }
            Some(error) => warn!("{} rejected our answer: {}", self.inner.remote, error),
        }
    }

    /// Applied in arrival order once a remote description exists.
    pub fn handle_candidate(&self, candidate: IceCandidate) {
        if self.is_destroyed() {
            return;
        }

        let weak = self.weak();
        let _ = self.inner.ice_queue.enqueue(async move {
            let Some(link) = PeerLink::upgrade(&weak) else {
                return;
            };
            if link.is_destroyed() {
                return;
            }
            if let Err(e) = link.inner.connection.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate from {}: {}", link.inner.remote, e);
            }
        });
    }
}
