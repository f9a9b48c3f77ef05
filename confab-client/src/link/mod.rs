//! One negotiated connection to a single remote peer.

mod negotiation_impl;
mod publish_impl;
mod signaling_output;

pub use signaling_output::SignalingOutput;

use crate::assembler::{AssembledStream, StreamAssembler};
use crate::error::LinkError;
use crate::queue::SerialQueue;
use crate::rtc::{ConnectionEvent, PeerConnection, SignalingState};
use confab_core::PeerId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collision role, fixed for the lifetime of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Politeness {
    /// Yields on collision: rolls back its own offer and answers the remote one.
    Polite,
    /// Wins on collision: ignores a colliding remote offer.
    Impolite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    pub making_offer: bool,
    /// Bumped when a polite link yields; offers begun before it are stale.
    pub offer_epoch: u64,
    pub sdp_ok: bool,
    pub ice_ok: bool,
    pub connected_notified: bool,
    pub destroyed: bool,
}

pub enum LinkEvent {
    /// Both `sdp_ok` and `ice_ok` hold. Sent once per link.
    Connected { peer: PeerId },
    StreamAssembled(AssembledStream),
}

struct LinkInner {
    remote: PeerId,
    politeness: Politeness,
    connection: Arc<dyn PeerConnection>,
    state: Mutex<LinkState>,
    ice_queue: SerialQueue,
    publish_queue: SerialQueue,
    assembler: Mutex<StreamAssembler>,
    signaling: Arc<dyn SignalingOutput>,
    events: mpsc::UnboundedSender<LinkEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct PeerLink {
    inner: Arc<LinkInner>,
}

impl PeerLink {
    pub fn new(
        remote: PeerId,
        politeness: Politeness,
        connection: Arc<dyn PeerConnection>,
        connection_events: mpsc::UnboundedReceiver<ConnectionEvent>,
        signaling: Arc<dyn SignalingOutput>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        info!("Creating {:?} link to {}", politeness, remote);

        let link = Self {
            inner: Arc::new(LinkInner {
                assembler: Mutex::new(StreamAssembler::new(remote.clone())),
                remote,
                politeness,
                connection,
                state: Mutex::new(LinkState::default()),
                // Candidates wait for the first remote description.
                ice_queue: SerialQueue::paused(),
                publish_queue: SerialQueue::new(),
                signaling,
                events,
                pump: Mutex::new(None),
            }),
        };

        let pump = tokio::spawn(event_pump(link.weak(), connection_events));
        *lock(&link.inner.pump) = Some(pump);
        link
    }

    pub fn remote(&self) -> &PeerId {
        &self.inner.remote
    }

    pub fn politeness(&self) -> Politeness {
        self.inner.politeness
    }

    pub fn state(&self) -> LinkState {
        *self.lock_state()
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.inner.connection.signaling_state()
    }

    pub fn is_connected(&self) -> bool {
        let state = self.lock_state();
        state.sdp_ok && state.ice_ok
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock_state().destroyed
    }

    /// ICE candidates waiting for a remote description.
    pub fn queued_candidates(&self) -> usize {
        self.inner.ice_queue.len()
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.inner.connection
    }

    /// Tear down without waiting for in-flight negotiation. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = self.lock_state();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.making_offer = false;
        }
        info!("Destroying link to {}", self.inner.remote);

        // Stop listening before closing.
        if let Some(pump) = lock(&self.inner.pump).take() {
            pump.abort();
        }
        self.inner.ice_queue.pause();
        self.inner.ice_queue.clear();
        self.inner.publish_queue.pause();
        self.inner.publish_queue.clear();
        lock(&self.inner.assembler).clear();

        let connection = self.inner.connection.clone();
        let remote = self.inner.remote.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.close().await {
                warn!("Closing connection to {} failed: {}", remote, e);
            }
        });
    }

    fn weak(&self) -> Weak<LinkInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<LinkInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn lock_state(&self) -> MutexGuard<'_, LinkState> {
        lock(&self.inner.state)
    }

    fn ensure_alive(&self) -> Result<(), LinkError> {
        if self.is_destroyed() {
            Err(LinkError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn check_connected(&self) {
        let notify = {
            let mut state = self.lock_state();
            if state.destroyed || state.connected_notified || !(state.sdp_ok && state.ice_ok) {
                false
            } else {
                state.connected_notified = true;
                true
            }
        };

        if notify {
            info!("Link to {} connected", self.inner.remote);
            let _ = self.inner.events.send(LinkEvent::Connected {
                peer: self.inner.remote.clone(),
            });
        }
    }

    async fn handle_connection_event(&self, event: ConnectionEvent) {
        if self.is_destroyed() {
            return;
        }

        match event {
            ConnectionEvent::NegotiationNeeded => {
                let link = self.clone();
                tokio::spawn(async move { link.negotiate().await });
            }
            ConnectionEvent::SignalingStateChange(state) => {
                debug!("Link to {} signaling state {}", self.inner.remote, state);
                if matches!(
                    state,
                    SignalingState::HaveRemoteOffer | SignalingState::HaveRemotePranswer
                ) {
                    self.inner.ice_queue.resume();
                }
            }
            ConnectionEvent::LocalCandidate(candidate) => {
                if let Err(e) = self
                    .inner
                    .signaling
                    .send_candidate(&self.inner.remote, candidate)
                    .await
                {
                    warn!("Failed to send candidate to {}: {}", self.inner.remote, e);
                }
            }
            ConnectionEvent::IceGatheringComplete => {
                debug!("ICE gathering for {} complete", self.inner.remote);
                self.lock_state().ice_ok = true;
                self.check_connected();
            }
            ConnectionEvent::Track(track) => {
                let assembled = lock(&self.inner.assembler).add_track(track);
                if let Some(assembled) = assembled {
                    self.on_assembled(assembled).await;
                }
            }
        }
    }
}

async fn event_pump(
    link: Weak<LinkInner>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(link) = PeerLink::upgrade(&link) else {
            break;
        };
        link.handle_connection_event(event).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
