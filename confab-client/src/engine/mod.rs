//! Orchestrates transport, peer links and streams for one local identity.

mod dispatch_impl;
mod engine_event;
mod join_impl;
mod leave_impl;
mod link_impl;
mod publish_impl;
mod room_signaling;

pub use engine_event::{EngineEvent, JoinOptions};
pub use room_signaling::RoomSignaling;

use crate::config::{EngineConfig, RtcMode};
use crate::link::{LinkEvent, PeerLink};
use crate::media::{ExtendedStream, MediaSource};
use crate::rtc::PeerConnectionFactory;
use crate::transport::{ConnectionState, Connector, Transport, TransportEvent};
use confab_core::{Message, PeerId, RoomId};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Default)]
struct EngineState {
    room_id: Option<RoomId>,
    invited_room_id: Option<RoomId>,
    in_room: bool,
    /// A join request is in flight; peers may already be connecting to us.
    joining: bool,
    streams: Vec<ExtendedStream>,
    /// Bumped on every leave so work started in an older room can tell.
    generation: u64,
}

struct EngineInner {
    config: EngineConfig,
    transport: Transport,
    factory: Arc<dyn PeerConnectionFactory>,
    media: Arc<dyn MediaSource>,
    links: DashMap<PeerId, PeerLink>,
    state: Mutex<EngineState>,
    streams_tx: watch::Sender<Vec<ExtendedStream>>,
    events: broadcast::Sender<EngineEvent>,
    link_events: mpsc::UnboundedSender<LinkEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct NegotiationEngine {
    inner: Arc<EngineInner>,
}

impl NegotiationEngine {
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: EngineConfig,
        connector: Arc<dyn Connector>,
        factory: Arc<dyn PeerConnectionFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        let (transport, inbound) =
            Transport::new(config.url.clone(), config.transport.clone(), connector);
        let (link_events, link_events_rx) = mpsc::unbounded_channel();
        let (streams_tx, _) = watch::channel(Vec::new());
        let (events, _) = broadcast::channel(256);
        let transport_events = transport.subscribe();

        let engine = Self {
            inner: Arc::new(EngineInner {
                config,
                transport,
                factory,
                media,
                links: DashMap::new(),
                state: Mutex::new(EngineState::default()),
                streams_tx,
                events,
                link_events,
                tasks: Mutex::new(Vec::new()),
            }),
        };

        let weak = Arc::downgrade(&engine.inner);
        let tasks = vec![
            tokio::spawn(dispatch_loop(weak.clone(), inbound)),
            tokio::spawn(link_event_loop(weak.clone(), link_events_rx)),
            tokio::spawn(transport_event_loop(weak, transport_events)),
        ];
        *lock(&engine.inner.tasks) = tasks;

        info!(
            "Negotiation engine for {} created in {:?}",
            engine.inner.config.local_peer, engine.inner.config.mode
        );
        if engine.inner.config.mode == RtcMode::InviteMode {
            engine.inner.transport.open();
        }
        engine
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.inner.config.local_peer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Live read-only view of every known stream.
    pub fn streams(&self) -> watch::Receiver<Vec<ExtendedStream>> {
        self.inner.streams_tx.subscribe()
    }

    pub fn local_streams(&self) -> Vec<ExtendedStream> {
        self.lock_state()
            .streams
            .iter()
            .filter(|s| s.local)
            .cloned()
            .collect()
    }

    pub fn room_id(&self) -> Option<RoomId> {
        self.lock_state().room_id.clone()
    }

    pub fn invited_room_id(&self) -> Option<RoomId> {
        self.lock_state().invited_room_id.clone()
    }

    pub fn is_in_room(&self) -> bool {
        self.lock_state().in_room
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.inner.links.iter().map(|l| l.key().clone()).collect()
    }

    pub fn link(&self, peer: &PeerId) -> Option<PeerLink> {
        self.inner.links.get(peer).map(|l| l.value().clone())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.transport.state()
    }

    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Leave, close the transport and stop the background tasks.
    pub async fn shutdown(&self) {
        self.leave().await;
        self.inner.transport.close().await;

        let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        for task in tasks {
            task.abort();
        }
        info!("Negotiation engine for {} shut down", self.inner.config.local_peer);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.inner.state)
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Push the current stream set to `streams()` watchers.
    fn publish_streams(&self) {
        let streams = self.lock_state().streams.clone();
        self.inner.streams_tx.send_replace(streams);
    }

    fn upgrade(weak: &Weak<EngineInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

async fn dispatch_loop(engine: Weak<EngineInner>, mut inbound: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = inbound.recv().await {
        let Some(engine) = NegotiationEngine::upgrade(&engine) else {
            break;
        };
        engine.handle_message(message).await;
    }
    debug!("Dispatch loop finished");
}

async fn link_event_loop(
    engine: Weak<EngineInner>,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(engine) = NegotiationEngine::upgrade(&engine) else {
            break;
        };
        engine.handle_link_event(event);
    }
}

async fn transport_event_loop(
    engine: Weak<EngineInner>,
    mut events: broadcast::Receiver<TransportEvent>,
) {
    loop {
        match events.recv().await {
            Ok(TransportEvent::Reconnected { attempts }) => {
                let Some(engine) = NegotiationEngine::upgrade(&engine) else {
                    break;
                };
                engine.emit(EngineEvent::Reconnected { attempts });
            }
            Ok(TransportEvent::StateChanged(_)) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
