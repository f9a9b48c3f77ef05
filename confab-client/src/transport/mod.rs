mod connector;
mod heartbeat;
mod pending;
mod transport_event;

pub use connector::{
    CLOSE_HEARTBEAT_LOST, CLOSE_NORMAL, Connector, Frame, FrameSink, FrameStream, WsConnector,
};
pub use heartbeat::{HeartbeatMonitor, Liveness};
pub use pending::PendingRequests;
pub use transport_event::{ConnectionState, TransportEvent};

use crate::config::TransportConfig;
use crate::error::TransportError;
use confab_core::{HeartbeatPayload, Message, Payload, RequestId};
use futures::{SinkExt, StreamExt};
use pending::PendingGuard;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

enum SessionEnd {
    Shutdown,
    RemoteClosed,
    Failed,
    HeartbeatLost,
}

struct Session {
    outbound: mpsc::UnboundedSender<Message>,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

struct TransportInner {
    url: String,
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    inbound: mpsc::UnboundedSender<Message>,
    pending: PendingRequests,
    session: Mutex<Option<Session>>,
}

/// Reconnecting, heartbeat-monitored signaling channel with request/response
/// correlation.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    /// The receiver yields every inbound message that is neither a heartbeat
    /// acknowledgment nor a reply.
    pub fn new(
        url: impl Into<String>,
        config: TransportConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Closed);
        let (events, _) = broadcast::channel(64);

        let transport = Self {
            inner: Arc::new(TransportInner {
                url: url.into(),
                config,
                connector,
                state,
                events,
                inbound,
                pending: PendingRequests::default(),
                session: Mutex::new(None),
            }),
        };
        (transport, inbound_rx)
    }

    /// Start the connection supervisor. No-op while one is running.
    pub fn open(&self) {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            return;
        }

        info!("Opening transport to {}", self.inner.url);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        self.inner.set_state(ConnectionState::Connecting);

        let handle = tokio::spawn(supervise(self.inner.clone(), outbound_rx, shutdown.clone()));
        *session = Some(Session {
            outbound,
            shutdown,
            handle,
        });
    }

    /// Graceful close: flushes what was already sent, sends a normal close
    /// frame and does not reconnect.
    pub async fn close(&self) {
        let session = self.lock_session().take();
        let Some(session) = session else {
            self.inner.set_state(ConnectionState::Closed);
            return;
        };

        info!("Closing transport to {}", self.inner.url);
        session.shutdown.notify_one();
        drop(session.outbound);
        if let Err(e) = session.handle.await {
            warn!("Transport supervisor ended abnormally: {}", e);
        }
        self.inner.set_state(ConnectionState::Closed);
    }

    /// Fire and forget. Buffered while connecting.
    pub fn send(&self, mut message: Message) -> Result<(), TransportError> {
        let state = self.state();
        if !state.accepts_sends() {
            return Err(TransportError::Closed(state));
        }
        if message.request_id.is_none() {
            message.request_id = Some(RequestId::new());
        }

        let session = self.lock_session();
        let Some(session) = session.as_ref() else {
            return Err(TransportError::Closed(state));
        };
        session
            .outbound
            .send(message)
            .map_err(|_| TransportError::Closed(ConnectionState::Closed))
    }

    /// Send with a fresh request id and wait for the reply echoing it.
    pub async fn send_and_await(&self, mut message: Message) -> Result<Message, TransportError> {
        let request_id = RequestId::new();
        message.request_id = Some(request_id);
        let kind = message.kind();

        let rx = self.inner.pending.register(request_id);
        let _guard = PendingGuard::new(self.inner.pending.clone(), request_id);
        self.send(message)?;

        let after = self.inner.config.request_timeout;
        match tokio::time::timeout(after, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransportError::Cancelled),
            Err(_) => {
                warn!("Request {} ({}) got no reply within {:?}", request_id, kind, after);
                Err(TransportError::Timeout { request_id, after })
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn supervise(
    inner: Arc<TransportInner>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    shutdown: Arc<Notify>,
) {
    let mut attempts: u32 = 0;

    loop {
        // The first reconnect is immediate, later ones wait a fixed interval.
        if attempts > 1 {
            tokio::select! {
                _ = tokio::time::sleep(inner.config.reconnect_interval) => {}
                _ = shutdown.notified() => break,
            }
        }

        inner.set_state(ConnectionState::Connecting);
        let connected = tokio::select! {
            res = inner.connector.connect(&inner.url) => res,
            _ = shutdown.notified() => break,
        };

        let end = match connected {
            Ok((sink, stream)) => {
                inner.set_state(ConnectionState::Open);
                if attempts > 0 {
                    info!("Transport reconnected after {} attempts", attempts);
                    let _ = inner.events.send(TransportEvent::Reconnected { attempts });
                }
                attempts = 0;
                inner.run_session(sink, stream, &mut outbound, &shutdown).await
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", inner.url, e);
                SessionEnd::Failed
            }
        };

        match end {
            SessionEnd::Shutdown | SessionEnd::RemoteClosed => break,
            SessionEnd::Failed => inner.set_state(ConnectionState::Errored),
            SessionEnd::HeartbeatLost => {
                inner.set_state(ConnectionState::HeartbeatLost);
                inner.set_state(ConnectionState::Closed);
            }
        }

        if !inner.config.auto_reconnect {
            break;
        }
        attempts = attempts.saturating_add(1);
    }

    inner.set_state(ConnectionState::Closed);
    debug!("Transport supervisor for {} finished", inner.url);
}

impl TransportInner {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Transport state {:?} -> {:?}", previous, next);
            let _ = self.events.send(TransportEvent::StateChanged(next));
        }
    }

    async fn run_session(
        &self,
        mut sink: FrameSink,
        mut stream: FrameStream,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
        shutdown: &Notify,
    ) -> SessionEnd {
        let mut monitor = HeartbeatMonitor::new(
            self.config.heartbeat_timeout,
            self.config.max_heartbeat_lost,
        );
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = monitor.next_deadline(Instant::now());

            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if monitor.check(now) == Liveness::Lost {
                        return heartbeat_lost(&mut sink, &monitor, now).await;
                    }
                    let id = monitor.issue(now);
                    if let Err(e) = write(&mut sink, &Message::heartbeat(id)).await {
                        warn!("Failed to send heartbeat {}: {}", id, e);
                        return SessionEnd::Failed;
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    if monitor.check(now) == Liveness::Lost {
                        return heartbeat_lost(&mut sink, &monitor, now).await;
                    }
                }

                msg = outbound.recv() => match msg {
                    Some(message) => {
                        if let Err(e) = write(&mut sink, &message).await {
                            warn!("Failed to send {}: {}", message.kind(), e);
                            return SessionEnd::Failed;
                        }
                    }
                    None => {
                        let _ = sink.send(Frame::Close(Some(CLOSE_NORMAL))).await;
                        return SessionEnd::Shutdown;
                    }
                },

                _ = shutdown.notified() => {
                    while let Ok(message) = outbound.try_recv() {
                        if write(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    let _ = sink.send(Frame::Close(Some(CLOSE_NORMAL))).await;
                    return SessionEnd::Shutdown;
                }

                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.handle_text(&text, &mut monitor),
                    Some(Ok(Frame::Close(code))) if code == Some(CLOSE_NORMAL) => {
                        info!("Relay closed the transport");
                        return SessionEnd::RemoteClosed;
                    }
                    Some(Ok(Frame::Close(code))) => {
                        warn!("Transport closed abnormally with code {:?}", code);
                        return SessionEnd::Failed;
                    }
                    Some(Err(e)) => {
                        warn!("Transport socket error: {}", e);
                        return SessionEnd::Failed;
                    }
                    None => {
                        warn!("Transport stream ended without a close frame");
                        return SessionEnd::Failed;
                    }
                },
            }
        }
    }

    fn handle_text(&self, text: &str, monitor: &mut HeartbeatMonitor) {
        let message = match Message::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                return;
            }
        };

        if let Payload::Heartbeat(HeartbeatPayload { id }) = message.payload {
            monitor.acknowledge(id);
            return;
        }

        if message.reply {
            if let Some(late) = self.pending.resolve(message) {
                debug!("Dropping reply {:?} nobody waits for", late.request_id);
            }
            return;
        }

        debug!("Inbound {} from {:?}", message.kind(), message.from);
        if self.inbound.send(message).is_err() {
            debug!("Inbound receiver dropped");
        }
    }
}

async fn heartbeat_lost(sink: &mut FrameSink, monitor: &HeartbeatMonitor, now: Instant) -> SessionEnd {
    warn!(
        "Heartbeat lost: {} tokens unacknowledged",
        monitor.expired(now)
    );
    let _ = sink.send(Frame::Close(Some(CLOSE_HEARTBEAT_LOST))).await;
    SessionEnd::HeartbeatLost
}

async fn write(sink: &mut FrameSink, message: &Message) -> Result<(), TransportError> {
    let text = message.to_json()?;
    sink.send(Frame::Text(text)).await
}
