/// Lifecycle of the signaling channel. Only the transport moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
    HeartbeatLost,
}

impl ConnectionState {
    /// Whether `send` accepts messages in this state. `Connecting` buffers.
    pub fn accepts_sends(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(ConnectionState),
    /// The channel came back after `attempts` consecutive reconnect attempts.
    Reconnected { attempts: u32 },
}
