use confab_core::utils::default_ice_servers;
use confab_core::{IceServerConfig, PeerId};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Expired, unacknowledged heartbeats that mark the channel dead.
    pub max_heartbeat_lost: usize,
    /// How long the relay has to acknowledge one heartbeat.
    pub heartbeat_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Wait between consecutive reconnect attempts after the first.
    pub reconnect_interval: Duration,
    pub auto_reconnect: bool,
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_heartbeat_lost: 3,
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
            auto_reconnect: true,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// When the engine owns a live signaling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtcMode {
    /// Connected from construction so invites reach us before any join.
    InviteMode,
    /// Connected between `join` and `leave` only.
    #[default]
    NormalMode,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub local_peer: PeerId,
    /// Relay endpoint, e.g. `ws://host:3000/ws/<peer>`.
    pub url: String,
    pub mode: RtcMode,
    pub ice_servers: Vec<IceServerConfig>,
    pub transport: TransportConfig,
}

impl EngineConfig {
    pub fn new(local_peer: PeerId, url: impl Into<String>) -> Self {
        Self {
            local_peer,
            url: url.into(),
            mode: RtcMode::default(),
            ice_servers: default_ice_servers(),
            transport: TransportConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: RtcMode) -> Self {
        self.mode = mode;
        self
    }
}
