use anyhow::Context;
use std::net::SocketAddr;

pub const ADDR_ENV: &str = "CONFAB_RELAY_ADDR";
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub addr: SocketAddr,
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let addr = raw
            .parse()
            .with_context(|| format!("{} is not a socket address: {:?}", ADDR_ENV, raw))?;
        Ok(Self { addr })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}
