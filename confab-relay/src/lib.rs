//! Reference signaling relay: rooms, membership and message forwarding over
//! WebSockets, speaking the confab wire format.

mod config;
mod room;
mod signaling;

pub use config::RelayConfig;
pub use room::*;
pub use signaling::*;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws/{peer_id}", get(ws_handler))
        .with_state(service)
}

/// Serve the relay on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Signaling relay listening on ws://{}/ws/{{peer_id}}", addr);
    axum::serve(listener, router(SignalingService::new())).await?;
    Ok(())
}
