use confab_core::{Message, PeerId};
use async_trait::async_trait;

/// How rooms reach connected peers. The WebSocket registry implements it;
/// tests substitute a recorder.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver `message` to one peer. Unknown peers are skipped.
    async fn send_to(&self, peer_id: &PeerId, message: Message);
}
