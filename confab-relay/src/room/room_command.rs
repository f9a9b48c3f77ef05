use confab_core::{Message, PeerId, RequestId};

/// Commands a room receives from the signaling service.
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a member and reply to its join request.
    Join {
        peer_id: PeerId,
        request_id: Option<RequestId>,
    },

    /// The member left on purpose.
    Leave { peer_id: PeerId },

    /// The member's socket closed.
    Disconnect { peer_id: PeerId },

    /// Room-wide message (chat, notice) from a member; everyone else gets it.
    Broadcast { from: PeerId, message: Message },
}
