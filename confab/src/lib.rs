pub use confab_core::model::{PeerId, RoomId, StreamId};

pub mod model {
    pub use confab_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use confab_client::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use confab_relay::*;
}
