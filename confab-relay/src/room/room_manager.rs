use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use confab_core::RoomId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, mpsc::Sender<RoomCommand>>>,
    signaling: Arc<dyn SignalingOutput>,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
        }
    }

    /// Spawn a fresh, empty room.
    pub fn create_room(&self) -> (RoomId, mpsc::Sender<RoomCommand>) {
        let room_id = RoomId::new();
        info!("Creating new room: {}", room_id);

        let (tx, rx) = mpsc::channel(100);
        let room = Room::new(room_id.clone(), rx, self.signaling.clone());
        tokio::spawn(room.run());

        self.rooms.insert(room_id.clone(), tx.clone());
        (room_id, tx)
    }

    /// Sender for a live room. Rooms that emptied and stopped are forgotten.
    pub fn get_room_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        let sender = self.rooms.get(room_id).map(|s| s.clone())?;
        if sender.is_closed() {
            self.rooms.remove(room_id);
            return None;
        }
        Some(sender)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.iter().filter(|r| !r.value().is_closed()).count()
    }
}
