use crate::room::room_command::RoomCommand;
use crate::signaling::SignalingOutput;
use confab_core::{
    JoinPayload, Message, Payload, PeerId, PeerPayload, RequestId, RoomId, RoomUsersPayload,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One room's actor. Owns the member list; all changes arrive as commands.
pub struct Room {
    room_id: RoomId,
    members: Vec<PeerId>,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            room_id,
            members: Vec::new(),
            command_rx,
            signaling,
        }
    }

    /// Runs until the last member is gone or the command channel closes.
    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
            if self.members.is_empty() {
                info!("Room {} is empty. Shutting down room.", self.room_id);
                break;
            }
        }

        info!("Room {} event loop finished", self.room_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                peer_id,
                request_id,
            } => self.join(peer_id, request_id).await,

            RoomCommand::Leave { peer_id } | RoomCommand::Disconnect { peer_id } => {
                self.remove_peer(&peer_id).await;
            }

            RoomCommand::Broadcast { from, message } => {
                for member in self.members.iter().filter(|m| **m != from) {
                    self.signaling.send_to(member, message.clone()).await;
                }
            }
        }
    }

    async fn join(&mut self, peer_id: PeerId, request_id: Option<RequestId>) {
        info!("Processing join of {} into room {}", peer_id, self.room_id);

        let reply = Message {
            from: None,
            to: Some(peer_id.clone()),
            room_id: Some(self.room_id.clone()),
            request_id,
            reply: true,
            payload: Payload::Join(JoinPayload::default()),
        };
        self.signaling.send_to(&peer_id, reply).await;

        if self.members.contains(&peer_id) {
            debug!("{} re-joined room {}", peer_id, self.room_id);
            return;
        }

        let joined = Message::new(Payload::RemoteJoin(PeerPayload {
            peer: peer_id.clone(),
        }))
        .with_room(Some(self.room_id.clone()));
        for member in &self.members {
            self.signaling.send_to(member, joined.clone()).await;
        }

        self.members.push(peer_id);
        self.refresh_users().await;
    }

    async fn remove_peer(&mut self, peer_id: &PeerId) {
        let Some(position) = self.members.iter().position(|m| m == peer_id) else {
            return;
        };
        self.members.remove(position);
        info!("{} left room {}", peer_id, self.room_id);

        let left = Message::new(Payload::RemoteLeave(PeerPayload {
            peer: peer_id.clone(),
        }))
        .with_room(Some(self.room_id.clone()));
        for member in &self.members {
            self.signaling.send_to(member, left.clone()).await;
        }
        self.refresh_users().await;
    }

    async fn refresh_users(&self) {
        let refresh = Message::new(Payload::RoomUserRefresh(RoomUsersPayload {
            users: self.members.clone(),
        }))
        .with_room(Some(self.room_id.clone()));
        for member in &self.members {
            self.signaling.send_to(member, refresh.clone()).await;
        }
    }
}
