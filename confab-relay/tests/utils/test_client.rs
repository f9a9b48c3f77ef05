use confab_core::{Message, MessageKind, Payload, PeerId};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Raw WebSocket peer speaking the wire format directly.
pub struct TestClient {
    pub peer_id: PeerId,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, peer_id: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(format!("ws://{}/ws/{}", addr, peer_id)).await?;
        let mut client = Self {
            peer_id: PeerId::from(peer_id),
            ws,
        };
        // The echo proves the relay has registered this socket.
        client.send(&Message::heartbeat(0)).await?;
        client.recv_kind(MessageKind::Heartbeat).await?;
        Ok(client)
    }

    pub async fn send(&mut self, message: &Message) -> anyhow::Result<()> {
        self.ws
            .send(WsMessage::Text(message.to_json()?.into()))
            .await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("socket closed"))??;
            if let WsMessage::Text(text) = frame {
                return Ok(Message::from_json(text.as_str())?);
            }
        }
    }

    /// Next message of `kind`, skipping room-user refreshes and the like.
    pub async fn recv_kind(&mut self, kind: MessageKind) -> anyhow::Result<Message> {
        loop {
            let message = self.recv().await?;
            if message.kind() == kind {
                return Ok(message);
            }
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }

    pub fn to_relay(&self, payload: Payload) -> Message {
        Message::to_relay(self.peer_id.clone(), payload)
    }
}

pub async fn start_relay() -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(confab_relay::serve(listener));
    Ok(addr)
}
