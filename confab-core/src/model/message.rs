use crate::model::peer::PeerId;
use crate::model::request::RequestId;
use crate::model::room::{RoomError, RoomId};
use crate::model::signaling::IceCandidate;
use crate::model::stream::{StreamInfo, StreamInfoUpdate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("malformed `{kind}` payload: {source}")]
    Payload {
        kind: MessageKind,
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Join,
    Invite,
    RemoteJoin,
    Connect,
    Offer,
    Answer,
    AnswerAck,
    Candidate,
    StreamInfo,
    StreamInfoUpdate,
    Leave,
    RemoteLeave,
    RoomUserRefresh,
    Heartbeat,
    Text,
    Notice,
}

impl MessageKind {
    /// Kinds exchanged between two peers through the relay.
    pub fn is_peer_directed(self) -> bool {
        matches!(
            self,
            MessageKind::Connect
                | MessageKind::Offer
                | MessageKind::Answer
                | MessageKind::AnswerAck
                | MessageKind::Candidate
                | MessageKind::StreamInfo
                | MessageKind::StreamInfoUpdate
        )
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The serialized name is the wire name.
        match serde_json::to_value(self) {
            Ok(Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{self:?}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct JoinPayload {
    /// Peers the relay should invite when it creates the room.
    #[serde(default)]
    pub invite: Vec<PeerId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
    /// Set by the relay on a failed join reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RoomError>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct InvitePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PeerPayload {
    pub peer: PeerId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SdpPayload {
    pub sdp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AnswerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AnswerAckPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RoomUsersPayload {
    #[serde(default)]
    pub users: Vec<PeerId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatPayload {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ChatPayload {
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Join(JoinPayload),
    Invite(InvitePayload),
    RemoteJoin(PeerPayload),
    Connect,
    Offer(SdpPayload),
    Answer(AnswerPayload),
    AnswerAck(AnswerAckPayload),
    Candidate(IceCandidate),
    StreamInfo(StreamInfo),
    StreamInfoUpdate(StreamInfoUpdate),
    Leave,
    RemoteLeave(PeerPayload),
    RoomUserRefresh(RoomUsersPayload),
    Heartbeat(HeartbeatPayload),
    Text(ChatPayload),
    Notice(ChatPayload),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Join(_) => MessageKind::Join,
            Payload::Invite(_) => MessageKind::Invite,
            Payload::RemoteJoin(_) => MessageKind::RemoteJoin,
            Payload::Connect => MessageKind::Connect,
            Payload::Offer(_) => MessageKind::Offer,
            Payload::Answer(_) => MessageKind::Answer,
            Payload::AnswerAck(_) => MessageKind::AnswerAck,
            Payload::Candidate(_) => MessageKind::Candidate,
            Payload::StreamInfo(_) => MessageKind::StreamInfo,
            Payload::StreamInfoUpdate(_) => MessageKind::StreamInfoUpdate,
            Payload::Leave => MessageKind::Leave,
            Payload::RemoteLeave(_) => MessageKind::RemoteLeave,
            Payload::RoomUserRefresh(_) => MessageKind::RoomUserRefresh,
            Payload::Heartbeat(_) => MessageKind::Heartbeat,
            Payload::Text(_) => MessageKind::Text,
            Payload::Notice(_) => MessageKind::Notice,
        }
    }

    fn to_value(&self) -> Result<Value, CodecError> {
        let value = match self {
            Payload::Join(p) => serde_json::to_value(p),
            Payload::Invite(p) => serde_json::to_value(p),
            Payload::RemoteJoin(p) | Payload::RemoteLeave(p) => serde_json::to_value(p),
            Payload::Offer(p) => serde_json::to_value(p),
            Payload::Answer(p) => serde_json::to_value(p),
            Payload::AnswerAck(p) => serde_json::to_value(p),
            Payload::Candidate(p) => serde_json::to_value(p),
            Payload::StreamInfo(p) => serde_json::to_value(p),
            Payload::StreamInfoUpdate(p) => serde_json::to_value(p),
            Payload::RoomUserRefresh(p) => serde_json::to_value(p),
            Payload::Heartbeat(p) => serde_json::to_value(p),
            Payload::Text(p) | Payload::Notice(p) => serde_json::to_value(p),
            Payload::Connect | Payload::Leave => Ok(Value::Null),
        };
        value.map_err(|source| CodecError::Payload {
            kind: self.kind(),
            source,
        })
    }

    fn from_value(kind: MessageKind, value: Value) -> Result<Self, CodecError> {
        fn body<T: DeserializeOwned>(kind: MessageKind, value: Value) -> Result<T, CodecError> {
            // An absent payload decodes like an empty object so all-default bodies work.
            let value = if value.is_null() {
                Value::Object(Default::default())
            } else {
                value
            };
            serde_json::from_value(value).map_err(|source| CodecError::Payload { kind, source })
        }

        Ok(match kind {
            MessageKind::Join => Payload::Join(body(kind, value)?),
            MessageKind::Invite => Payload::Invite(body(kind, value)?),
            MessageKind::RemoteJoin => Payload::RemoteJoin(body(kind, value)?),
            MessageKind::Connect => Payload::Connect,
            MessageKind::Offer => Payload::Offer(body(kind, value)?),
            MessageKind::Answer => Payload::Answer(body(kind, value)?),
            MessageKind::AnswerAck => Payload::AnswerAck(body(kind, value)?),
            MessageKind::Candidate => Payload::Candidate(body(kind, value)?),
            MessageKind::StreamInfo => Payload::StreamInfo(body(kind, value)?),
            MessageKind::StreamInfoUpdate => Payload::StreamInfoUpdate(body(kind, value)?),
            MessageKind::Leave => Payload::Leave,
            MessageKind::RemoteLeave => Payload::RemoteLeave(body(kind, value)?),
            MessageKind::RoomUserRefresh => Payload::RoomUserRefresh(body(kind, value)?),
            MessageKind::Heartbeat => Payload::Heartbeat(body(kind, value)?),
            MessageKind::Text => Payload::Text(body(kind, value)?),
            MessageKind::Notice => Payload::Notice(body(kind, value)?),
        })
    }
}

/// The envelope every signaling frame travels in.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: Option<PeerId>,
    pub to: Option<PeerId>,
    pub room_id: Option<RoomId>,
    pub request_id: Option<RequestId>,
    /// Marks a message answering an earlier request with the same `request_id`.
    pub reply: bool,
    pub payload: Payload,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            from: None,
            to: None,
            room_id: None,
            request_id: None,
            reply: false,
            payload,
        }
    }

    /// A message addressed to one remote peer.
    pub fn to_peer(from: PeerId, to: PeerId, payload: Payload) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::new(payload)
        }
    }

    /// A message for the relay itself.
    pub fn to_relay(from: PeerId, payload: Payload) -> Self {
        Self {
            from: Some(from),
            ..Self::new(payload)
        }
    }

    pub fn heartbeat(id: u64) -> Self {
        Self::new(Payload::Heartbeat(HeartbeatPayload { id }))
    }

    /// Build the answer to `self`: addresses swapped, same request id.
    pub fn reply_to(&self, payload: Payload) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            room_id: self.room_id.clone(),
            request_id: self.request_id,
            reply: true,
            payload,
        }
    }

    pub fn with_room(mut self, room_id: Option<RoomId>) -> Self {
        self.room_id = room_id;
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&RawMessage::try_from(self.clone())?)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        let raw: RawMessage = serde_json::from_str(text)?;
        Message::try_from(raw)
    }
}

impl Serialize for Message {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawMessage::try_from(self.clone())
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawMessage::deserialize(deserializer)?;
        Message::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize)]
struct RawMessage {
    kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<RequestId>,
    #[serde(default)]
    reply: bool,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<Message> for RawMessage {
    type Error = CodecError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: message.kind(),
            payload: message.payload.to_value()?,
            from: message.from,
            to: message.to,
            room_id: message.room_id,
            request_id: message.request_id,
            reply: message.reply,
        })
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = CodecError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            payload: Payload::from_value(raw.kind, raw.payload)?,
            from: raw.from,
            to: raw.to,
            room_id: raw.room_id,
            request_id: raw.request_id,
            reply: raw.reply,
        })
    }
}
