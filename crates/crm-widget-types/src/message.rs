//! Chat messages and their wire shapes.
//!
//! A message reaches the widget from four places: the local optimistic echo,
//! REST history, a realtime push, or the synthetic welcome. All of them end
//! up as the canonical [`Message`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::chat::{ChatId, StringOrNumber};

/// Id prefix of locally generated, not yet acknowledged visitor messages.
pub const OPTIMISTIC_ID_PREFIX: &str = "opt-";

/// Id of the synthetic greeting shown on an empty conversation.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Id prefix for server messages that arrived without an id.
const SYNTHETIC_ID_PREFIX: &str = "srv-";

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Visitor,
    Agent,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Visitor => write!(f, "visitor"),
            Sender::Agent => write!(f, "agent"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visitor" => Ok(Sender::Visitor),
            "agent" => Ok(Sender::Agent),
            other => Err(format!("invalid message sender: '{other}'")),
        }
    }
}

/// A single chat message in canonical form.
///
/// `chat_id` is `None` only for the welcome message shown before any chat
/// thread exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    pub content: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Local echo of a visitor message, shown before the server confirms it.
    pub fn optimistic(chat_id: Option<ChatId>, content: impl Into<String>) -> Self {
        Self {
            id: format!("{OPTIMISTIC_ID_PREFIX}{}", Uuid::now_v7()),
            chat_id,
            content: content.into(),
            sender: Sender::Visitor,
            created_at: Utc::now(),
        }
    }

    /// The synthetic agent greeting. Never persisted or sent.
    pub fn welcome(chat_id: Option<ChatId>, content: impl Into<String>) -> Self {
        Self {
            id: WELCOME_MESSAGE_ID.to_string(),
            chat_id,
            content: content.into(),
            sender: Sender::Agent,
            created_at: Utc::now(),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.id.starts_with(OPTIMISTIC_ID_PREFIX)
    }

    pub fn is_welcome(&self) -> bool {
        self.id == WELCOME_MESSAGE_ID
    }
}

/// Wire shapes of a message, as returned by REST calls and pushed over the
/// realtime channel.
///
/// The camelCase variant requires `sender` and `createdAt`, so it is tried
/// first; the snake_case variant only requires `content` and also accepts
/// camelCase keys, so a camelCase push missing `createdAt` keeps its chat.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageWire {
    Camel(CamelMessage),
    Snake(SnakeMessage),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelMessage {
    #[serde(default)]
    id: Option<StringOrNumber>,
    #[serde(default)]
    chat_id: Option<ChatId>,
    content: String,
    sender: Sender,
    created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnakeMessage {
    #[serde(default)]
    id: Option<StringOrNumber>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "chatId")]
    chat_id: Option<ChatId>,
    content: String,
    #[serde(default)]
    sender: Option<Sender>,
    #[serde(default, alias = "senderId")]
    sender_id: Option<serde_json::Value>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<String>,
}

impl MessageWire {
    /// Whether this payload is a chat message (as opposed to a typed control
    /// frame such as `{"type": "typing"}` that happens to carry `content`).
    pub fn is_chat_message(&self) -> bool {
        match self {
            MessageWire::Camel(_) => true,
            MessageWire::Snake(msg) => msg.kind.as_deref().is_none_or(|kind| kind == "message"),
        }
    }
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        match wire {
            MessageWire::Camel(msg) => Self {
                id: message_id(msg.id),
                chat_id: msg.chat_id,
                content: msg.content,
                sender: msg.sender,
                created_at: parse_timestamp(Some(&msg.created_at)),
            },
            MessageWire::Snake(msg) => {
                let sender = msg.sender.unwrap_or(match msg.sender_id {
                    Some(serde_json::Value::Null) | None => Sender::Visitor,
                    Some(_) => Sender::Agent,
                });
                Self {
                    id: message_id(msg.id),
                    chat_id: msg.chat_id,
                    content: msg.content,
                    sender,
                    created_at: parse_timestamp(msg.created_at.as_deref()),
                }
            }
        }
    }
}

/// Decode one inbound realtime frame.
///
/// Returns `None` for anything that is not a chat message in either wire
/// shape.
pub fn decode_frame(text: &str) -> Option<Message> {
    let wire: MessageWire = serde_json::from_str(text).ok()?;
    wire.is_chat_message().then(|| wire.into())
}

fn message_id(id: Option<StringOrNumber>) -> String {
    id.map(String::from)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{SYNTHETIC_ID_PREFIX}{}", Uuid::now_v7()))
}

/// Parse an ISO-8601 timestamp. Zone-less timestamps are taken as UTC; a
/// missing or unparseable value becomes the receive time.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Outbound chat frame for socket dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
    pub visitor_id: String,
}

impl OutboundMessage {
    pub fn new(content: impl Into<String>, visitor_id: impl Into<String>) -> Self {
        Self {
            kind: "message",
            content: content.into(),
            visitor_id: visitor_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sender_display_and_from_str() {
        assert_eq!(Sender::Agent.to_string(), "agent");
        assert_eq!("VISITOR".parse::<Sender>().unwrap(), Sender::Visitor);
        assert!("bot".parse::<Sender>().is_err());
    }

    #[test]
    fn snake_message_with_sender_id_is_agent() {
        let json = r#"{"id": 5, "chat_id": 42, "content": "hello", "sender_id": 3,
                       "created_at": "2024-05-01T10:00:00Z"}"#;
        let message = decode_frame(json).unwrap();
        assert_eq!(message.id, "5");
        assert_eq!(message.chat_id, Some(ChatId::from("42")));
        assert_eq!(message.sender, Sender::Agent);
        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn snake_message_with_null_sender_id_is_visitor() {
        let json = r#"{"id": "m1", "chat_id": 42, "content": "hi", "sender_id": null,
                       "visitor_id": "v-1", "created_at": "2024-05-01T10:00:00"}"#;
        let message = decode_frame(json).unwrap();
        assert_eq!(message.sender, Sender::Visitor);
        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn camel_message_normalizes() {
        let json = r#"{"id": "m2", "chatId": "7", "content": "yo", "sender": "agent",
                       "createdAt": "2024-05-01T12:00:00+02:00"}"#;
        let wire: MessageWire = serde_json::from_str(json).unwrap();
        assert!(matches!(wire, MessageWire::Camel(_)));
        let message = Message::from(wire);
        assert_eq!(message.chat_id, Some(ChatId::from("7")));
        assert_eq!(message.sender, Sender::Agent);
        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn camel_message_without_created_at_keeps_chat() {
        let json = r#"{"id": "m3", "chatId": 7, "content": "late", "sender": "agent"}"#;
        let message = decode_frame(json).unwrap();
        assert_eq!(message.chat_id, Some(ChatId::from("7")));
        assert_eq!(message.sender, Sender::Agent);

        let message = decode_frame(r#"{"chatId": "7", "content": "x", "senderId": 4}"#).unwrap();
        assert_eq!(message.chat_id, Some(ChatId::from("7")));
        assert_eq!(message.sender, Sender::Agent);
    }

    #[test]
    fn missing_id_is_synthesized() {
        let message = decode_frame(r#"{"content": "no id", "chat_id": 1}"#).unwrap();
        assert!(message.id.starts_with("srv-"));
        assert!(!message.is_optimistic());
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(decode_frame("not json").is_none());
        assert!(decode_frame("{\"type\": \"pong\"}").is_none());
        assert!(decode_frame("[1, 2, 3]").is_none());
        assert!(decode_frame("{\"type\": \"typing\", \"content\": \"\"}").is_none());
    }

    #[test]
    fn typed_message_frame_is_accepted() {
        let message =
            decode_frame(r#"{"type": "message", "content": "hey", "sender_id": 9}"#).unwrap();
        assert_eq!(message.content, "hey");
        assert_eq!(message.sender, Sender::Agent);
    }

    #[test]
    fn optimistic_and_welcome_ids() {
        let a = Message::optimistic(None, "one");
        let b = Message::optimistic(None, "two");
        assert!(a.is_optimistic());
        assert_ne!(a.id, b.id);
        assert_eq!(a.sender, Sender::Visitor);

        let welcome = Message::welcome(None, "Hi!");
        assert!(welcome.is_welcome());
        assert_eq!(welcome.sender, Sender::Agent);
    }

    #[test]
    fn outbound_message_shape() {
        let frame = OutboundMessage::new("hi", "v-1");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "message", "content": "hi", "visitor_id": "v-1"})
        );
    }
}
