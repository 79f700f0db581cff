//! Chat thread identifiers, descriptors and the widget handshake.
//!
//! Backends in the field answer with either snake_case or camelCase payloads
//! and type chat ids as strings or integers. Each response shape has an
//! explicit wire variant here; conversion into the canonical type happens in
//! one step via `From`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A JSON scalar that is either a string or an integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrNumber {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Signed(n) => n.to_string(),
            StringOrNumber::Unsigned(n) => n.to_string(),
        }
    }
}

/// Identifier of a chat thread.
///
/// Canonically a string. Deserializes from a JSON string or integer and
/// always serializes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ChatId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ChatId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StringOrNumber::deserialize(deserializer).map(|raw| ChatId(raw.into()))
    }
}

/// A chat thread as returned by the create-chat call or embedded in the
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDescriptor {
    pub id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ChatDescriptor {
    pub fn new(id: impl Into<ChatId>) -> Self {
        Self {
            id: id.into(),
            uuid: None,
            status: None,
            origin: None,
        }
    }
}

/// Wire shapes of a chat descriptor.
///
/// The camelCase variant is tried first because it is keyed by `chatId`,
/// which the snake_case shape never carries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatWire {
    Camel(CamelChat),
    Snake(SnakeChat),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelChat {
    pub chat_id: ChatId,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnakeChat {
    pub id: ChatId,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl From<SnakeChat> for ChatDescriptor {
    fn from(chat: SnakeChat) -> Self {
        Self {
            id: chat.id,
            uuid: chat.uuid,
            status: chat.status,
            origin: chat.origin,
        }
    }
}

impl From<ChatWire> for ChatDescriptor {
    fn from(wire: ChatWire) -> Self {
        match wire {
            ChatWire::Camel(chat) => Self {
                id: chat.chat_id,
                uuid: chat.uuid,
                status: chat.status,
                origin: chat.origin,
            },
            ChatWire::Snake(chat) => chat.into(),
        }
    }
}

/// Canonical result of the widget handshake (`POST /widget/init`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub visitor_id: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

impl Handshake {
    pub fn new(visitor_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            token: token.into(),
            chat: None,
            agent_name: None,
            agent_avatar: None,
            welcome_message: None,
        }
    }

    /// Chat id carried by the handshake, if the server resumed a thread.
    pub fn chat_id(&self) -> Option<&ChatId> {
        self.chat.as_ref().map(|chat| &chat.id)
    }
}

/// Wire shapes of the handshake response.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HandshakeWire {
    Snake(SnakeHandshake),
    Camel(CamelHandshake),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnakeHandshake {
    pub visitor_id: String,
    pub token: String,
    #[serde(default)]
    pub chat: Option<SnakeChat>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_avatar: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelHandshake {
    pub visitor_id: String,
    pub token: String,
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_avatar: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

impl From<HandshakeWire> for Handshake {
    fn from(wire: HandshakeWire) -> Self {
        match wire {
            HandshakeWire::Snake(init) => Self {
                visitor_id: init.visitor_id,
                token: init.token,
                chat: init.chat.map(ChatDescriptor::from),
                agent_name: init.agent_name,
                agent_avatar: init.agent_avatar,
                welcome_message: init.welcome_message,
            },
            HandshakeWire::Camel(init) => Self {
                visitor_id: init.visitor_id,
                token: init.token,
                chat: init.chat_id.map(ChatDescriptor::new),
                agent_name: init.agent_name,
                agent_avatar: init.agent_avatar,
                welcome_message: init.welcome_message,
            },
        }
    }
}
