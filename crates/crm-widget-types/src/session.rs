use serde::{Deserialize, Serialize};

use crate::chat::ChatId;

/// Storage key under which the visitor session is persisted.
pub const SESSION_STORAGE_KEY: &str = "crm_visitor_session";

/// The visitor identity persisted across page loads.
///
/// Created on the first successful handshake, mutated when a chat thread is
/// created, and removed only by an explicit clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSession {
    #[serde(alias = "visitor_id")]
    pub visitor_id: String,
    #[serde(default, alias = "chat_id", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl VisitorSession {
    pub fn new(visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            chat_id: None,
            token: None,
        }
    }

    pub fn with_chat(mut self, chat_id: impl Into<ChatId>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
