//! Presentation-agnostic widget state.
//!
//! Whatever renders the widget subscribes to a `watch` stream of
//! [`WidgetView`] snapshots and forwards user intents to the coordinator.

use crm_widget_types::message::Message;
use serde::Serialize;

/// Agent name shown until the handshake provides one.
pub const DEFAULT_AGENT_NAME: &str = "Support";

/// Surfaced when the handshake fails.
pub const HANDSHAKE_FAILED_NOTICE: &str = "Could not connect to support. Please try again later.";
/// Surfaced when a chat thread cannot be created.
pub const CHAT_CREATE_FAILED_NOTICE: &str = "Could not start conversation. Please try again.";
/// Surfaced when a message is not delivered.
pub const DELIVERY_FAILED_NOTICE: &str = "Message could not be delivered. Please try again.";

/// A transient error message. `id` distinguishes successive notices with
/// the same text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub text: String,
}

/// Snapshot of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    /// Conversation in display order.
    pub messages: Vec<Message>,
    /// True until bootstrap finishes (successfully or not).
    pub loading: bool,
    /// The single error slot. A new notice replaces the old one.
    pub notice: Option<Notice>,
    /// Messages received while the widget was closed.
    pub unread: u32,
    pub is_open: bool,
    pub agent_name: String,
    pub agent_avatar: Option<String>,
    /// Current input text.
    pub draft: String,
    /// A send is in progress.
    pub sending: bool,
    /// Show the typing indicator.
    pub agent_typing: bool,
    /// Bumped every time the widget opens; renderers focus the input on
    /// change.
    pub focus_requests: u64,
}

impl Default for WidgetView {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            loading: true,
            notice: None,
            unread: 0,
            is_open: false,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            agent_avatar: None,
            draft: String::new(),
            sending: false,
            agent_typing: false,
            focus_requests: 0,
        }
    }
}

impl WidgetView {
    /// Launcher badge text: nothing, `1`..`9`, or `9+`.
    pub fn unread_badge(&self) -> Option<String> {
        match self.unread {
            0 => None,
            n @ 1..=9 => Some(n.to_string()),
            _ => Some("9+".to_string()),
        }
    }

    pub fn notice_text(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }
}
