//! Widget configuration.
//!
//! `WidgetConfig` is what a host passes when mounting the widget. It is also
//! read from `widget.toml` in the data directory; every field except the
//! workspace id and public key has a default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Production API endpoint used when no `api_url` is configured.
pub const DEFAULT_API_URL: &str = "https://api.crm.exemplo.com";

/// How visitor messages are delivered to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// `POST /widget/chat/{id}/messages`.
    #[default]
    Rest,
    /// A `{"type": "message"}` frame over the realtime channel, falling back
    /// to REST when the channel does not open in time.
    Socket,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Rest => write!(f, "rest"),
            DispatchMode::Socket => write!(f, "socket"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rest" => Ok(DispatchMode::Rest),
            "socket" | "ws" => Ok(DispatchMode::Socket),
            other => Err(format!("invalid dispatch mode: '{other}'")),
        }
    }
}

/// Configuration for one mounted widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// CRM workspace the widget belongs to. Required.
    #[serde(default)]
    pub workspace_id: String,

    /// Public widget key, sent as `X-Widget-Key`. Required.
    #[serde(default)]
    pub public_key: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Realtime base URL. Derived from `api_url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,

    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Ask the server to resume the stored chat thread on handshake.
    #[serde(default = "default_true")]
    pub resume_chat: bool,

    /// Append `visitorId` to the realtime URL.
    #[serde(default)]
    pub include_visitor_in_ws_url: bool,

    /// Greeting shown on an empty conversation when the server sends none.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,

    /// How long socket dispatch waits for the channel before using REST.
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_welcome_message() -> String {
    "Hi! How can we help you today?".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_notice_duration_ms() -> u64 {
    5_000
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            workspace_id: String::new(),
            public_key: String::new(),
            api_url: default_api_url(),
            ws_url: None,
            dispatch: DispatchMode::default(),
            resume_chat: true,
            include_visitor_in_ws_url: false,
            welcome_message: default_welcome_message(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            notice_duration_ms: default_notice_duration_ms(),
            open_timeout_ms: default_open_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WidgetConfig {
    pub fn new(workspace_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            public_key: public_key.into(),
            ..Self::default()
        }
    }

    /// Check the fields a mount cannot proceed without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_id.trim().is_empty() {
            return Err(ConfigError::MissingField("workspace_id"));
        }
        if self.public_key.trim().is_empty() {
            return Err(ConfigError::MissingField("public_key"));
        }
        Ok(())
    }

    /// API base URL without trailing slashes.
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Realtime base URL without trailing slashes.
    ///
    /// Uses `ws_url` when set, otherwise the API URL with its `http` scheme
    /// prefix replaced by `ws` (`https` becomes `wss`).
    pub fn ws_base(&self) -> String {
        match self.ws_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let api = self.api_base();
                match api.strip_prefix("http") {
                    Some(rest) => format!("ws{rest}"),
                    None => api.to_string(),
                }
            }
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
