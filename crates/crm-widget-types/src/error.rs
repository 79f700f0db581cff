use thiserror::Error;

/// Errors from the key-value storage port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    #[error("storage io error: {0}")]
    Io(String),
}

/// Errors from widget REST calls.
///
/// The backend carries no typed error payload, so a non-success status is
/// reported with the request it answered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {status} for {method} {path}")]
    Status {
        status: u16,
        method: String,
        path: String,
    },

    #[error("request {method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    #[error("could not decode response to {method} {path}: {message}")]
    Decode {
        method: String,
        path: String,
        message: String,
    },

    #[error("http client error: {0}")]
    Client(String),
}

impl ApiError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the realtime channel and its transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The connection could not even be constructed (bad URL, bad scheme).
    /// Never retried.
    #[error("realtime connection could not be constructed: {0}")]
    Construction(String),

    #[error("realtime connect failed: {0}")]
    Connect(String),

    #[error("realtime transport error: {0}")]
    Transport(String),

    #[error("could not encode realtime frame: {0}")]
    Encode(String),

    #[error("realtime channel closed")]
    Closed,
}

/// Errors from widget configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config field '{0}'")]
    MissingField(&'static str),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors surfaced by the session coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WidgetError {
    #[error("widget session is not initialized")]
    NotReady,

    #[error("message content is empty")]
    EmptyMessage,

    #[error("widget session was shut down")]
    Shutdown,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
