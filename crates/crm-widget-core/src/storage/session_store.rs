//! Persistence of the visitor session.
//!
//! `SessionStore` never fails: storage may be disabled, full or corrupted,
//! and the widget must keep working without a remembered identity.

use crm_widget_types::session::{SESSION_STORAGE_KEY, VisitorSession};
use tracing::debug;

use super::kv_store::KeyValueStorage;

/// Loads, saves and clears the visitor session under a single storage key.
pub struct SessionStore<S: KeyValueStorage> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: SESSION_STORAGE_KEY.to_string(),
        }
    }

    /// Use a different storage key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the persisted session.
    ///
    /// Returns `None` when nothing is stored, the stored value does not
    /// parse, or the storage itself fails.
    pub async fn load(&self) -> Option<VisitorSession> {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                debug!(key = %self.key, error = %err, "session storage read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                debug!(key = %self.key, error = %err, "discarding unparseable stored session");
                None
            }
        }
    }

    /// Persist the session. Failures are logged and swallowed.
    pub async fn save(&self, session: &VisitorSession) {
        let raw = match serde_json::to_string(session) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(error = %err, "could not serialize visitor session");
                return;
            }
        };
        if let Err(err) = self.storage.set(&self.key, &raw).await {
            debug!(key = %self.key, error = %err, "session storage write failed");
        }
    }

    /// Remove the persisted session. Failures are logged and swallowed.
    pub async fn clear(&self) {
        if let Err(err) = self.storage.remove(&self.key).await {
            debug!(key = %self.key, error = %err, "session storage clear failed");
        }
    }
}
