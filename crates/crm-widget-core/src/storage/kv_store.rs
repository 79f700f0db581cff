//! Key-value storage trait.
//!
//! The widget's only persistent state lives behind this port: a flat map of
//! string keys to string values, the moral equivalent of browser local
//! storage. Implementations live in crm-widget-infra (file-backed) and in
//! [`super::memory`] (in-process).

use crm_widget_types::error::StorageError;

/// Trait for durable string key-value storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KeyValueStorage: Send + Sync + 'static {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Remove a key. No-op if the key does not exist.
    fn remove(&self, key: &str)
    -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}
