//! Storage abstractions for the widget.
//!
//! Defines the key-value storage port, an in-process implementation, and the
//! `SessionStore` that persists the visitor session through it.

pub mod kv_store;
pub mod memory;
pub mod session_store;

pub use kv_store::KeyValueStorage;
pub use memory::MemoryStorage;
pub use session_store::SessionStore;
