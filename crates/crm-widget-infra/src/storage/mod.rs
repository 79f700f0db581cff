//! Durable storage for the widget.
//!
//! Implements the `KeyValueStorage` trait from `crm-widget-core` on the local
//! filesystem.

pub mod filesystem;

pub use filesystem::FileStorage;
