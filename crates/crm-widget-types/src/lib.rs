//! Shared domain types for the CRM chat widget.
//!
//! Visitor session, chat ids, messages, the handshake, the snake/camel wire
//! shapes the backend answers with, widget configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
