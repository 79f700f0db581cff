//! Infrastructure layer for the CRM chat widget.
//!
//! Contains implementations of the ports defined in `crm-widget-core`: the
//! reqwest-backed REST client, the tokio-tungstenite realtime transport and
//! filesystem key-value storage, plus the `widget.toml` config loader.

pub mod api;
pub mod config;
pub mod realtime;
pub mod storage;
