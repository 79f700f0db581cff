//! Realtime transport implementations.

pub mod websocket;

pub use websocket::{WsConnection, WsConnector};
