//! Widget backend REST client.

pub mod client;

pub use client::HttpApiClient;
