//! Realtime transport traits.
//!
//! `RealtimeChannel` owns the reconnect policy and the outbound queue; a
//! connector only knows how to open one connection to a URL. The WebSocket
//! implementation lives in crm-widget-infra.

use crm_widget_types::error::ChannelError;

/// Opens realtime connections.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait RealtimeConnector: Send + Sync + 'static {
    type Connection: RealtimeConnection;

    /// Open a connection to `url`.
    ///
    /// Fails with `ChannelError::Construction` when the URL can never be
    /// connected to (unparseable, wrong scheme); any other error is treated
    /// as a transient drop.
    fn connect(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Self::Connection, ChannelError>> + Send;
}

/// One open realtime connection carrying JSON text frames.
///
/// Protocol-level keepalive (ping/pong) is handled by the implementation and
/// never surfaces here.
pub trait RealtimeConnection: Send + 'static {
    /// Write one text frame.
    fn send(
        &mut self,
        frame: &str,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Next inbound text frame. `None` once the peer closed the connection.
    fn next_text(
        &mut self,
    ) -> impl std::future::Future<Output = Option<Result<String, ChannelError>>> + Send;

    /// Close the connection gracefully.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
