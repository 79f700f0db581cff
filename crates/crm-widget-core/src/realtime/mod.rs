//! Realtime delivery: transport ports, the reconnecting channel, and the
//! endpoint URL builder.

pub mod channel;
pub mod endpoint;
pub mod transport;

pub use channel::{ChannelState, DEFAULT_RECONNECT_DELAY, OpenSignal, RealtimeChannel};
pub use endpoint::realtime_url;
pub use transport::{RealtimeConnection, RealtimeConnector};
