//! Reconnecting realtime channel with an outbound queue.
//!
//! A `RealtimeChannel` keeps at most one live connection to one URL. Frames
//! sent while the connection is not open are queued and flushed in FIFO
//! order as soon as it opens. An unexpected drop schedules exactly one
//! reconnect after a fixed delay; `disconnect()` is final.
//!
//! State machine:
//!
//! ```text
//! Idle --connect()--> Connecting --opened--> Open
//!   ^                     |                   |
//!   |  construction error |                   | dropped
//!   +---------------------+                   v
//!   +<------------------ reconnect timer <-- Idle
//!
//! any --disconnect()--> Closed (final)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crm_widget_types::error::ChannelError;
use crm_widget_types::message::{Message, decode_frame};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::transport::{RealtimeConnection, RealtimeConnector};

/// Default delay before reconnecting after a drop.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

/// Observable state of a [`RealtimeChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection and no attempt in progress. A reconnect may be pending.
    Idle,
    Connecting,
    Open,
    /// Closed by the user. Final.
    Closed,
}

type MessageHandler = Box<dyn Fn(Message) + Send + Sync>;

/// A reconnecting realtime connection to one URL.
///
/// Dropping the channel has the same effect as [`RealtimeChannel::disconnect`].
pub struct RealtimeChannel<C: RealtimeConnector> {
    shared: Arc<Shared<C>>,
}

struct Shared<C: RealtimeConnector> {
    url: String,
    connector: Arc<C>,
    handler: MessageHandler,
    reconnect_delay: Duration,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Frames waiting for the connection to open.
    pending: VecDeque<String>,
    /// Feed into the live connection task while the channel is open.
    outbound: Option<mpsc::UnboundedSender<String>>,
    reconnect_scheduled: bool,
}

impl<C: RealtimeConnector> RealtimeChannel<C> {
    /// Create an idle channel. Inbound messages are passed to `handler`,
    /// which is fixed for the channel's lifetime.
    pub fn new(
        connector: Arc<C>,
        url: impl Into<String>,
        reconnect_delay: Duration,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                connector,
                handler: Box::new(handler),
                reconnect_delay,
                cancel: CancellationToken::new(),
                state,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Start connecting. No-op unless the channel is idle.
    pub fn connect(&self) {
        self.shared.connect();
    }

    /// Serialize `data` as JSON and send it.
    ///
    /// Sent immediately when open, queued otherwise. Fails only when the
    /// frame cannot be encoded or the channel was disconnected.
    pub fn send<T: Serialize>(&self, data: &T) -> Result<(), ChannelError> {
        let frame = serde_json::to_string(data).map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.send_text(frame)
    }

    /// Send a raw text frame. See [`RealtimeChannel::send`].
    pub fn send_text(&self, frame: String) -> Result<(), ChannelError> {
        if self.shared.cancel.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        let mut inner = self.shared.lock();
        let frame = match inner.outbound.as_ref() {
            Some(tx) => match tx.send(frame) {
                Ok(()) => return Ok(()),
                Err(returned) => returned.0,
            },
            None => frame,
        };
        inner.pending.push_back(frame);
        Ok(())
    }

    /// Number of frames waiting for the connection to open.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// A handle that resolves once this channel is open.
    pub fn open_signal(&self) -> OpenSignal {
        OpenSignal {
            state: self.shared.state.subscribe(),
        }
    }

    /// Wait until the channel is open. Errors if it is disconnected first.
    pub async fn wait_for_open(&self) -> Result<(), ChannelError> {
        self.open_signal().wait().await
    }

    /// Close the channel for good: cancel any pending reconnect, close the
    /// live connection and discard queued frames. Idempotent.
    pub fn disconnect(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();
        {
            let mut inner = self.shared.lock();
            inner.pending.clear();
            inner.outbound = None;
            inner.reconnect_scheduled = false;
        }
        self.shared.state.send_replace(ChannelState::Closed);
        debug!("realtime channel disconnected");
    }
}

impl<C: RealtimeConnector> Drop for RealtimeChannel<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<C: RealtimeConnector> std::fmt::Debug for RealtimeChannel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("state", &self.state())
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Resolves once a channel reaches `Open`; see [`RealtimeChannel::open_signal`].
///
/// Owns its state receiver, so it can be awaited without borrowing the
/// channel.
pub struct OpenSignal {
    state: watch::Receiver<ChannelState>,
}

impl OpenSignal {
    pub async fn wait(mut self) -> Result<(), ChannelError> {
        let open = self
            .state
            .wait_for(|state| matches!(state, ChannelState::Open | ChannelState::Closed))
            .await
            .map(|state| *state == ChannelState::Open)
            .map_err(|_| ChannelError::Closed)?;
        if open { Ok(()) } else { Err(ChannelError::Closed) }
    }
}

impl<C: RealtimeConnector> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let started = self.state.send_if_modified(|state| {
            if *state != ChannelState::Idle {
                return false;
            }
            *state = ChannelState::Connecting;
            true
        });
        if !started {
            trace!("realtime connect ignored, channel not idle");
            return;
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.run().await });
    }

    async fn run(self: Arc<Self>) {
        let attempt = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.connector.connect(&self.url) => result,
        };

        match attempt {
            Ok(connection) => self.drive(connection).await,
            Err(ChannelError::Construction(reason)) => {
                warn!(%reason, "realtime connection could not be constructed");
                self.state.send_if_modified(|state| {
                    if *state != ChannelState::Connecting {
                        return false;
                    }
                    *state = ChannelState::Idle;
                    true
                });
            }
            Err(err) => {
                debug!(error = %err, "realtime connect attempt failed");
                self.handle_drop();
            }
        }
    }

    /// Pump one open connection until it drops or the channel is closed.
    async fn drive(self: &Arc<Self>, mut connection: C::Connection) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut unsent: VecDeque<String> = {
            let mut inner = self.lock();
            inner.outbound = Some(tx);
            inner.pending.drain(..).collect()
        };

        let opened = self.state.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                return false;
            }
            *state = ChannelState::Open;
            true
        });
        if !opened {
            connection.close().await;
            return;
        }
        info!(queued = unsent.len(), "realtime channel open");

        let dropped = loop {
            if let Some(frame) = unsent.front() {
                let written = connection.send(frame).await;
                match written {
                    Ok(()) => {
                        unsent.pop_front();
                    }
                    Err(err) => break Some(err),
                }
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    connection.close().await;
                    return;
                }
                inbound = connection.next_text() => match inbound {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(err)) => break Some(err),
                    None => break None,
                },
                Some(frame) = rx.recv() => unsent.push_back(frame),
            }
        };

        match dropped {
            Some(err) => debug!(error = %err, "realtime connection dropped"),
            None => debug!("realtime connection closed by peer"),
        }

        {
            let mut inner = self.lock();
            inner.outbound = None;
            while let Ok(frame) = rx.try_recv() {
                unsent.push_back(frame);
            }
            if !self.cancel.is_cancelled() {
                unsent.extend(inner.pending.drain(..));
                inner.pending = unsent;
            }
        }
        self.handle_drop();
    }

    fn dispatch(&self, text: &str) {
        match decode_frame(text) {
            Some(message) => (self.handler)(message),
            None => trace!(len = text.len(), "discarding malformed realtime frame"),
        }
    }

    /// Return to idle and schedule one reconnect, unless closed.
    fn handle_drop(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == ChannelState::Closed || *state == ChannelState::Idle {
                return false;
            }
            *state = ChannelState::Idle;
            true
        });

        {
            let mut inner = self.lock();
            if inner.reconnect_scheduled {
                return;
            }
            inner.reconnect_scheduled = true;
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = shared.cancel.cancelled() => {}
                _ = tokio::time::sleep(shared.reconnect_delay) => {
                    shared.lock().reconnect_scheduled = false;
                    debug!("reconnecting realtime channel");
                    shared.connect();
                }
            }
        });
    }
}
