//! Hand-written port doubles shared by the core test modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use crm_widget_types::chat::{ChatDescriptor, ChatId, Handshake};
use crm_widget_types::error::{ApiError, ChannelError, StorageError};
use crm_widget_types::message::{Message, Sender};
use tokio::sync::{mpsc, oneshot};

use crate::api::WidgetApi;
use crate::realtime::transport::{RealtimeConnection, RealtimeConnector};
use crate::storage::kv_store::KeyValueStorage;
use crate::storage::memory::MemoryStorage;

// --- Realtime ---

pub(crate) enum ConnectOutcome {
    Accept,
    /// Transient failure, counts as a drop.
    Refuse,
    /// Construction failure, never retried.
    Invalid,
    /// Accept once the paired sender fires.
    Gated(oneshot::Receiver<()>),
}

/// Connector whose attempts are scripted. Unscripted attempts are accepted.
pub(crate) struct MockConnector {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
    attempts: AtomicUsize,
    urls: Mutex<Vec<String>>,
    links_tx: mpsc::UnboundedSender<MockLink>,
    links_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockLink>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            links_tx,
            links_rx: tokio::sync::Mutex::new(links_rx),
        }
    }

    pub(crate) fn push_outcome(&self, outcome: ConnectOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Script a connect that hangs until the returned sender fires.
    pub(crate) fn push_gated(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push_outcome(ConnectOutcome::Gated(rx));
        tx
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// The server side of the next established connection.
    pub(crate) async fn next_link(&self) -> MockLink {
        let mut links = self.links_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(30), links.recv())
            .await
            .expect("timed out waiting for a realtime connection")
            .expect("connector dropped")
    }
}

impl RealtimeConnector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, url: &str) -> Result<MockConnection, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Accept);

        match outcome {
            ConnectOutcome::Accept => {}
            ConnectOutcome::Refuse => return Err(ChannelError::Connect("refused".to_string())),
            ConnectOutcome::Invalid => {
                return Err(ChannelError::Construction("invalid url".to_string()));
            }
            ConnectOutcome::Gated(gate) => {
                if gate.await.is_err() {
                    return Err(ChannelError::Connect("gate dropped".to_string()));
                }
            }
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.links_tx.send(MockLink {
            url: url.to_string(),
            inbound: inbound_tx,
            sent: sent_rx,
            closed: Arc::clone(&closed),
        });
        Ok(MockConnection {
            inbound: inbound_rx,
            sent: sent_tx,
            closed,
        })
    }
}

pub(crate) struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl RealtimeConnection for MockConnection {
    async fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.sent
            .send(frame.to_string())
            .map_err(|_| ChannelError::Transport("peer gone".to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, ChannelError>> {
        match self.inbound.recv().await {
            Some(Some(text)) => Some(Ok(text)),
            Some(None) | None => None,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Server end of a mock connection.
pub(crate) struct MockLink {
    pub(crate) url: String,
    inbound: mpsc::UnboundedSender<Option<String>>,
    pub(crate) sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockLink {
    pub(crate) fn push(&self, text: &str) {
        let _ = self.inbound.send(Some(text.to_string()));
    }

    /// Simulate the server dropping the connection.
    pub(crate) fn drop_connection(&self) {
        let _ = self.inbound.send(None);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// --- Storage ---

/// In-memory storage whose writes take `delay` to land.
pub(crate) struct SlowStorage {
    inner: MemoryStorage,
    delay: Duration,
}

impl SlowStorage {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
        }
    }
}

impl KeyValueStorage for SlowStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

// --- REST ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    SetToken(String),
    Init {
        workspace_id: String,
        visitor_id: Option<String>,
        chat_id: Option<ChatId>,
    },
    CreateChat {
        visitor_id: String,
    },
    SendMessage {
        chat_id: ChatId,
        content: String,
    },
    GetMessages {
        chat_id: ChatId,
    },
}

/// Scripted `WidgetApi` that records every call.
pub(crate) struct MockApi {
    handshake: Mutex<Result<Handshake, ApiError>>,
    history: Mutex<Result<Vec<Message>, ApiError>>,
    created_chat: Mutex<Result<ChatDescriptor, ApiError>>,
    send_result: Mutex<Result<(), ApiError>>,
    create_delay: Duration,
    calls: Mutex<Vec<ApiCall>>,
}

pub(crate) fn server_error(path: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        method: "POST".to_string(),
        path: path.to_string(),
    }
}

impl MockApi {
    pub(crate) fn new(handshake: Handshake) -> Self {
        Self {
            handshake: Mutex::new(Ok(handshake)),
            history: Mutex::new(Ok(Vec::new())),
            created_chat: Mutex::new(Ok(ChatDescriptor::new("42"))),
            send_result: Mutex::new(Ok(())),
            create_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_init() -> Self {
        let api = Self::new(Handshake::new("unused", "unused"));
        *api.handshake.lock().unwrap() = Err(server_error("/widget/init"));
        api
    }

    pub(crate) fn with_history(self, history: Result<Vec<Message>, ApiError>) -> Self {
        *self.history.lock().unwrap() = history;
        self
    }

    pub(crate) fn with_created_chat(self, chat: Result<ChatDescriptor, ApiError>) -> Self {
        *self.created_chat.lock().unwrap() = chat;
        self
    }

    pub(crate) fn with_send_result(self, result: Result<(), ApiError>) -> Self {
        *self.send_result.lock().unwrap() = result;
        self
    }

    pub(crate) fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub(crate) fn set_created_chat(&self, chat: Result<ChatDescriptor, ApiError>) {
        *self.created_chat.lock().unwrap() = chat;
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn create_chat_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::CreateChat { .. }))
            .count()
    }

    pub(crate) fn sent_messages(&self) -> Vec<(ChatId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::SendMessage { chat_id, content } => Some((chat_id, content)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WidgetApi for MockApi {
    fn set_token(&self, token: &str) {
        self.record(ApiCall::SetToken(token.to_string()));
    }

    async fn init(
        &self,
        workspace_id: &str,
        visitor_id: Option<&str>,
        chat_id: Option<&ChatId>,
    ) -> Result<Handshake, ApiError> {
        self.record(ApiCall::Init {
            workspace_id: workspace_id.to_string(),
            visitor_id: visitor_id.map(str::to_string),
            chat_id: chat_id.cloned(),
        });
        self.handshake.lock().unwrap().clone()
    }

    async fn create_chat(&self, visitor_id: &str) -> Result<ChatDescriptor, ApiError> {
        self.record(ApiCall::CreateChat {
            visitor_id: visitor_id.to_string(),
        });
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.created_chat.lock().unwrap().clone()
    }

    async fn send_message(&self, chat_id: &ChatId, content: &str) -> Result<Message, ApiError> {
        self.record(ApiCall::SendMessage {
            chat_id: chat_id.clone(),
            content: content.to_string(),
        });
        let result = self.send_result.lock().unwrap().clone();
        result.map(|()| Message {
            id: "srv-1".to_string(),
            chat_id: Some(chat_id.clone()),
            content: content.to_string(),
            sender: Sender::Visitor,
            created_at: Utc::now(),
        })
    }

    async fn get_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, ApiError> {
        self.record(ApiCall::GetMessages {
            chat_id: chat_id.clone(),
        });
        self.history.lock().unwrap().clone()
    }
}
