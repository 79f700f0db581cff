//! Session coordinator: the widget's orchestration layer.
//!
//! `SessionCoordinator` bootstraps the visitor session, loads history,
//! attaches the realtime channel, lazily creates the chat thread on the
//! first send, and keeps the [`WidgetView`] up to date.
//!
//! Generic over the three ports so crm-widget-core never depends on
//! crm-widget-infra. All view mutations go through a `watch::Sender`; no
//! lock is held across an await except the chat-creation guard.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crm_widget_types::chat::ChatId;
use crm_widget_types::config::{DispatchMode, WidgetConfig};
use crm_widget_types::error::WidgetError;
use crm_widget_types::message::{Message, OutboundMessage};
use crm_widget_types::session::VisitorSession;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::WidgetApi;
use crate::realtime::channel::{ChannelState, RealtimeChannel};
use crate::realtime::endpoint::realtime_url;
use crate::realtime::transport::RealtimeConnector;
use crate::storage::kv_store::KeyValueStorage;
use crate::storage::session_store::SessionStore;
use crate::widget::view::{
    CHAT_CREATE_FAILED_NOTICE, DELIVERY_FAILED_NOTICE, HANDSHAKE_FAILED_NOTICE, Notice,
    WidgetView,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Orchestrates one visitor's session against the backend.
pub struct SessionCoordinator<A: WidgetApi, S: KeyValueStorage, C: RealtimeConnector> {
    config: WidgetConfig,
    api: A,
    store: SessionStore<S>,
    connector: Arc<C>,
    view: Arc<watch::Sender<WidgetView>>,
    session: Arc<Mutex<Option<VisitorSession>>>,
    channel: Mutex<Option<RealtimeChannel<C>>>,
    /// Serializes chat creation so concurrent first sends create one thread.
    chat_guard: tokio::sync::Mutex<()>,
    /// Bumped by `shutdown`/`clear_session`; continuations started under an
    /// older generation discard their results.
    generation: Arc<AtomicU64>,
    notice_seq: AtomicU64,
    sends_in_flight: AtomicUsize,
}

impl<A: WidgetApi, S: KeyValueStorage, C: RealtimeConnector> SessionCoordinator<A, S, C> {
    pub fn new(config: WidgetConfig, api: A, storage: S, connector: C) -> Self {
        let (view, _) = watch::channel(WidgetView::default());
        Self {
            config,
            api,
            store: SessionStore::new(storage),
            connector: Arc::new(connector),
            view: Arc::new(view),
            session: Arc::new(Mutex::new(None)),
            channel: Mutex::new(None),
            chat_guard: tokio::sync::Mutex::new(()),
            generation: Arc::new(AtomicU64::new(0)),
            notice_seq: AtomicU64::new(0),
            sends_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Current view snapshot.
    pub fn view(&self) -> WidgetView {
        self.view.borrow().clone()
    }

    /// Stream of view snapshots.
    pub fn subscribe(&self) -> watch::Receiver<WidgetView> {
        self.view.subscribe()
    }

    /// The in-memory visitor session, once bootstrapped.
    pub fn session(&self) -> Option<VisitorSession> {
        lock(&self.session).clone()
    }

    pub fn channel_state(&self) -> Option<ChannelState> {
        lock(&self.channel).as_ref().map(RealtimeChannel::state)
    }

    /// Realtime endpoint of the attached channel.
    pub fn channel_url(&self) -> Option<String> {
        lock(&self.channel)
            .as_ref()
            .map(|channel| channel.url().to_string())
    }

    // --- Bootstrap ---

    /// Establish the visitor session, load history and attach realtime.
    ///
    /// A failed handshake is surfaced as a notice and leaves the widget
    /// degraded; there is no automatic retry.
    pub async fn start(&self) -> Result<(), WidgetError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let stored = self.store.load().await;
        let resume = self
            .config
            .resume_chat
            .then(|| stored.as_ref().and_then(|s| s.chat_id.as_ref()))
            .flatten();

        let init = self
            .api
            .init(
                &self.config.workspace_id,
                stored.as_ref().map(|s| s.visitor_id.as_str()),
                resume,
            )
            .await;
        let handshake = match init {
            Ok(handshake) => handshake,
            Err(err) => {
                warn!(error = %err, "widget handshake failed");
                if self.is_current(generation) {
                    self.view.send_modify(|view| view.loading = false);
                    self.show_notice(HANDSHAKE_FAILED_NOTICE);
                }
                return Err(err.into());
            }
        };
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }

        self.api.set_token(&handshake.token);
        let chat_id = handshake.chat_id().cloned().or_else(|| {
            stored
                .filter(|s| self.config.resume_chat && s.visitor_id == handshake.visitor_id)
                .and_then(|s| s.chat_id)
        });
        let session = VisitorSession {
            visitor_id: handshake.visitor_id.clone(),
            chat_id,
            token: Some(handshake.token.clone()),
        };
        self.store.save(&session).await;
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }
        *lock(&self.session) = Some(session.clone());

        let agent_name = handshake.agent_name.clone().filter(|n| !n.trim().is_empty());
        let agent_avatar = handshake.agent_avatar.clone();
        self.view.send_modify(|view| {
            if let Some(name) = agent_name {
                view.agent_name = name;
            }
            view.agent_avatar = agent_avatar;
        });
        info!(
            visitor_id = %session.visitor_id,
            resumed = session.chat_id.is_some(),
            "visitor session established"
        );

        let history = match &session.chat_id {
            Some(chat_id) => match self.api.get_messages(chat_id).await {
                Ok(messages) => messages,
                Err(err) => {
                    debug!(chat_id = %chat_id, error = %err, "history fetch failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }

        let welcome = handshake
            .welcome_message
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| self.config.welcome_message.clone());
        let welcome_chat = session.chat_id.clone();
        self.view.send_modify(|view| {
            let mut messages = history;
            if messages.is_empty() && !welcome.trim().is_empty() {
                messages.push(Message::welcome(welcome_chat, welcome));
            }
            messages.append(&mut view.messages);
            view.messages = messages;
            view.loading = false;
        });

        self.attach_realtime(&session, generation);
        Ok(())
    }

    // --- Intents ---

    /// Send a visitor message, creating the chat thread first if needed.
    pub async fn send(&self, content: &str) -> Result<(), WidgetError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(WidgetError::EmptyMessage);
        }
        if self.session().is_none() {
            return Err(WidgetError::NotReady);
        }
        let generation = self.generation.load(Ordering::SeqCst);

        self.begin_send();
        let result = self.send_inner(&content, generation).await;
        self.end_send();
        result
    }

    async fn send_inner(&self, content: &str, generation: u64) -> Result<(), WidgetError> {
        let session = match self.ensure_chat(generation).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not create chat thread");
                if self.is_current(generation) {
                    let restored = content.to_string();
                    self.view.send_modify(|view| view.draft = restored);
                    self.show_notice(CHAT_CREATE_FAILED_NOTICE);
                }
                return Err(err);
            }
        };
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }
        let Some(chat_id) = session.chat_id.clone() else {
            return Err(WidgetError::NotReady);
        };

        let echo = Message::optimistic(Some(chat_id.clone()), content);
        self.view.send_modify(|view| {
            view.messages.push(echo);
            view.agent_typing = true;
        });

        let delivered = self.deliver(&session, &chat_id, content, generation).await;
        if let Err(err) = &delivered {
            warn!(chat_id = %chat_id, error = %err, "message delivery failed");
            if self.is_current(generation) {
                self.show_notice(DELIVERY_FAILED_NOTICE);
            }
        }
        delivered
    }

    /// Record the input text.
    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.view.send_modify(|view| view.draft = text);
    }

    /// Open the widget: clear unread and request input focus.
    pub fn open(&self) {
        self.view.send_modify(|view| {
            view.is_open = true;
            view.unread = 0;
            view.focus_requests += 1;
        });
    }

    /// Close the widget. The realtime channel stays connected.
    pub fn close(&self) {
        self.view.send_modify(|view| view.is_open = false);
    }

    pub fn toggle(&self) {
        let is_open = self.view.borrow().is_open;
        if is_open { self.close() } else { self.open() }
    }

    // --- Teardown ---

    /// Disconnect realtime and invalidate in-flight continuations.
    pub fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let channel = lock(&self.channel).take();
        if let Some(channel) = channel {
            channel.disconnect();
        }
        debug!("widget session shut down");
    }

    /// Forget the visitor: shut down, clear storage and reset the view.
    ///
    /// A later `start()` establishes a fresh identity.
    pub async fn clear_session(&self) {
        self.shutdown();
        // A first send may be persisting its new chat; wait so it cannot
        // write the session back after the clear.
        let _guard = self.chat_guard.lock().await;
        *lock(&self.session) = None;
        self.store.clear().await;
        self.view.send_modify(|view| {
            *view = WidgetView {
                is_open: view.is_open,
                ..WidgetView::default()
            };
        });
        info!("visitor session cleared");
    }

    // --- Internals ---

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Return a session with a chat id, creating the thread if needed.
    async fn ensure_chat(&self, generation: u64) -> Result<VisitorSession, WidgetError> {
        if let Some(session) = self.session().filter(|s| s.chat_id.is_some()) {
            return Ok(session);
        }

        let _guard = self.chat_guard.lock().await;
        // Another send may have created the thread while we waited.
        let session = self.session().ok_or(WidgetError::NotReady)?;
        if session.chat_id.is_some() {
            return Ok(session);
        }

        let chat = self.api.create_chat(&session.visitor_id).await?;
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }

        let updated = VisitorSession {
            chat_id: Some(chat.id.clone()),
            ..session
        };
        self.store.save(&updated).await;
        if !self.is_current(generation) {
            return Err(WidgetError::Shutdown);
        }
        {
            let mut slot = lock(&self.session);
            match slot.as_mut() {
                Some(current) if current.visitor_id == updated.visitor_id => {
                    current.chat_id = Some(chat.id.clone());
                }
                _ => return Err(WidgetError::Shutdown),
            }
        }
        info!(chat_id = %chat.id, "chat thread created");

        self.attach_realtime(&updated, generation);
        Ok(updated)
    }

    async fn deliver(
        &self,
        session: &VisitorSession,
        chat_id: &ChatId,
        content: &str,
        generation: u64,
    ) -> Result<(), WidgetError> {
        if self.config.dispatch == DispatchMode::Socket {
            if self.send_over_channel(&session.visitor_id, content).await {
                return Ok(());
            }
            if !self.is_current(generation) {
                return Err(WidgetError::Shutdown);
            }
            debug!(chat_id = %chat_id, "realtime channel not open in time, sending over REST");
        }
        self.api.send_message(chat_id, content).await?;
        Ok(())
    }

    /// Send over the realtime channel once it opens. False when there is
    /// no channel or it does not open within `open_timeout`.
    async fn send_over_channel(&self, visitor_id: &str, content: &str) -> bool {
        let signal = {
            let channel = lock(&self.channel);
            channel.as_ref().map(RealtimeChannel::open_signal)
        };
        let Some(signal) = signal else {
            return false;
        };
        match tokio::time::timeout(self.config.open_timeout(), signal.wait()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => return false,
        }

        let frame = OutboundMessage::new(content, visitor_id);
        let channel = lock(&self.channel);
        channel
            .as_ref()
            .is_some_and(|channel| channel.send(&frame).is_ok())
    }

    /// Replace the realtime channel with one for the session's chat.
    fn attach_realtime(&self, session: &VisitorSession, generation: u64) {
        let Some(chat_id) = session.chat_id.clone() else {
            return;
        };

        let previous = lock(&self.channel).take();
        if let Some(previous) = previous {
            previous.disconnect();
        }

        let visitor_id = self
            .config
            .include_visitor_in_ws_url
            .then_some(session.visitor_id.as_str());
        let token = session.token.as_deref().unwrap_or_default();
        let url = match realtime_url(&self.config.ws_base(), token, &chat_id, visitor_id) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "realtime endpoint invalid, live updates disabled");
                return;
            }
        };

        let handler = self.inbound_handler(chat_id.clone(), generation);
        let channel = RealtimeChannel::new(
            Arc::clone(&self.connector),
            url,
            self.config.reconnect_delay(),
            handler,
        );
        channel.connect();
        *lock(&self.channel) = Some(channel);
        debug!(chat_id = %chat_id, "realtime channel attached");
    }

    fn inbound_handler(
        &self,
        chat_id: ChatId,
        generation: u64,
    ) -> impl Fn(Message) + Send + Sync + 'static {
        let view = Arc::clone(&self.view);
        let current_generation = Arc::clone(&self.generation);
        let session = Arc::clone(&self.session);
        move |message: Message| {
            if current_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let same_chat = lock(&session)
                .as_ref()
                .is_some_and(|s| s.chat_id.as_ref() == Some(&chat_id));
            if !same_chat {
                return;
            }
            view.send_modify(|view| {
                view.messages.push(message);
                if !view.is_open {
                    view.unread = view.unread.saturating_add(1);
                }
            });
        }
    }

    /// Put `text` in the notice slot and clear it after `notice_duration`,
    /// unless a newer notice replaced it meanwhile.
    fn show_notice(&self, text: &str) {
        let id = self.notice_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let notice = Notice {
            id,
            text: text.to_string(),
        };
        self.view.send_modify(|view| view.notice = Some(notice));

        let view = Arc::clone(&self.view);
        let duration = self.config.notice_duration();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            view.send_if_modified(|view| {
                if view.notice.as_ref().is_some_and(|n| n.id == id) {
                    view.notice = None;
                    return true;
                }
                false
            });
        });
    }

    fn begin_send(&self) {
        self.sends_in_flight.fetch_add(1, Ordering::SeqCst);
        self.view.send_modify(|view| {
            view.draft.clear();
            view.sending = true;
        });
    }

    fn end_send(&self) {
        if self.sends_in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.view.send_modify(|view| {
                view.sending = false;
                view.agent_typing = false;
            });
        }
    }
}
