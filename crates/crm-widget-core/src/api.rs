//! Widget backend API trait.
//!
//! The coordinator talks to the backend only through this port. The HTTP
//! implementation lives in crm-widget-infra; responses are already
//! normalized into canonical types when they cross it.

use crm_widget_types::chat::{ChatDescriptor, ChatId, Handshake};
use crm_widget_types::error::ApiError;
use crm_widget_types::message::Message;

/// Trait for the widget REST backend.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait WidgetApi: Send + Sync + 'static {
    /// Set the bearer token carried by every later request.
    fn set_token(&self, token: &str);

    /// Handshake: establish or resume the visitor identity.
    ///
    /// Not idempotent; each call may mint a new token.
    fn init(
        &self,
        workspace_id: &str,
        visitor_id: Option<&str>,
        chat_id: Option<&ChatId>,
    ) -> impl std::future::Future<Output = Result<Handshake, ApiError>> + Send;

    /// Create a new chat thread for the visitor. Every call creates one.
    fn create_chat(
        &self,
        visitor_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatDescriptor, ApiError>> + Send;

    /// Post a visitor message to a chat thread.
    fn send_message(
        &self,
        chat_id: &ChatId,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Message, ApiError>> + Send;

    /// Chat history, oldest first.
    fn get_messages(
        &self,
        chat_id: &ChatId,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, ApiError>> + Send;
}
