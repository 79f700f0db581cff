//! HttpApiClient -- concrete [`WidgetApi`] implementation over reqwest.
//!
//! Talks to the widget REST endpoints with JSON bodies. Every response is
//! decoded into its snake/camel wire variant and normalized into the
//! canonical type before it leaves this module.
//!
//! The bearer token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building request headers.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crm_widget_core::api::WidgetApi;
use crm_widget_types::chat::{ChatDescriptor, ChatId, ChatWire, Handshake, HandshakeWire};
use crm_widget_types::config::WidgetConfig;
use crm_widget_types::error::ApiError;
use crm_widget_types::message::{Message, MessageWire};

/// Header carrying the public widget key.
const WIDGET_KEY_HEADER: &str = "X-Widget-Key";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the widget backend.
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    public_key: Option<String>,
    workspace_id: Option<String>,
    token: RwLock<Option<SecretString>>,
}

#[derive(Serialize)]
struct InitBody<'a> {
    workspace_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct CreateChatBody<'a> {
    visitor_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    content: &'a str,
}

/// Numeric chat ids go back to the server as JSON numbers.
fn chat_id_value(chat_id: &ChatId) -> serde_json::Value {
    match chat_id.as_str().parse::<u64>() {
        Ok(n) => serde_json::Value::from(n),
        Err(_) => serde_json::Value::from(chat_id.as_str()),
    }
}

/// `/widget/chat/{id}/messages` with the id percent-encoded as one segment.
fn messages_path(chat_id: &ChatId) -> Result<String, ApiError> {
    let mut url = Url::parse("http://widget.invalid/widget/chat")
        .map_err(|e| ApiError::Client(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Client("chat route cannot be a base".to_string()))?
        .push(chat_id.as_str())
        .push("messages");
    Ok(url.path().to_string())
}

impl HttpApiClient {
    /// Create a client for `base_url`. Trailing slashes are trimmed.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: None,
            workspace_id: None,
            token: RwLock::new(None),
        })
    }

    /// Build a client from widget configuration.
    pub fn from_config(config: &WidgetConfig) -> Result<Self, ApiError> {
        Ok(Self::with_timeout(config.api_base(), config.request_timeout())?
            .with_public_key(&config.public_key)
            .with_workspace(&config.workspace_id))
    }

    /// Send `X-Widget-Key` on every request. Empty keys are ignored.
    pub fn with_public_key(mut self, public_key: &str) -> Self {
        self.public_key = Some(public_key.to_string()).filter(|k| !k.is_empty());
        self
    }

    /// Include the workspace id when creating chats.
    pub fn with_workspace(mut self, workspace_id: &str) -> Self {
        self.workspace_id = Some(workspace_id.to_string()).filter(|w| !w.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.public_key {
            builder = builder.header(WIDGET_KEY_HEADER, key);
        }
        {
            let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = token.as_ref() {
                builder = builder.bearer_auth(token.expose_secret());
            }
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!(%method, path, "widget api request");
        let response = builder.send().await.map_err(|e| ApiError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%method, path, status = status.as_u16(), "widget api error status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            method: method.to_string(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl WidgetApi for HttpApiClient {
    fn set_token(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            Some(SecretString::from(token.to_string()));
    }

    async fn init(
        &self,
        workspace_id: &str,
        visitor_id: Option<&str>,
        chat_id: Option<&ChatId>,
    ) -> Result<Handshake, ApiError> {
        let body = InitBody {
            workspace_id,
            visitor_id,
            chat_id: chat_id.map(chat_id_value),
        };
        let wire: HandshakeWire = self
            .request(Method::POST, "/widget/init", Some(&body))
            .await?;
        Ok(wire.into())
    }

    async fn create_chat(&self, visitor_id: &str) -> Result<ChatDescriptor, ApiError> {
        let body = CreateChatBody {
            visitor_id,
            workspace_id: self.workspace_id.as_deref(),
        };
        let wire: ChatWire = self
            .request(Method::POST, "/widget/chat", Some(&body))
            .await?;
        Ok(wire.into())
    }

    async fn send_message(&self, chat_id: &ChatId, content: &str) -> Result<Message, ApiError> {
        let path = messages_path(chat_id)?;
        let wire: MessageWire = self
            .request(Method::POST, &path, Some(&SendMessageBody { content }))
            .await?;
        Ok(wire.into())
    }

    async fn get_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, ApiError> {
        let path = messages_path(chat_id)?;
        let wire: Vec<MessageWire> = self.request::<(), _>(Method::GET, &path, None).await?;
        Ok(wire.into_iter().map(Message::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_widget_types::message::Sender;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> HttpApiClient {
        HttpApiClient::new(&server.uri())
            .unwrap()
            .with_public_key("pk-1")
            .with_workspace("ws-1")
    }

    #[tokio::test]
    async fn init_sends_widget_key_without_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/init"))
            .and(header("X-Widget-Key", "pk-1"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({"workspace_id": "ws-1", "visitor_id": "v-1", "chat_id": 7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "visitor_id": "v-1",
                "token": "t1",
                "chat": {"id": 7, "uuid": "u-7", "status": "open", "origin": "widget"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let handshake = api
            .init("ws-1", Some("v-1"), Some(&ChatId::from("7")))
            .await
            .unwrap();

        assert_eq!(handshake.visitor_id, "v-1");
        assert_eq!(handshake.token, "t1");
        assert_eq!(handshake.chat_id(), Some(&ChatId::from("7")));

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn init_accepts_camel_case_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/init"))
            .and(body_json(json!({"workspace_id": "ws-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "visitorId": "v-9",
                "token": "t9",
                "agentName": "Ana",
                "welcomeMessage": "Olá!"
            })))
            .mount(&server)
            .await;

        let handshake = client(&server).await.init("ws-1", None, None).await.unwrap();

        assert_eq!(handshake.visitor_id, "v-9");
        assert!(handshake.chat.is_none());
        assert_eq!(handshake.agent_name.as_deref(), Some("Ana"));
        assert_eq!(handshake.welcome_message.as_deref(), Some("Olá!"));
    }

    #[tokio::test]
    async fn token_is_sent_as_bearer_after_set_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget/chat/42/messages"))
            .and(header("authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "chat_id": 42, "content": "hi", "sender_id": null,
                 "created_at": "2024-05-01T10:00:00Z"},
                {"id": "m2", "chatId": 42, "content": "hello", "sender": "agent",
                 "createdAt": "2024-05-01T10:00:05Z"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        assert!(!api.has_token());
        api.set_token("t1");
        assert!(api.has_token());

        let messages = api.get_messages(&ChatId::from("42")).await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::Visitor);
        assert_eq!(messages[1].sender, Sender::Agent);
        assert_eq!(messages[1].chat_id, Some(ChatId::from("42")));
    }

    #[tokio::test]
    async fn chat_id_is_encoded_as_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget/chat/a%2Fb%3Fc/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let messages = api.get_messages(&ChatId::from("a/b?c")).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn create_chat_posts_visitor_and_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/chat"))
            .and(body_json(json!({"visitor_id": "v-1", "workspace_id": "ws-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 42, "uuid": "u-42", "status": "open", "origin": "widget"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = client(&server).await.create_chat("v-1").await.unwrap();

        assert_eq!(chat.id, ChatId::from("42"));
        assert_eq!(chat.uuid.as_deref(), Some("u-42"));
    }

    #[tokio::test]
    async fn send_message_posts_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/chat/42/messages"))
            .and(body_json(json!({"content": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 99, "chat_id": 42, "content": "hello", "sender_id": null,
                "visitor_id": "v-1", "created_at": "2024-05-01T10:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let message = client(&server)
            .await
            .send_message(&ChatId::from("42"), "hello")
            .await
            .unwrap();

        assert_eq!(message.id, "99");
        assert_eq!(message.sender, Sender::Visitor);
    }

    #[tokio::test]
    async fn error_status_names_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).await.create_chat("v-1").await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                method: "POST".to_string(),
                path: "/widget/chat".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/init"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).await.init("ws-1", None, None).await.unwrap_err();

        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widget/init"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"visitor_id": "v", "token": "t"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpApiClient::new(&format!("{}//", server.uri())).unwrap();
        assert_eq!(api.base_url(), server.uri());
        api.init("ws-1", None, None).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let api = HttpApiClient::with_timeout("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = api.init("ws-1", None, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[test]
    fn from_config_uses_configured_values() {
        let mut config = WidgetConfig::new("ws-1", "pk-1");
        config.api_url = "https://api.example.com/".to_string();
        let api = HttpApiClient::from_config(&config).unwrap();
        assert_eq!(api.base_url(), "https://api.example.com");
        assert_eq!(api.public_key.as_deref(), Some("pk-1"));
        assert_eq!(api.workspace_id.as_deref(), Some("ws-1"));
    }
}
