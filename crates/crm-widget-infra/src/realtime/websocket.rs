//! WebSocket transport over tokio-tungstenite.
//!
//! Ping/pong is answered by tungstenite itself; only text frames (and
//! binary frames that are valid UTF-8) surface to the channel.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crm_widget_core::realtime::transport::{RealtimeConnection, RealtimeConnector};
use crm_widget_types::error::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` / `wss://` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

/// One open WebSocket connection.
pub struct WsConnection {
    stream: WsStream,
}

impl RealtimeConnector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, url: &str) -> Result<WsConnection, ChannelError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChannelError::Construction(format!(
                "unsupported realtime url: {url}"
            )));
        }
        let request = url
            .into_client_request()
            .map_err(|e| ChannelError::Construction(e.to_string()))?;

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        tracing::debug!(status = response.status().as_u16(), "websocket handshake complete");

        Ok(WsConnection { stream })
    }
}

impl RealtimeConnection for WsConnection {
    async fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.stream
            .send(WsMessage::Text(frame.to_string()))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::trace!("skipping non-utf8 binary frame"),
                },
                Ok(WsMessage::Close(frame)) => {
                    tracing::debug!(?frame, "websocket closed by peer");
                    return None;
                }
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(ChannelError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!(error = %e, "websocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crm_widget_core::realtime::{ChannelState, RealtimeChannel};
    use crm_widget_types::message::{Message, OutboundMessage, Sender};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Accept one WebSocket client. Text frames received from it are
    /// forwarded to the returned receiver; frames put on the returned
    /// sender are written back to it.
    async fn serve_one() -> (String, mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<WsMessage>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            loop {
                tokio::select! {
                    incoming = ws.next() => match incoming {
                        Some(Ok(WsMessage::Text(text))) => { let _ = seen_tx.send(text); }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    outgoing = push_rx.recv() => match outgoing {
                        Some(msg) => { let _ = ws.send(msg).await; }
                        None => break,
                    },
                }
            }
        });

        (format!("ws://{addr}/ws"), seen_rx, push_tx)
    }

    #[tokio::test]
    async fn rejects_non_websocket_urls() {
        let connector = WsConnector::new();
        for url in ["http://example.com/ws", "not a url", ""] {
            assert!(matches!(
                connector.connect(url).await,
                Err(ChannelError::Construction(_))
            ));
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector::new().connect(&format!("ws://{addr}/ws")).await;
        assert!(matches!(result, Err(ChannelError::Connect(_))));
    }

    #[tokio::test]
    async fn exchanges_text_frames() {
        let (url, mut seen, push) = serve_one().await;
        let mut conn = WsConnector::new().connect(&url).await.unwrap();

        conn.send("{\"type\":\"message\"}").await.unwrap();
        assert_eq!(seen.recv().await.unwrap(), "{\"type\":\"message\"}");

        push.send(WsMessage::Ping(vec![1])).unwrap();
        push.send(WsMessage::Binary(b"from-binary".to_vec())).unwrap();
        push.send(WsMessage::Text("hello".to_string())).unwrap();
        assert_eq!(conn.next_text().await.unwrap().unwrap(), "from-binary");
        assert_eq!(conn.next_text().await.unwrap().unwrap(), "hello");

        push.send(WsMessage::Close(None)).unwrap();
        assert!(conn.next_text().await.is_none());
    }

    #[tokio::test]
    async fn channel_delivers_over_websocket() {
        let (url, mut seen, push) = serve_one().await;
        let received: Arc<Mutex<Vec<Message>>> = Arc::default();
        let sink = Arc::clone(&received);

        let channel = RealtimeChannel::new(
            Arc::new(WsConnector::new()),
            url,
            Duration::from_millis(50),
            move |message| sink.lock().unwrap().push(message),
        );
        channel
            .send(&OutboundMessage::new("queued before open", "v-1"))
            .unwrap();
        channel.connect();
        channel.wait_for_open().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Open);

        let frame: serde_json::Value = serde_json::from_str(&seen.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["content"], "queued before open");
        assert_eq!(frame["visitor_id"], "v-1");

        push.send(WsMessage::Text(
            r#"{"id":7,"chat_id":42,"content":"hi there","sender":"agent","created_at":"2024-05-01T10:00:00Z"}"#
                .to_string(),
        ))
        .unwrap();

        for _ in 0..100 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content, "hi there");
        assert_eq!(received[0].sender, Sender::Agent);

        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Closed);
    }
}
