//! Message transports
//!
//! A [`Transport`] moves whole WAMP messages; a [`Connector`] opens one per
//! connection attempt. The WebSocket implementation speaks the
//! `wamp.2.json` subprotocol.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::error::WampError;
use crate::message::Message;
use crate::Result;

pub const SUBPROTOCOL: &str = "wamp.2.json";

#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: Message) -> Result<()>;

    /// Next message, or `None` once the peer has gone away
    async fn recv(&mut self) -> Option<Result<Message>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub struct WebSocketTransport {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: Message) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(message.to_text()))
            .await
            .map_err(|e| WampError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Message>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Message::from_text(&text));
                }
                Some(Ok(tungstenite::Message::Binary(_))) => {
                    return Some(Err(WampError::Protocol(
                        "binary frame on a JSON session".to_string(),
                    )));
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    tracing::debug!(?frame, "WebSocket closed by peer");
                    return None;
                }
                // Pongs are answered by tungstenite on the next write
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Some(Err(WampError::Transport(e.to_string())));
                }
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.send(tungstenite::Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// Opens real WebSocket connections
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        use tungstenite::client::IntoClientRequest;

        let mut request = url
            .into_client_request()
            .map_err(|e| WampError::InvalidConfig(format!("invalid WebSocket URL {}: {}", url, e)))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            tungstenite::http::HeaderValue::from_static(SUBPROTOCOL),
        );

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| WampError::Transport(e.to_string()))?;

        tracing::debug!(url = %url, "WebSocket connected");

        let (sink, stream) = ws_stream.split();
        Ok(Box::new(WebSocketTransport { sink, stream }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_invalid_url_returns_error() {
        let result = WebSocketConnector.connect("not-a-url").await;
        assert!(result.is_err());
    }
}
