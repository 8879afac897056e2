//! WebSocket connector using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace, warn};

use crate::traits::{Connection, Connector, TransportError};

/// WebSocket connector configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Time allowed for the TCP, TLS and WebSocket handshakes.
    pub connect_timeout: Duration,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}

/// Opens WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, response) = tokio::time::timeout(self.config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        debug!(url, status = %response.status(), "WebSocket handshake completed");

        Ok(Box::new(WebSocketConnection {
            stream,
            is_open: true,
            max_message_size: self.config.max_message_size,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// A client WebSocket connection.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    is_open: bool,
    max_message_size: usize,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > self.max_message_size {
                        warn!(
                            "Message too large: {} bytes (max: {})",
                            text.len(),
                            self.max_message_size
                        );
                        continue;
                    }
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) if text.len() <= self.max_message_size => return Ok(Some(text)),
                    Ok(_) => warn!("Binary message too large"),
                    Err(_) => trace!("Dropping non-UTF-8 binary message"),
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // Pings are answered by tungstenite on the next read or write.
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Received close frame");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    debug!("WebSocket stream ended");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.is_open = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.is_open, false) {
            return Ok(()); // Already closed
        }
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(format!("Failed to close: {e}"))),
        }
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_config_default() {
        let config = WebSocketConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 1024 * 1024);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::default();
        let result = connector.connect(&format!("ws://{addr}/api/jobs/ws")).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
