//! Transport abstraction traits for the activity channel.
//!
//! The channel only needs to open a text connection to a URL, read from it,
//! write to it and close it. Keeping that behind [`Connector`] and
//! [`Connection`] lets the reconnect logic run against scripted connections
//! in tests.

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection attempt timed out.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to establish a connection.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The endpoint URL cannot be used.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Opens connections to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;

    /// Get the connector name (e.g., "websocket").
    fn name(&self) -> &'static str;
}

/// An open text connection.
#[async_trait]
pub trait Connection: Send {
    /// Receive the next text message.
    ///
    /// Returns `None` if the connection was closed cleanly. Must be cancel
    /// safe: dropping the future must not lose a message already read.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Send a text message.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}
