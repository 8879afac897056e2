//! Text codec for the activity channel.
//!
//! Every message on the channel is a text frame. The client sends the literal
//! [`PING`] as keepalive and the server answers with [`PONG`]; every other
//! inbound frame is a JSON-encoded [`ActivityEvent`].

use thiserror::Error;

use crate::events::ActivityEvent;

/// Keepalive token sent by the client.
pub const PING: &str = "ping";

/// Keepalive acknowledgment sent by the server.
pub const PONG: &str = "pong";

/// Protocol errors that can occur while decoding inbound frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON.
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Keepalive acknowledgment; carries no data.
    Pong,
    /// A structured activity event.
    Event(ActivityEvent),
}

/// Decode an inbound text frame.
///
/// # Errors
///
/// Returns an error if the frame is neither the pong token nor valid JSON.
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    if text == PONG {
        return Ok(Inbound::Pong);
    }
    let event = serde_json::from_str(text)?;
    Ok(Inbound::Event(event))
}
