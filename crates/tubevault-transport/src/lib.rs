//! # tubevault-transport
//!
//! Realtime activity channel for the TubeVault client.
//!
//! - **Channel** - Keeps one connection to the backend's activity endpoint
//!   open, with keepalive pings and a fixed-delay reconnect loop
//! - **Connector** - Opens connections; WebSocket by default
//! - **Endpoint** - Derives `ws(s)://host/api/jobs/ws` from the page origin
//!
//! ```rust,ignore
//! use tubevault_transport::{activity_endpoint, ActivityChannel, ChannelConfig, WebSocketConnector};
//!
//! let url = activity_endpoint(&origin)?;
//! let channel = ActivityChannel::open(url, WebSocketConnector::default(), ChannelConfig::default(), |event| {
//!     println!("{:?}", event.kind());
//! });
//! // ...
//! channel.shutdown().await;
//! ```

pub mod channel;
pub mod endpoint;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{ActivityChannel, ChannelConfig, ChannelState};
pub use endpoint::{activity_endpoint, ACTIVITY_PATH};
pub use traits::{Connection, Connector, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector};
