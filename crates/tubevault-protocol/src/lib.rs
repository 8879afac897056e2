//! # tubevault-protocol
//!
//! Wire types shared by the TubeVault client crates.
//!
//! The backend speaks two small protocols to the client:
//!
//! - **Activity channel** - a WebSocket carrying JSON job/activity events,
//!   kept alive by a literal `ping` / `pong` text exchange
//! - **Frontend log endpoint** - an HTTP endpoint accepting batches of
//!   structured [`LogEntry`] values
//!
//! ## Example
//!
//! ```rust
//! use tubevault_protocol::{codec, Inbound};
//!
//! let inbound = codec::decode(r#"{"type":"job_update","job":{"id":7}}"#).unwrap();
//! match inbound {
//!     Inbound::Event(event) => assert_eq!(event.kind_str(), Some("job_update")),
//!     Inbound::Pong => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod events;
pub mod log;

pub use codec::{decode, Inbound, ProtocolError, PING, PONG};
pub use events::{ActivityEvent, EventKind};
pub use log::{LogEntry, LogLevel};
