//! # tubevault-api
//!
//! REST client for the TubeVault backend.
//!
//! - **Client** - JSON requests with an unreachable/HTTP error split and a
//!   connection-status signal
//! - **Log sink** - Delivers routing anomaly batches to the backend
//!
//! ```rust,ignore
//! use tubevault_api::{api_base, ApiClient, ApiConfig};
//!
//! let client = ApiClient::new(ApiConfig::new(api_base(&origin)?))?;
//! let health = client.health().await?;
//! ```

pub mod client;
pub mod logsink;

pub use client::{api_base, ApiClient, ApiConfig, ApiError, HealthStatus};
pub use logsink::HttpLogSink;
