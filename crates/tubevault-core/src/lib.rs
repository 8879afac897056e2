//! # tubevault-core
//!
//! Client-side routing and preferences for TubeVault.
//!
//! - **Route** - Static registry of pages and URL resolution
//! - **Router** - Keeps the current route in step with a history backend
//! - **History** - Navigation surface seam and an in-memory backend
//! - **Anomaly** - Debounced log of unresolvable URLs
//! - **Prefs** - Theme, filter and pinned-playlist persistence
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ pop  ┌─────────────┐ publish ┌──────────────┐
//! │   History   │─────▶│   Router    │────────▶│  watch rx's  │
//! └─────────────┘◀─────└─────────────┘         └──────────────┘
//!            push/replace    │
//!                            ▼
//!                     ┌─────────────┐  batch   ┌──────────────┐
//!                     │ AnomalyLog  │─────────▶│   LogSink    │
//!                     └─────────────┘          └──────────────┘
//! ```

pub mod anomaly;
pub mod history;
pub mod navlog;
pub mod prefs;
pub mod query;
pub mod route;
pub mod router;

pub use anomaly::{AnomalyLog, LogSink, LogSinkError, NullSink};
pub use history::{HistoryBackend, HistoryState, Location, MemoryHistory, NoopViewport, PopState, Viewport};
pub use navlog::{NavigationEntry, NavigationLog, Trigger};
pub use prefs::{FileStore, KeyValueStore, MemoryStore, PinnedPlaylist, Preferences, StorageError, Theme};
pub use query::{Params, QueryPatch};
pub use route::{AnomalyKind, RouteAnomaly, RouteDef, RouteDescriptor, RouteGroup, RouteRegistry};
pub use router::{HistoryMode, Router, RouterBuilder, RouterConfig, RouterSnapshot};
