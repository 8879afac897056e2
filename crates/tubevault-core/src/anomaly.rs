//! Routing anomaly log.
//!
//! Anomalies are buffered and shipped to a [`LogSink`] in batches. The first
//! anomaly after an idle period schedules a flush; anomalies arriving before
//! that flush fires join the same batch. Delivery is best-effort: failures
//! are logged at debug level and the batch is dropped.

use crate::route::RouteAnomaly;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};
use tubevault_protocol::{LogEntry, LogLevel};

/// Delay between the first buffered anomaly and the flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(5);

/// Log category used for routing anomalies.
pub const ROUTER_CATEGORY: &str = "router";

/// Log sink errors.
#[derive(Debug, Error)]
pub enum LogSinkError {
    /// The batch could not be delivered.
    #[error("Log delivery failed: {0}")]
    Delivery(String),
}

/// Destination for batches of log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a batch, oldest entry first.
    async fn send_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogSinkError>;
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl LogSink for NullSink {
    async fn send_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogSinkError> {
        trace!(count = entries.len(), "Discarding log batch");
        Ok(())
    }
}

struct Inner {
    buffer: Mutex<Vec<LogEntry>>,
    flush_scheduled: AtomicBool,
    sink: Arc<dyn LogSink>,
    delay: Duration,
}

impl Inner {
    async fn flush(&self) {
        let entries = std::mem::take(&mut *self.buffer.lock());
        if entries.is_empty() {
            return;
        }
        let count = entries.len();
        match self.sink.send_batch(entries).await {
            Ok(()) => debug!(count, "Flushed routing anomalies"),
            Err(e) => debug!(count, error = %e, "Dropped routing anomaly batch"),
        }
    }
}

/// Buffered, debounced anomaly log.
#[derive(Clone)]
pub struct AnomalyLog {
    inner: Arc<Inner>,
}

impl AnomalyLog {
    /// Create a log flushing to `sink` after the default delay.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::with_delay(sink, DEFAULT_FLUSH_DELAY)
    }

    /// Create a log flushing to `sink` after `delay`.
    #[must_use]
    pub fn with_delay(sink: Arc<dyn LogSink>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(Vec::new()),
                flush_scheduled: AtomicBool::new(false),
                sink,
                delay,
            }),
        }
    }

    /// Record an anomaly and schedule a flush if none is pending.
    pub fn record(&self, anomaly: &RouteAnomaly) {
        let message = anomaly.message();
        warn!(kind = %anomaly.kind, url = %anomaly.url, "{message}");

        let entry = LogEntry::new(
            LogLevel::Warn,
            ROUTER_CATEGORY,
            anomaly.kind.as_str(),
            anomaly.url.clone(),
            message,
        );
        self.inner.buffer.lock().push(entry);
        self.schedule_flush();
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Copy of the buffered entries.
    #[must_use]
    pub fn pending_entries(&self) -> Vec<LogEntry> {
        self.inner.buffer.lock().clone()
    }

    /// Check whether a flush is scheduled.
    #[must_use]
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.flush_scheduled.load(Ordering::SeqCst)
    }

    /// Drain the buffer to the sink now.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    fn schedule_flush(&self) {
        if self.inner.flush_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(inner.delay).await;
                    inner.flush_scheduled.store(false, Ordering::SeqCst);
                    inner.flush().await;
                });
            }
            Err(_) => {
                self.inner.flush_scheduled.store(false, Ordering::SeqCst);
                debug!("No async runtime, anomaly stays buffered");
            }
        }
    }
}

impl std::fmt::Debug for AnomalyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyLog")
            .field("pending", &self.pending())
            .field("flush_scheduled", &self.is_flush_scheduled())
            .field("delay", &self.inner.delay)
            .finish()
    }
}
