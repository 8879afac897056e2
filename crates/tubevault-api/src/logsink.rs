//! Log sink posting to the backend's frontend-log endpoint.

use crate::client::ApiClient;
use async_trait::async_trait;
use tracing::trace;
use tubevault_core::{LogSink, LogSinkError};
use tubevault_protocol::LogEntry;

/// Ships log batches to `POST /api/system/logs/frontend`.
#[derive(Debug, Clone)]
pub struct HttpLogSink {
    client: ApiClient,
}

impl HttpLogSink {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn send_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogSinkError> {
        let count = entries.len();
        self.client
            .send_frontend_logs(&entries)
            .await
            .map_err(|e| LogSinkError::Delivery(e.to_string()))?;
        trace!(count, "Delivered log batch");
        Ok(())
    }
}
