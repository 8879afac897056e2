//! Activity watcher.
//!
//! Checks the backend, then follows the activity channel and logs every job
//! and queue event until Ctrl-C.

use crate::config::Config;
use crate::metrics;
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use tubevault_api::{ApiClient, ApiError};
use tubevault_protocol::{ActivityEvent, EventKind};
use tubevault_transport::{ActivityChannel, WebSocketConnector};

/// Check backend health, logging the outcome.
///
/// Returns `true` if the backend answered.
pub async fn check_health(client: &ApiClient) -> bool {
    match client.health().await {
        Ok(health) => {
            info!(
                status = %health.status,
                app = health.app.as_deref().unwrap_or("-"),
                version = health.version.as_deref().unwrap_or("-"),
                "Backend healthy"
            );
            true
        }
        Err(e) => {
            record_api_error(&e);
            warn!(base = %client.base_url(), error = %e, "Backend health check failed");
            false
        }
    }
}

pub fn record_api_error(error: &ApiError) {
    let kind = match error {
        ApiError::Unreachable(_) => "unreachable",
        ApiError::Http { .. } => "http",
        ApiError::Decode(_) => "decode",
        ApiError::InvalidUrl(_) | ApiError::Client(_) => "client",
    };
    metrics::record_api_error(kind);
}

/// Run the watcher until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration cannot produce a client or an
/// endpoint, or if the Ctrl-C handler cannot be installed.
pub async fn run(config: &Config) -> Result<()> {
    let client = ApiClient::new(config.api_config()?)?;
    check_health(&client).await;

    if !config.realtime.enabled {
        info!("Realtime channel disabled, nothing to watch");
        return Ok(());
    }

    let url = config.activity_url()?;
    let channel = ActivityChannel::open(
        url.as_str(),
        WebSocketConnector::default(),
        config.channel_config(),
        log_event,
    );

    let mut state = channel.state();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutting down...");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = %current, reconnects = channel.reconnects(), "Activity channel state");
                metrics::record_state(current);
                metrics::set_reconnects(channel.reconnects());
            }
        }
    }

    channel.shutdown().await;
    info!("Watcher stopped");
    Ok(())
}

fn text<'a>(value: Option<&'a Value>, key: &str) -> &'a str {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or("-")
}

fn log_event(event: ActivityEvent) {
    let kind = event.kind();
    metrics::record_event(kind.as_ref().map_or("unknown", EventKind::as_str));

    match kind {
        Some(EventKind::JobUpdate) => {
            let job = event.job();
            info!(
                id = %job.and_then(|j| j.get("id")).unwrap_or(&serde_json::Value::Null),
                job_type = text(job, "type"),
                status = text(job, "status"),
                progress = job.and_then(|j| j.get("progress")).and_then(serde_json::Value::as_f64).unwrap_or(0.0),
                title = text(job, "title"),
                "Job update"
            );
        }
        Some(EventKind::QueuePaused) => {
            info!(reason = text(Some(event.as_value()), "reason"), "Queue paused");
        }
        Some(EventKind::QueueResumed) => info!("Queue resumed"),
        Some(EventKind::Cleanup) => info!("Finished jobs cleaned up"),
        Some(EventKind::Other(other)) => debug!(kind = %other, payload = %event.as_value(), "Activity event"),
        None => debug!(payload = %event.as_value(), "Untyped activity event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_field() {
        let job = json!({"status": "running", "progress": 0.5});
        assert_eq!(text(Some(&job), "status"), "running");
        assert_eq!(text(Some(&job), "progress"), "-");
        assert_eq!(text(None, "status"), "-");
    }

    #[test]
    fn test_log_event_handles_all_shapes() {
        log_event(ActivityEvent::new(json!({"type": "job_update", "job": {"id": 1}})));
        log_event(ActivityEvent::new(json!({"type": "queue_paused", "reason": "disk"})));
        log_event(ActivityEvent::new(json!({"type": "something_new"})));
        log_event(ActivityEvent::new(json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = url::Url::parse(&format!("http://{addr}/")).unwrap();
        let client = ApiClient::new(tubevault_api::ApiConfig::new(base)).unwrap();
        assert!(!check_health(&client).await);
        assert!(!client.is_online());
    }
}
