//! TubeVault REST API client.
//!
//! Failures are split in two: the backend could not be reached at all
//! ([`ApiError::Unreachable`]), or it answered with a non-success status
//! ([`ApiError::Http`]). Only the first flips the connection status to
//! offline; any successful response flips it back.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tubevault_protocol::LogEntry;
use url::{form_urlencoded, Url};

/// Port the backend listens on when addressed directly.
pub const BACKEND_PORT: u16 = 8031;

/// Port of the reverse proxy serving UI and API together.
pub const PROXY_PORT: u16 = 8032;

/// Port of the frontend dev server, which proxies the API.
pub const DEV_SERVER_PORT: u16 = 5173;

/// Path accepting batches of frontend log entries.
pub const FRONTEND_LOGS_PATH: &str = "/api/system/logs/frontend";

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got an answer.
    #[error("Backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Check whether the backend could not be reached.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Unreachable(_))
    }

    /// HTTP status of the response, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Derive the API base URL from the page origin.
///
/// Origins served through the proxy, the dev server or a default port talk
/// to the API on the same origin. Anything else addresses the backend
/// directly on [`BACKEND_PORT`] of the same host.
///
/// # Errors
///
/// Returns [`ApiError::InvalidUrl`] if the origin has no host.
pub fn api_base(origin: &Url) -> Result<Url, ApiError> {
    if !origin.has_host() {
        return Err(ApiError::InvalidUrl(format!("origin without host: {origin}")));
    }

    let mut base = origin.clone();
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);

    match origin.port() {
        None | Some(PROXY_PORT) | Some(DEV_SERVER_PORT) => {}
        Some(_) => base
            .set_port(Some(BACKEND_PORT))
            .map_err(|()| ApiError::InvalidUrl(origin.to_string()))?,
    }
    Ok(base)
}

/// Append `params` to `path` as a query string, skipping empty values.
fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
        query.append_pair(key, value);
        any = true;
    }
    if any {
        format!("{path}?{}", query.finish())
    } else {
        path.to_string()
    }
}

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API base URL, usually from [`api_base`].
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Backend health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// TubeVault REST API client.
///
/// Cloning is cheap; clones share the connection pool and the connection
/// status.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    online: Arc<watch::Sender<bool>>,
}

impl ApiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Client)?;

        info!(base = %config.base_url, "Created API client");

        let (online, _) = watch::channel(true);
        Ok(Self {
            client,
            base: config.base_url,
            online: Arc::new(online),
        })
    }

    /// API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Subscribe to connection status changes (`true` = online).
    #[must_use]
    pub fn connection_status(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Whether the last request reached the backend.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!(base = %self.base, "Backend reachable again");
            } else {
                warn!(base = %self.base, "Backend unreachable");
            }
        }
    }

    /// Send a request and return the JSON response body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`]. No request is retried.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))?;

        debug!(%method, %url, "API request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.set_online(false);
                return Err(ApiError::Unreachable(e));
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.set_online(false);
                return Err(ApiError::Unreachable(e));
            }
        };

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| match v.get("detail") {
                    Some(Value::String(s)) if s.is_empty() => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_string()),
                })
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

            debug!(status = status.as_u16(), %message, "API error response");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        self.set_online(true);
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.request(Method::POST, path, body).await
    }

    /// Backend health.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get("/api/system/health").await
    }

    /// List videos.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn videos(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.get(&with_query("/api/videos", params)).await
    }

    /// A single video.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn video(&self, id: &str) -> Result<Value, ApiError> {
        self.get(&format!("/api/videos/{id}")).await
    }

    /// List jobs.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn jobs(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.get(&with_query("/api/jobs", params)).await
    }

    pub async fn job(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/api/jobs/{id}")).await
    }

    pub async fn cancel_job(&self, id: i64) -> Result<Value, ApiError> {
        self.post(&format!("/api/jobs/{id}/cancel"), None).await
    }

    pub async fn queue_status(&self) -> Result<Value, ApiError> {
        self.get("/api/jobs/queue/status").await
    }

    /// Pause the job queue, recording `reason`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn pause_queue(&self, reason: &str) -> Result<Value, ApiError> {
        self.post(&with_query("/api/jobs/queue/pause", &[("reason", reason)]), None)
            .await
    }

    pub async fn resume_queue(&self) -> Result<Value, ApiError> {
        self.post("/api/jobs/queue/resume", None).await
    }

    pub async fn settings(&self) -> Result<Value, ApiError> {
        self.get("/api/settings").await
    }

    /// Change one setting.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn update_setting(&self, key: &str, value: Value) -> Result<Value, ApiError> {
        let body = json!({ "value": value });
        self.request(Method::PUT, &format!("/api/settings/{key}"), Some(&body))
            .await
    }

    /// Sidebar badge counters.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn badges(&self) -> Result<Value, ApiError> {
        self.get("/api/system/badges").await
    }

    pub async fn stats(&self) -> Result<Value, ApiError> {
        self.get("/api/system/stats").await
    }

    pub async fn playlists(&self) -> Result<Value, ApiError> {
        self.get("/api/playlists").await
    }

    pub async fn categories(&self) -> Result<Value, ApiError> {
        self.get("/api/categories").await
    }

    /// Ship a batch of frontend log entries.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn send_frontend_logs(&self, entries: &[LogEntry]) -> Result<Value, ApiError> {
        let body = serde_json::to_value(entries)?;
        self.post(FRONTEND_LOGS_PATH, Some(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(origin: &str) -> String {
        api_base(&Url::parse(origin).unwrap()).unwrap().to_string()
    }

    #[test]
    fn test_api_base_same_origin() {
        assert_eq!(base("http://nas.local:8032/library?x=1"), "http://nas.local:8032/");
        assert_eq!(base("http://localhost:5173/watch/abc"), "http://localhost:5173/");
        assert_eq!(base("https://vault.example.org/feed"), "https://vault.example.org/");
        assert_eq!(base("http://nas.local:80/"), "http://nas.local/");
    }

    #[test]
    fn test_api_base_direct_backend() {
        assert_eq!(base("http://192.168.1.20:3000/"), "http://192.168.1.20:8031/");
        assert_eq!(base("https://nas.local:8443/stats"), "https://nas.local:8031/");
    }

    #[test]
    fn test_api_base_without_host() {
        let origin = Url::parse("data:text/plain,hello").unwrap();
        assert!(matches!(api_base(&origin), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/api/videos", &[]), "/api/videos");
        assert_eq!(with_query("/api/videos", &[("q", "")]), "/api/videos");
        assert_eq!(
            with_query("/api/videos", &[("q", "lo fi"), ("sort", "title")]),
            "/api/videos?q=lo+fi&sort=title"
        );
    }

    #[test]
    fn test_error_accessors() {
        let err = ApiError::Http {
            status: 404,
            message: "Video not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_unreachable());
        assert_eq!(err.to_string(), "HTTP 404: Video not found");
    }
}
