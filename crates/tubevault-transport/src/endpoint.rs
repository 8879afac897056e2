//! Activity endpoint derivation.

use crate::traits::TransportError;
use url::Url;

/// Path of the backend's job/activity WebSocket.
pub const ACTIVITY_PATH: &str = "/api/jobs/ws";

/// Derive the activity WebSocket URL from the page origin.
///
/// `http` maps to `ws` and `https` to `wss`; host and port are kept.
///
/// # Errors
///
/// Returns [`TransportError::InvalidUrl`] for origins that are not HTTP(S).
pub fn activity_endpoint(origin: &Url) -> Result<Url, TransportError> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme `{other}` in {origin}"
            )))
        }
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidUrl(origin.to_string()))?;
    url.set_path(ACTIVITY_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
