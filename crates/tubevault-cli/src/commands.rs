//! One-shot subcommands: route inspection and preferences.

use crate::config::Config;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;
use tubevault_api::{ApiClient, HttpLogSink};
use tubevault_core::{FileStore, MemoryHistory, Preferences, RouteRegistry, Router, Theme};

/// Print the route table.
pub fn routes() {
    let registry = RouteRegistry::tubevault();
    println!("{:<14} {:<22} {:<8} {:<26} DESCRIPTION", "PAGE", "PATH", "GROUP", "PARAMS");
    for row in registry.table() {
        println!(
            "{:<14} {:<22} {:<8} {:<26} {}",
            row.key,
            row.path,
            format!("{:?}", row.group),
            row.params,
            row.description
        );
    }
}

/// Resolve a URL and print the resulting route as JSON.
///
/// With `report`, routing anomalies are shipped to the backend before
/// returning.
///
/// # Errors
///
/// Returns an error if the API client cannot be built.
pub async fn resolve(config: &Config, url: &str, report: bool) -> Result<()> {
    let history = Arc::new(MemoryHistory::new(url));
    let mut builder = Router::builder(history).config(config.router_config());
    if report {
        let client = ApiClient::new(config.api_config()?)?;
        builder = builder.log_sink(Arc::new(HttpLogSink::new(client)));
    }
    let router = builder.build();

    println!("{}", serde_json::to_string_pretty(&router.current())?);
    for entry in router.anomalies().pending_entries() {
        eprintln!("warning: {}", entry.message);
    }

    if report {
        router.anomalies().flush().await;
    }
    Ok(())
}

fn preferences(config: &Config) -> Preferences<FileStore> {
    let path = config.storage_path();
    debug!(path = %path.display(), "Using preference file");
    Preferences::new(FileStore::new(path))
}

/// Show or change the theme. `value` is `dark`, `light` or `toggle`.
///
/// # Errors
///
/// Returns an error for unknown values.
pub fn theme(config: &Config, value: Option<&str>) -> Result<()> {
    let prefs = preferences(config);
    let theme = match value {
        None => prefs.theme(),
        Some("toggle") => prefs.toggle_theme(),
        Some("dark") => {
            prefs.set_theme(Theme::Dark);
            Theme::Dark
        }
        Some("light") => {
            prefs.set_theme(Theme::Light);
            Theme::Light
        }
        Some(other) => bail!("Unknown theme `{other}` (expected dark, light or toggle)"),
    };
    println!("{theme}");
    Ok(())
}

/// Pin a playlist, or show the pinned one.
pub fn pin(config: &Config, playlist: Option<(i64, String)>) {
    let prefs = preferences(config);
    if let Some((id, name)) = playlist {
        prefs.pin_playlist(id, name);
    }
    match prefs.pinned_playlist() {
        Some(pinned) => println!("{} {}", pinned.id, pinned.name),
        None => println!("no playlist pinned"),
    }
}

pub fn unpin(config: &Config) {
    preferences(config).unpin_playlist();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in_tmp(name: &str) -> Config {
        let mut config = Config::default();
        let path = std::env::temp_dir().join(format!("tubevault-cli-{}-{name}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        config.storage.path = path.display().to_string();
        config
    }

    #[test]
    fn test_theme_command() {
        let config = config_in_tmp("theme");
        theme(&config, Some("light")).unwrap();
        assert_eq!(preferences(&config).theme(), Theme::Light);
        theme(&config, Some("toggle")).unwrap();
        assert_eq!(preferences(&config).theme(), Theme::Dark);
        assert!(theme(&config, Some("neon")).is_err());
        let _ = std::fs::remove_file(config.storage_path());
    }

    #[test]
    fn test_pin_and_unpin() {
        let config = config_in_tmp("pin");
        pin(&config, Some((4, "Later".into())));
        assert_eq!(preferences(&config).pinned_playlist().unwrap().id, 4);
        unpin(&config);
        assert!(preferences(&config).pinned_playlist().is_none());
        let _ = std::fs::remove_file(config.storage_path());
    }

    #[tokio::test]
    async fn test_resolve_without_report() {
        let config = Config::default();
        resolve(&config, "/watch/abc?t=5", false).await.unwrap();
        resolve(&config, "/bogus", false).await.unwrap();
    }
}
