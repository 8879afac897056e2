//! Route registry and URL resolution.
//!
//! The registry is a static table of page keys. A URL resolves to a page when
//! its first path segment equals a registered key; pages that require an id
//! take it from the second segment.

use crate::query::{build_url, parse_query, Params};
use serde::Serialize;
use std::fmt;

/// Page the router falls back to when a URL does not resolve.
pub const FALLBACK_PAGE: &str = "dashboard";

/// Navigation group of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteGroup {
    /// Primary sidebar entries.
    Main,
    /// System pages (stats, settings).
    System,
    /// Reachable only by link.
    Hidden,
}

/// A registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDef {
    pub key: &'static str,
    /// Canonical path without query.
    pub path: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub group: RouteGroup,
    /// Whether the route expects a trailing `/:id` segment.
    pub has_id: bool,
    /// Display name of the id segment (e.g. `videoId`).
    pub id_param: Option<&'static str>,
    /// Query parameters the page understands. Not enforced when parsing.
    pub query_params: &'static [&'static str],
    /// Sidebar badge key.
    pub badge: Option<&'static str>,
    pub description: &'static str,
}

impl RouteDef {
    /// Path pattern for display, e.g. `/watch/:videoId`.
    #[must_use]
    pub fn pattern(&self) -> String {
        if self.has_id {
            format!("{}/:{}", self.path, self.id_param.unwrap_or("id"))
        } else {
            self.path.to_string()
        }
    }

    /// Check whether the page understands a query parameter.
    #[must_use]
    pub fn recognizes(&self, param: &str) -> bool {
        self.query_params.contains(&param)
    }
}

macro_rules! route {
    (@has) => { false };
    (@has $id:literal) => { true };
    (@id) => { None };
    (@id $id:literal) => { Some($id) };
    ($key:literal, $path:literal, $label:literal, $icon:literal, $group:ident,
     $(id: $id:literal,)? params: [$($p:literal),* $(,)?], badge: $badge:expr, $desc:literal) => {
        RouteDef {
            key: $key,
            path: $path,
            label: $label,
            icon: $icon,
            group: RouteGroup::$group,
            has_id: route!(@has $($id)?),
            id_param: route!(@id $($id)?),
            query_params: &[$($p),*],
            badge: $badge,
            description: $desc,
        }
    };
}

static TUBEVAULT_ROUTES: &[RouteDef] = &[
    route!("dashboard", "/", "Dashboard", "fa-solid fa-house", Main,
        params: [], badge: None, "Start page with overview"),
    route!("feed", "/feed", "Feed", "fa-solid fa-rss", Main,
        params: ["tab", "types", "channels", "q", "dmin", "dmax"],
        badge: Some("new_feed"), "RSS feed entries with filters"),
    route!("subscriptions", "/subscriptions", "Channels", "fa-solid fa-tv", Main,
        params: ["filter", "q"], badge: Some("subscriptions"),
        "Manage channel subscriptions"),
    route!("library", "/library", "Library", "fa-solid fa-photo-film", Main,
        params: ["sort", "order", "types", "channels", "categories", "tags", "q"],
        badge: Some("videos"), "Downloaded videos with filters"),
    route!("downloads", "/downloads", "Jobs", "fa-solid fa-bolt", Main,
        params: [], badge: Some("active_downloads"),
        "Job queue (downloads, scans, tasks)"),
    route!("playlists", "/playlists", "Playlists", "fa-solid fa-list-ul", Main,
        params: ["open"], badge: Some("playlists"), "Playlist overview"),
    route!("favorites", "/favorites", "Favorites", "fa-solid fa-heart", Main,
        params: ["list"], badge: Some("favorites"), "Favorite lists"),
    route!("history", "/history", "History", "fa-solid fa-clock-rotate-left", Main,
        params: ["types", "channels", "search"], badge: Some("history"),
        "Playback history"),
    route!("categories", "/categories", "Categories", "fa-solid fa-folder", Main,
        params: [], badge: Some("categories"), "Category management"),
    route!("archives", "/archives", "Archive", "fa-solid fa-box-archive", Main,
        params: ["sort", "order", "type", "channel", "category", "tag", "q", "page"],
        badge: Some("archives"), "Archived videos"),
    route!("own-videos", "/own-videos", "Own videos", "fa-solid fa-film", Main,
        params: ["status", "folder", "q"], badge: Some("own_videos"),
        "Local video files"),
    route!("stats", "/stats", "Statistics", "fa-solid fa-chart-simple", System,
        params: [], badge: None, "System statistics"),
    route!("settings", "/settings", "Settings", "fa-solid fa-gear", System,
        params: ["section"], badge: None, "Application settings"),
    route!("watch", "/watch", "Video", "fa-solid fa-play", Hidden,
        id: "videoId", params: ["t", "tab", "pl", "idx", "lyrics"], badge: None,
        "Play a video"),
    route!("channel", "/channel", "Channel", "fa-solid fa-tv", Hidden,
        id: "channelId", params: ["source", "type", "sort", "q", "tab"], badge: None,
        "Channel detail page"),
    route!("playlist", "/playlist", "Playlist", "fa-solid fa-list-ul", Hidden,
        id: "playlistId", params: ["playing"], badge: None, "Playlist detail"),
    route!("category", "/category", "Category", "fa-solid fa-folder", Hidden,
        id: "categoryId", params: ["sort", "page"], badge: None,
        "Videos of one category"),
    route!("search", "/search", "Search", "fa-solid fa-magnifying-glass", Hidden,
        params: ["q", "scope"], badge: None, "Global search"),
];

/// The single source of truth for "where the app is".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    /// Registered page key.
    pub page: String,
    /// Trailing id segment, for pages that take one.
    pub id: Option<String>,
    /// Query parameters.
    pub params: Params,
    /// Pathname without query.
    pub path: String,
    /// Pathname plus query string as navigated.
    pub full_url: String,
    /// Set when the descriptor was produced by fallback normalization.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl RouteDescriptor {
    /// The fallback descriptor: fallback page, no id, no params, at `/`.
    #[must_use]
    pub fn fallback(page: &str) -> Self {
        Self {
            page: page.to_string(),
            id: None,
            params: Params::new(),
            path: "/".to_string(),
            full_url: "/".to_string(),
            fallback: true,
        }
    }

    /// The id, but only while `page` is current.
    #[must_use]
    pub fn id_for(&self, page: &str) -> Option<&str> {
        if self.page == page {
            self.id.as_deref()
        } else {
            None
        }
    }

    /// Get a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Kind of routing anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// First path segment is not a registered page.
    UnknownRoute,
    /// Page requires an id segment and none was present.
    MissingId,
}

impl AnomalyKind {
    /// Wire name of the anomaly.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UnknownRoute => "unknown_route",
            AnomalyKind::MissingId => "missing_id",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL that did not resolve to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAnomaly {
    pub kind: AnomalyKind,
    /// The attempted URL (path plus query).
    pub url: String,
    /// First path segment.
    pub segment: String,
}

impl RouteAnomaly {
    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            AnomalyKind::UnknownRoute => format!("Unknown route: /{}", self.segment),
            AnomalyKind::MissingId => {
                format!("Route /{} expects an id, none found", self.segment)
            }
        }
    }
}

/// A printable registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRow {
    pub key: &'static str,
    pub path: String,
    pub label: &'static str,
    pub group: RouteGroup,
    pub params: String,
    pub description: &'static str,
}

/// A static table of routes.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    routes: &'static [RouteDef],
    fallback: &'static str,
}

impl RouteRegistry {
    /// Create a registry from a route table.
    ///
    /// # Panics
    ///
    /// Panics if `fallback` is not a key in `routes`.
    #[must_use]
    pub fn new(routes: &'static [RouteDef], fallback: &'static str) -> Self {
        assert!(
            routes.iter().any(|r| r.key == fallback),
            "fallback route {fallback:?} is not registered"
        );
        Self { routes, fallback }
    }

    /// The TubeVault route table.
    #[must_use]
    pub fn tubevault() -> Self {
        Self::new(TUBEVAULT_ROUTES, FALLBACK_PAGE)
    }

    /// Look up a route by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RouteDef> {
        self.routes.iter().find(|r| r.key == key)
    }

    /// Check if a key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The fallback page key.
    #[must_use]
    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    /// All routes in declaration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteDef] {
        self.routes
    }

    /// Sidebar routes.
    #[must_use]
    pub fn main_routes(&self) -> Vec<&RouteDef> {
        self.by_group(RouteGroup::Main)
    }

    /// System routes.
    #[must_use]
    pub fn system_routes(&self) -> Vec<&RouteDef> {
        self.by_group(RouteGroup::System)
    }

    fn by_group(&self, group: RouteGroup) -> Vec<&RouteDef> {
        self.routes.iter().filter(|r| r.group == group).collect()
    }

    /// Resolve the page key of a pathname.
    ///
    /// Returns the fallback key for `/` and `None` for unregistered paths.
    #[must_use]
    pub fn resolve_key(&self, pathname: &str) -> Option<&'static str> {
        match pathname.split('/').find(|s| !s.is_empty()) {
            None => Some(self.fallback),
            Some(first) => self.get(first).map(|r| r.key),
        }
    }

    /// Resolve a pathname and query string to a descriptor.
    ///
    /// # Errors
    ///
    /// Returns the anomaly when the path names no registered page, or names
    /// a page that requires an id without one.
    pub fn resolve(&self, pathname: &str, search: &str) -> Result<RouteDescriptor, RouteAnomaly> {
        let mut segments = pathname.split('/').filter(|s| !s.is_empty());
        let params = parse_query(search);
        let full_url = format!("{pathname}{search}");

        let Some(first) = segments.next() else {
            return Ok(RouteDescriptor {
                page: self.fallback.to_string(),
                id: None,
                params,
                path: "/".to_string(),
                full_url,
                fallback: false,
            });
        };

        let Some(def) = self.get(first) else {
            return Err(RouteAnomaly {
                kind: AnomalyKind::UnknownRoute,
                url: full_url,
                segment: first.to_string(),
            });
        };

        let id = segments.next().map(str::to_string);
        if def.has_id && id.is_none() {
            return Err(RouteAnomaly {
                kind: AnomalyKind::MissingId,
                url: full_url,
                segment: first.to_string(),
            });
        }

        Ok(RouteDescriptor {
            page: def.key.to_string(),
            id,
            params,
            path: pathname.to_string(),
            full_url,
            fallback: false,
        })
    }

    /// Build the URL of a route. Unknown keys yield `/`.
    #[must_use]
    pub fn build_route_url(&self, key: &str, id: Option<&str>, params: &Params) -> String {
        let Some(def) = self.get(key) else {
            return "/".to_string();
        };
        let path = match id {
            Some(id) if !id.is_empty() => format!("{}/{}", def.path.trim_end_matches('/'), id),
            _ => def.path.to_string(),
        };
        build_url(&path, params)
    }

    /// Registry table for diagnostics.
    #[must_use]
    pub fn table(&self) -> Vec<RouteRow> {
        self.routes
            .iter()
            .map(|r| RouteRow {
                key: r.key,
                path: r.pattern(),
                label: r.label,
                group: r.group,
                params: if r.query_params.is_empty() {
                    "-".to_string()
                } else {
                    r.query_params.join(", ")
                },
                description: r.description,
            })
            .collect()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::tubevault()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_groups() {
        let registry = RouteRegistry::tubevault();
        let main: Vec<_> = registry.main_routes().iter().map(|r| r.key).collect();
        assert_eq!(main.first(), Some(&"dashboard"));
        assert!(main.contains(&"own-videos"));
        assert!(!main.contains(&"watch"));

        let system: Vec<_> = registry.system_routes().iter().map(|r| r.key).collect();
        assert_eq!(system, vec!["stats", "settings"]);
    }

    #[test]
    fn test_resolve_root() {
        let registry = RouteRegistry::tubevault();
        let route = registry.resolve("/", "?tab=later").unwrap();
        assert_eq!(route.page, "dashboard");
        assert_eq!(route.path, "/");
        assert_eq!(route.full_url, "/?tab=later");
        assert_eq!(route.param("tab"), Some("later"));
        assert!(!route.fallback);
    }

    #[test]
    fn test_resolve_with_id() {
        let registry = RouteRegistry::tubevault();
        let route = registry.resolve("/watch/abc123", "?t=120").unwrap();
        assert_eq!(route.page, "watch");
        assert_eq!(route.id.as_deref(), Some("abc123"));
        assert_eq!(route.id_for("watch"), Some("abc123"));
        assert_eq!(route.id_for("channel"), None);
        assert_eq!(route.full_url, "/watch/abc123?t=120");
    }

    #[test]
    fn test_resolve_unknown_route() {
        let registry = RouteRegistry::tubevault();
        let err = registry.resolve("/bogus/xyz", "").unwrap_err();
        assert_eq!(err.kind, AnomalyKind::UnknownRoute);
        assert_eq!(err.url, "/bogus/xyz");
        assert_eq!(err.message(), "Unknown route: /bogus");
    }

    #[test]
    fn test_resolve_missing_id_for_every_id_route() {
        let registry = RouteRegistry::tubevault();
        for def in registry.routes().iter().filter(|r| r.has_id) {
            let err = registry.resolve(def.path, "").unwrap_err();
            assert_eq!(err.kind, AnomalyKind::MissingId, "route {}", def.key);
        }
    }

    #[test]
    fn test_resolve_is_exact_match() {
        let registry = RouteRegistry::tubevault();
        assert!(registry.resolve("/Library", "").is_err());
        assert!(registry.resolve("/libraryx", "").is_err());
    }

    #[test]
    fn test_resolve_key() {
        let registry = RouteRegistry::tubevault();
        assert_eq!(registry.resolve_key("/"), Some("dashboard"));
        assert_eq!(registry.resolve_key("/watch/abc"), Some("watch"));
        assert_eq!(registry.resolve_key("/nope"), None);
    }

    #[test]
    fn test_build_route_url() {
        let registry = RouteRegistry::tubevault();
        let mut params = Params::new();
        params.insert("t".into(), "120".into());
        assert_eq!(
            registry.build_route_url("watch", Some("abc"), &params),
            "/watch/abc?t=120"
        );
        assert_eq!(registry.build_route_url("library", None, &Params::new()), "/library");
        assert_eq!(registry.build_route_url("nope", None, &params), "/");
    }

    #[test]
    fn test_build_then_resolve_round_trips() {
        let registry = RouteRegistry::tubevault();
        for def in registry.routes().iter().filter(|r| r.path != "/") {
            let id = def.has_id.then_some("id-42");
            let mut params = Params::new();
            params.insert("q".into(), "two words".into());
            params.insert("sort".into(), "title".into());

            let url = registry.build_route_url(def.key, id, &params);
            let (path, search) = url.split_once('?').unwrap();
            let route = registry.resolve(path, &format!("?{search}")).unwrap();

            assert_eq!(route.page, def.key);
            assert_eq!(route.id.as_deref(), id);
            assert_eq!(route.params, params);
        }
    }

    #[test]
    fn test_table() {
        let registry = RouteRegistry::tubevault();
        let table = registry.table();
        let watch = table.iter().find(|r| r.key == "watch").unwrap();
        assert_eq!(watch.path, "/watch/:videoId");
        let stats = table.iter().find(|r| r.key == "stats").unwrap();
        assert_eq!(stats.params, "-");
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_unknown_fallback_panics() {
        let _ = RouteRegistry::new(TUBEVAULT_ROUTES, "nowhere");
    }
}
