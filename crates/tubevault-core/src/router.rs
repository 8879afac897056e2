//! URL router for TubeVault.
//!
//! The router keeps one [`RouteDescriptor`] in step with the navigation
//! surface and is the only sanctioned way to change either. The live URL is
//! authoritative: pop events are handled by re-parsing the backend's
//! location, never by trusting the stored [`HistoryState`].
//!
//! Writes are serialized under a single lock, and every write publishes the
//! full descriptor plus three projections (page, id, params) through
//! `watch` channels. A projection only notifies when its facet changed.

use crate::anomaly::{AnomalyLog, LogSink, NullSink, DEFAULT_FLUSH_DELAY};
use crate::history::{HistoryBackend, HistoryState, NoopViewport, PopState, Viewport};
use crate::navlog::{NavigationEntry, NavigationLog, Trigger, DEFAULT_NAVIGATION_LOG_CAPACITY};
use crate::query::{build_url, parse_query, split_url, Params, QueryPatch};
use crate::route::{RouteDescriptor, RouteRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

/// Parameter values that clear a key in [`Router::update_params`].
const CLEARING_VALUES: &[&str] = &["", "all"];

/// Query parameter holding the pagination index.
const PAGE_PARAM: &str = "page";

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Number of navigation entries kept for diagnostics.
    pub navigation_log_capacity: usize,
    /// Delay before buffered routing anomalies are flushed.
    pub log_flush_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            navigation_log_capacity: DEFAULT_NAVIGATION_LOG_CAPACITY,
            log_flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

/// How a navigation affects the history stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Push a new entry.
    #[default]
    Push,
    /// Replace the current entry.
    Replace,
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    history: Arc<dyn HistoryBackend>,
    registry: RouteRegistry,
    viewport: Arc<dyn Viewport>,
    sink: Arc<dyn LogSink>,
    config: RouterConfig,
}

impl RouterBuilder {
    /// Use a custom route table.
    #[must_use]
    pub fn registry(mut self, registry: RouteRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Scroll this viewport to the top on page changes.
    #[must_use]
    pub fn viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    /// Ship routing anomalies to this sink.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the router, parsing the backend's current location.
    #[must_use]
    pub fn build(self) -> Router {
        info!("Creating router with config: {:?}", self.config);

        let anomalies = AnomalyLog::with_delay(self.sink, self.config.log_flush_delay);
        let location = self.history.location();
        let initial = resolve_or_fallback(
            &self.registry,
            &anomalies,
            &location.pathname,
            &location.search,
        );

        let (page_tx, _) = watch::channel(initial.page.clone());
        let (id_tx, _) = watch::channel(initial.id.clone());
        let (params_tx, _) = watch::channel(initial.params.clone());
        let (route_tx, _) = watch::channel(initial);

        Router {
            registry: self.registry,
            history: self.history,
            viewport: self.viewport,
            anomalies,
            navlog: Mutex::new(NavigationLog::with_capacity(
                self.config.navigation_log_capacity,
            )),
            route_tx,
            page_tx,
            id_tx,
            params_tx,
        }
    }
}

fn resolve_or_fallback(
    registry: &RouteRegistry,
    anomalies: &AnomalyLog,
    pathname: &str,
    search: &str,
) -> RouteDescriptor {
    match registry.resolve(pathname, search) {
        Ok(route) => route,
        Err(anomaly) => {
            anomalies.record(&anomaly);
            RouteDescriptor::fallback(registry.fallback())
        }
    }
}

/// Diagnostic snapshot of the router.
#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub current: RouteDescriptor,
    pub history: Vec<NavigationEntry>,
    pub pending_anomalies: usize,
}

/// The URL router.
pub struct Router {
    registry: RouteRegistry,
    history: Arc<dyn HistoryBackend>,
    viewport: Arc<dyn Viewport>,
    anomalies: AnomalyLog,
    /// Navigation log; its lock also serializes all descriptor writes.
    navlog: Mutex<NavigationLog>,
    route_tx: watch::Sender<RouteDescriptor>,
    page_tx: watch::Sender<String>,
    id_tx: watch::Sender<Option<String>>,
    params_tx: watch::Sender<Params>,
}

impl Router {
    /// Start building a router over a history backend.
    #[must_use]
    pub fn builder(history: Arc<dyn HistoryBackend>) -> RouterBuilder {
        RouterBuilder {
            history,
            registry: RouteRegistry::tubevault(),
            viewport: Arc::new(NoopViewport),
            sink: Arc::new(NullSink),
            config: RouterConfig::default(),
        }
    }

    /// Create a router with the TubeVault routes and default settings.
    #[must_use]
    pub fn new(history: Arc<dyn HistoryBackend>) -> Self {
        Self::builder(history).build()
    }

    /// Parse a pathname and query string.
    ///
    /// Unresolvable URLs are recorded as anomalies and yield the fallback
    /// descriptor.
    pub fn parse(&self, pathname: &str, search: &str) -> RouteDescriptor {
        resolve_or_fallback(&self.registry, &self.anomalies, pathname, search)
    }

    /// Navigate to `path`, merging `params` over any query embedded in it.
    ///
    /// Returns the descriptor that became current.
    pub fn navigate(&self, path: &str, params: QueryPatch, mode: HistoryMode) -> RouteDescriptor {
        let mut navlog = self.navlog.lock();
        self.navigate_locked(&mut navlog, path, params, mode)
    }

    /// Push a navigation to `path` with no extra parameters.
    pub fn go(&self, path: &str) -> RouteDescriptor {
        self.navigate(path, QueryPatch::new(), HistoryMode::Push)
    }

    /// Navigate to a registered page by key.
    pub fn navigate_to(&self, key: &str, id: Option<&str>, params: &Params) -> RouteDescriptor {
        let url = self.registry.build_route_url(key, id, params);
        self.go(&url)
    }

    fn navigate_locked(
        &self,
        navlog: &mut NavigationLog,
        path: &str,
        params: QueryPatch,
        mode: HistoryMode,
    ) -> RouteDescriptor {
        let (clean_path, embedded) = split_url(path);
        let merged = params.overlay(embedded.map(parse_query).unwrap_or_default());

        let url = build_url(clean_path, &merged);
        let search = url.find('?').map_or("", |i| &url[i..]);
        let parsed = self.parse(clean_path, search);

        let (prev_page, prev_url) = {
            let prev = self.route_tx.borrow();
            (prev.page.clone(), prev.full_url.clone())
        };
        navlog.push(NavigationEntry::new(
            prev_url,
            url.clone(),
            mode == HistoryMode::Replace,
            Trigger::Navigate,
        ));

        let state = HistoryState {
            page: parsed.page.clone(),
            id: parsed.id.clone(),
        };
        match mode {
            HistoryMode::Push => self.history.push_state(state, &url),
            HistoryMode::Replace => self.history.replace_state(state, &url),
        }

        debug!(url = %url, page = %parsed.page, ?mode, "Navigated");
        self.publish(parsed.clone());

        if mode == HistoryMode::Push && prev_page != parsed.page {
            self.viewport.scroll_to_top();
        }

        parsed
    }

    /// Change query parameters of the current route without a history entry.
    ///
    /// `None`, `""` and `"all"` remove a key. Any change that does not name
    /// `page` also drops `page`, resetting pagination.
    pub fn update_params(&self, patch: QueryPatch) -> RouteDescriptor {
        let mut navlog = self.navlog.lock();
        let current = self.route_tx.borrow().clone();

        let mut merged = current.params;
        for (key, value) in patch.iter() {
            match value {
                Some(v) if !CLEARING_VALUES.contains(&v) => {
                    merged.insert(key.to_string(), v.to_string());
                }
                _ => {
                    merged.remove(key);
                }
            }
        }
        if !patch.contains_key(PAGE_PARAM) && !patch.is_empty() {
            merged.remove(PAGE_PARAM);
        }

        self.navigate_locked(
            &mut navlog,
            &current.path,
            QueryPatch::from(merged),
            HistoryMode::Replace,
        )
    }

    /// Traverse back on the navigation surface.
    ///
    /// The descriptor changes only once the backend reports the pop.
    pub fn back(&self) {
        self.history.back();
    }

    /// Re-derive the descriptor from the live location after a pop.
    pub fn handle_popstate(&self) -> RouteDescriptor {
        let mut navlog = self.navlog.lock();
        let location = self.history.location();
        let parsed = self.parse(&location.pathname, &location.search);

        let prev_url = self.route_tx.borrow().full_url.clone();
        navlog.push(NavigationEntry::new(
            prev_url,
            parsed.full_url.clone(),
            false,
            Trigger::Popstate,
        ));

        debug!(url = %location.url(), page = %parsed.page, "Pop state");
        self.publish(parsed.clone());
        parsed
    }

    /// Handle pop events until the sender side is dropped.
    pub async fn listen_popstate(&self, mut events: mpsc::UnboundedReceiver<PopState>) {
        while events.recv().await.is_some() {
            self.handle_popstate();
        }
        trace!("Pop event stream ended");
    }

    fn publish(&self, route: RouteDescriptor) {
        let page = route.page.clone();
        let id = route.id.clone();
        let params = route.params.clone();

        self.route_tx.send_replace(route);
        replace_if_changed(&self.page_tx, page);
        replace_if_changed(&self.id_tx, id);
        replace_if_changed(&self.params_tx, params);
    }

    /// The current descriptor.
    #[must_use]
    pub fn current(&self) -> RouteDescriptor {
        self.route_tx.borrow().clone()
    }

    /// Subscribe to the full descriptor.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RouteDescriptor> {
        self.route_tx.subscribe()
    }

    /// Subscribe to the current page key.
    #[must_use]
    pub fn page(&self) -> watch::Receiver<String> {
        self.page_tx.subscribe()
    }

    /// Subscribe to the current id.
    #[must_use]
    pub fn id(&self) -> watch::Receiver<Option<String>> {
        self.id_tx.subscribe()
    }

    /// Subscribe to the current query parameters.
    #[must_use]
    pub fn params(&self) -> watch::Receiver<Params> {
        self.params_tx.subscribe()
    }

    /// Recent navigations, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<NavigationEntry> {
        self.navlog.lock().snapshot()
    }

    /// The route table.
    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// The routing anomaly log.
    #[must_use]
    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    /// Build the URL of a registered page.
    #[must_use]
    pub fn build_route_url(&self, key: &str, id: Option<&str>, params: &Params) -> String {
        self.registry.build_route_url(key, id, params)
    }

    /// Diagnostic snapshot.
    #[must_use]
    pub fn debug_snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            current: self.current(),
            history: self.history(),
            pending_anomalies: self.anomalies.pending(),
        }
    }
}

fn replace_if_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
