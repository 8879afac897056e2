//! Navigation history tracking.
//!
//! A bounded record of recent URL transitions for diagnostics. Nothing in the
//! router reads it back when making routing decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of retained entries.
pub const DEFAULT_NAVIGATION_LOG_CAPACITY: usize = 50;

/// What caused a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// An explicit navigate or param update.
    Navigate,
    /// A back/forward pop on the navigation surface.
    Popstate,
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEntry {
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    /// Whether the history entry was replaced instead of pushed.
    pub replace: bool,
    pub trigger: Trigger,
}

impl NavigationEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, replace: bool, trigger: Trigger) -> Self {
        Self {
            timestamp: Utc::now(),
            from: from.into(),
            to: to.into(),
            replace,
            trigger,
        }
    }
}

/// Ring buffer of the most recent navigations.
#[derive(Debug)]
pub struct NavigationLog {
    entries: VecDeque<NavigationEntry>,
    capacity: usize,
}

impl NavigationLog {
    /// Create a log with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NAVIGATION_LOG_CAPACITY)
    }

    /// Create a log retaining at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a transition, evicting the oldest entry when full.
    pub fn push(&mut self, entry: NavigationEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&NavigationEntry> {
        self.entries.back()
    }

    /// Copy of all entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NavigationEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for NavigationLog {
    fn default() -> Self {
        Self::new()
    }
}
