//! Navigation surface abstraction.
//!
//! The router never owns the address bar. It reads the live location from a
//! [`HistoryBackend`], writes entries to it, and reacts to pop events the
//! backend reports. [`MemoryHistory`] is an in-process backend with browser
//! semantics: a stack of entries and a cursor.

use crate::query::split_url;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Payload attached to a history entry. Advisory only; the URL wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub page: String,
    pub id: Option<String>,
}

/// The live location of the navigation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path without query.
    pub pathname: String,
    /// Query including the leading `?`, or empty.
    pub search: String,
}

impl Location {
    /// Split a URL such as `/watch/abc?t=1` into a location.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let (path, query) = split_url(url);
        let pathname = if path.is_empty() { "/" } else { path };
        Self {
            pathname: pathname.to_string(),
            search: match query {
                Some(q) if !q.is_empty() => format!("?{q}"),
                _ => String::new(),
            },
        }
    }

    /// Pathname plus query string.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.pathname, self.search)
    }
}

/// A back/forward traversal reported by the navigation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopState;

/// A browser-like history stack.
pub trait HistoryBackend: Send + Sync {
    /// Current location.
    fn location(&self) -> Location;

    /// Push a new entry and make it current.
    fn push_state(&self, state: HistoryState, url: &str);

    /// Replace the current entry.
    fn replace_state(&self, state: HistoryState, url: &str);

    /// Traverse one entry back. Reports a [`PopState`] if it moved.
    fn back(&self);
}

/// Something that can be scrolled back to the top on page changes.
pub trait Viewport: Send + Sync {
    fn scroll_to_top(&self);
}

/// A viewport that ignores scroll requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopViewport;

impl Viewport for NoopViewport {
    fn scroll_to_top(&self) {}
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    state: Option<HistoryState>,
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Entry>,
    cursor: usize,
    pop_tx: Option<mpsc::UnboundedSender<PopState>>,
}

/// In-memory history backend.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

impl MemoryHistory {
    /// Create a history whose single entry is `initial_url`.
    #[must_use]
    pub fn new(initial_url: &str) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![Entry {
                    url: initial_url.to_string(),
                    state: None,
                }],
                cursor: 0,
                pop_tx: None,
            }),
        }
    }

    /// Receive pop events. A later call replaces the earlier receiver.
    pub fn pop_events(&self) -> mpsc::UnboundedReceiver<PopState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.stack.lock().pop_tx = Some(tx);
        rx
    }

    /// Traverse one entry forward. Reports a [`PopState`] if it moved.
    pub fn forward(&self) {
        let mut stack = self.stack.lock();
        if stack.cursor + 1 < stack.entries.len() {
            stack.cursor += 1;
            Self::notify(&stack);
        }
    }

    /// State payload of the current entry.
    #[must_use]
    pub fn state(&self) -> Option<HistoryState> {
        let stack = self.stack.lock();
        stack.entries[stack.cursor].state.clone()
    }

    /// URLs of all entries, oldest first.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.stack.lock().entries.iter().map(|e| e.url.clone()).collect()
    }

    fn notify(stack: &Stack) {
        trace!(url = %stack.entries[stack.cursor].url, "Pop state");
        if let Some(tx) = &stack.pop_tx {
            let _ = tx.send(PopState);
        }
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl HistoryBackend for MemoryHistory {
    fn location(&self) -> Location {
        let stack = self.stack.lock();
        Location::from_url(&stack.entries[stack.cursor].url)
    }

    fn push_state(&self, state: HistoryState, url: &str) {
        let mut stack = self.stack.lock();
        let keep = stack.cursor + 1;
        stack.entries.truncate(keep);
        stack.entries.push(Entry {
            url: url.to_string(),
            state: Some(state),
        });
        stack.cursor = keep;
    }

    fn replace_state(&self, state: HistoryState, url: &str) {
        let mut stack = self.stack.lock();
        let cursor = stack.cursor;
        stack.entries[cursor] = Entry {
            url: url.to_string(),
            state: Some(state),
        };
    }

    fn back(&self) {
        let mut stack = self.stack.lock();
        if stack.cursor > 0 {
            stack.cursor -= 1;
            Self::notify(&stack);
        }
    }
}
