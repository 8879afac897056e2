//! Query string handling.
//!
//! Query parameters are kept as a sorted string map. Parsing follows
//! `application/x-www-form-urlencoded` rules; when a key repeats, the last
//! occurrence wins. Canonical URLs list parameters sorted by key, so the
//! order a caller supplied them in is not preserved.

use std::collections::BTreeMap;
use url::form_urlencoded;

/// Query parameters of a route.
pub type Params = BTreeMap<String, String>;

/// Parse a query string, with or without the leading `?`.
#[must_use]
pub fn parse_query(search: &str) -> Params {
    let search = search.strip_prefix('?').unwrap_or(search);
    form_urlencoded::parse(search.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Serialize parameters into a query string without the leading `?`.
///
/// Empty values are skipped.
#[must_use]
pub fn serialize_query(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        if !v.is_empty() {
            serializer.append_pair(k, v);
        }
    }
    serializer.finish()
}

/// Build `path?query`, or just `path` when no parameter survives.
///
/// Parameters appear in key order regardless of how they were inserted;
/// `/library?type=short&sort=title` comes back as
/// `/library?sort=title&type=short`.
#[must_use]
pub fn build_url(path: &str, params: &Params) -> String {
    let qs = serialize_query(params);
    if qs.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{qs}")
    }
}

/// Split a URL into its path and its query string (without `?`).
#[must_use]
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, qs)) => (path, Some(qs)),
        None => (url, None),
    }
}

/// A set of parameter changes.
///
/// `None` marks a key for removal. Keys are unique; setting a key twice keeps
/// the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    entries: BTreeMap<String, Option<String>>,
}

impl QueryPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key to the string form of `value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.insert(key.into(), Some(value.to_string()));
        self
    }

    /// Mark a key for removal.
    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    /// Insert a raw entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value);
    }

    /// Check whether the patch names `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Check whether the patch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Apply the patch on top of `base`: `Some` overrides, `None` removes.
    #[must_use]
    pub fn overlay(&self, mut base: Params) -> Params {
        for (k, v) in &self.entries {
            match v {
                Some(v) => {
                    base.insert(k.clone(), v.clone());
                }
                None => {
                    base.remove(k);
                }
            }
        }
        base
    }
}

impl From<Params> for QueryPatch {
    fn from(params: Params) -> Self {
        Self {
            entries: params.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryPatch {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |patch, (k, v)| patch.set(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let params = parse_query("?t=120&tab=chapters");
        assert_eq!(params.get("t").map(String::as_str), Some("120"));
        assert_eq!(params.get("tab").map(String::as_str), Some("chapters"));

        assert!(parse_query("").is_empty());
        assert!(parse_query("?").is_empty());
    }

    #[test]
    fn test_parse_query_decoding() {
        let params = parse_query("q=hello+world&x=a%26b&q2=%C3%BC");
        assert_eq!(params["q"], "hello world");
        assert_eq!(params["x"], "a&b");
        assert_eq!(params["q2"], "ü");
    }

    #[test]
    fn test_parse_query_last_value_wins() {
        let params = parse_query("a=1&a=2");
        assert_eq!(params["a"], "2");
    }

    #[test]
    fn test_build_url_skips_empty() {
        let mut params = Params::new();
        params.insert("sort".into(), "title".into());
        params.insert("q".into(), String::new());
        assert_eq!(build_url("/library", &params), "/library?sort=title");

        params.remove("sort");
        assert_eq!(build_url("/library", &params), "/library");
    }

    #[test]
    fn test_build_url_orders_by_key() {
        let params = parse_query("type=short&sort=title&page=2");
        assert_eq!(build_url("/library", &params), "/library?page=2&sort=title&type=short");
    }

    #[test]
    fn test_build_url_encodes() {
        let mut params = Params::new();
        params.insert("q".into(), "a b&c".into());
        assert_eq!(build_url("/search", &params), "/search?q=a+b%26c");
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/feed?tab=later"), ("/feed", Some("tab=later")));
        assert_eq!(split_url("/feed"), ("/feed", None));
        assert_eq!(split_url("/a?b=1?c"), ("/a", Some("b=1?c")));
    }

    #[test]
    fn test_patch_overlay() {
        let base = parse_query("type=short&sort=title");
        let patch = QueryPatch::new().unset("type").set("page", 2);
        let merged = patch.overlay(base);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["sort"], "title");
        assert_eq!(merged["page"], "2");
    }

    #[test]
    fn test_patch_from_iter() {
        let patch: QueryPatch = [("t", "120"), ("tab", "chapters")].into_iter().collect();
        assert!(patch.contains_key("t"));
        assert!(patch.contains_key("tab"));
        assert!(!patch.is_empty());
    }
}
