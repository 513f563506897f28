//! Host-keyed cookie store shared through a [`crate::ClientContext`].
//!
//! The store keeps one `Cookie` header string per host. Every response that
//! carries `Set-Cookie` merges its `name=value` pairs into the host's entry;
//! attributes such as `Path`, `Expires` or `Secure` are not tracked.

use std::collections::HashMap;
use std::sync::RwLock;

use log::trace;
use url::Url;

/// How a request sources its `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CookiePolicy {
    /// Look the host up in the context's cookie store.
    #[default]
    Default,
    /// Send exactly this value and skip the store.
    Explicit(String),
    /// Send no `Cookie` header at all.
    Disabled,
}

/// Thread-safe map from host to its last known cookie string.
///
/// Single `get`/`put` calls are atomic; a read followed by a merge from two
/// threads may lose one side's update.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: RwLock<HashMap<String, String>>,
}

impl CookieStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookie string last recorded for `host`.
    pub fn get(&self, host: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&host.to_ascii_lowercase())
            .cloned()
    }

    /// Replaces the cookie string recorded for `host`.
    pub fn put(&self, host: &str, cookie: impl Into<String>) {
        self.cookies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(host.to_ascii_lowercase(), cookie.into());
    }

    /// Forgets every host.
    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of hosts with a recorded cookie string.
    pub fn len(&self) -> usize {
        self.cookies.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no host has a recorded cookie string.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cookie string for the host of `url`.
    pub fn get_for_url(&self, url: &Url) -> Option<String> {
        host_key(url).and_then(|host| self.get(&host))
    }

    /// Merges `Set-Cookie` header values received from `url` into the store.
    pub fn store_response_cookies<'a, I>(&self, url: &Url, set_cookie_values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(host) = host_key(url) else {
            return;
        };
        let incoming: Vec<(String, String)> = set_cookie_values
            .into_iter()
            .filter_map(parse_set_cookie)
            .collect();
        if incoming.is_empty() {
            return;
        }
        let mut map = self.cookies.write().unwrap_or_else(|e| e.into_inner());
        let existing = map.get(&host).map(String::as_str).unwrap_or("");
        let merged = merge_cookie_pairs(existing, &incoming);
        trace!("Cookie store update for {host}: {merged}");
        map.insert(host, merged);
    }
}

/// Store key for a URL: its lowercased host.
pub(crate) fn host_key(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Extracts the leading `name=value` pair of a `Set-Cookie` value.
pub fn parse_set_cookie(value: &str) -> Option<(String, String)> {
    let pair = value.split(';').next()?;
    let (name, val) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), val.trim().to_string()))
}

/// Splits a `Cookie` header string into its `name=value` pairs.
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, val) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), val.trim().to_string()))
            }
        })
        .collect()
}

fn merge_cookie_pairs(existing: &str, incoming: &[(String, String)]) -> String {
    let mut pairs = parse_cookie_header(existing);
    for (name, value) in incoming {
        match pairs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.clone(),
            None => pairs.push((name.clone(), value.clone())),
        }
    }
    pairs
        .iter()
        .map(|(n, v)| format!("{n}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test url")
    }

    #[test]
    fn test_get_put_clear() {
        let store = CookieStore::new();
        assert!(store.get("example.com").is_none());
        store.put("Example.COM", "a=b");
        assert_eq!(store.get("example.com").as_deref(), Some("a=b"));
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_response_cookies_strips_attributes() {
        let store = CookieStore::new();
        let u = url("http://example.com/login");
        store.store_response_cookies(&u, ["a=b; Path=/; HttpOnly"]);
        assert_eq!(store.get_for_url(&u).as_deref(), Some("a=b"));
    }

    #[test]
    fn test_store_merges_and_replaces_same_name() {
        let store = CookieStore::new();
        let u = url("http://example.com/");
        store.store_response_cookies(&u, ["a=1", "b=2"]);
        store.store_response_cookies(&url("http://example.com/other"), ["a=3; Secure"]);
        assert_eq!(store.get("example.com").as_deref(), Some("a=3; b=2"));
    }

    #[test]
    fn test_hosts_are_isolated() {
        let store = CookieStore::new();
        store.store_response_cookies(&url("http://one.test/"), ["a=1"]);
        assert!(store.get_for_url(&url("http://two.test/")).is_none());
    }

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("session=abc123; Max-Age=60"),
            Some(("session".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("empty=; Path=/"),
            Some(("empty".to_string(), String::new()))
        );
        assert_eq!(parse_set_cookie("novalue"), None);
        assert_eq!(parse_set_cookie("=x"), None);
    }

    #[test]
    fn test_parse_cookie_header() {
        let pairs = parse_cookie_header("a=1; b=2;  c = 3 ");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_set_cookie_leaves_store_untouched() {
        let store = CookieStore::new();
        store.store_response_cookies(&url("http://example.com/"), ["garbage"]);
        assert!(store.is_empty());
    }
}
