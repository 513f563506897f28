//! Ordered, case-insensitive header multimap.
//!
//! Header names keep the spelling they were first inserted with, lookups
//! ignore ASCII case, and insertion order is preserved on the wire.

pub(crate) mod names;

use std::fmt;

use crate::error_handling::HttpError;

/// A trimmed header name compared without regard to ASCII case.
#[derive(Clone)]
pub struct HeaderName(String);

impl HeaderName {
    /// Trims `name`, returning `None` when nothing is left.
    pub fn new(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The name as it was first written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for HeaderName {}

impl fmt::Debug for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered multimap of header names to values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(HeaderName, String)>,
}

impl HeaderMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    ///
    /// With `replace` set, every existing value under `name` is dropped and the
    /// new value takes the position of the first one removed. Otherwise the
    /// value is appended after the existing ones. Blank names are ignored.
    pub fn insert(&mut self, name: &str, value: impl Into<String>, replace: bool) {
        let Some(name) = HeaderName::new(name) else {
            return;
        };
        let value = value.into();
        if replace {
            if let Some(pos) = self.position(name.as_str()) {
                self.entries.retain(|(n, _)| n != &name);
                self.entries.insert(pos.min(self.entries.len()), (name, value));
                return;
            }
        }
        self.entries.push((name, value));
    }

    /// Appends a value, keeping any existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.insert(name, value, false);
    }

    /// Replaces every value under `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.insert(name, value, true);
    }

    /// Inserts `value` only when `name` is not present yet.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.append(name, value);
        }
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.matches(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.matches(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes every value under `name`, returning them.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|(n, v)| {
            if n.matches(name) {
                removed.push(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Whether at least one value is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Distinct names in first-insertion order.
    pub fn names(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in &self.entries {
            if !seen.iter().any(|s| s.eq_ignore_ascii_case(name.as_str())) {
                seen.push(name.as_str());
            }
        }
        seen
    }

    /// Number of stored values (not distinct names).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no values.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every name from `other` into `self`.
    ///
    /// Names present in both end up with `other`'s values when `replace` is
    /// set; otherwise `self` keeps its values and `other`'s are skipped.
    pub fn merge_from(&mut self, other: &HeaderMap, replace: bool) {
        for name in other.names() {
            if !replace && self.contains(name) {
                continue;
            }
            self.remove(name);
            for value in other.get_all(name) {
                self.append(name, value);
            }
        }
    }

    /// Checks that every entry can be written as a single header line.
    ///
    /// # Errors
    ///
    /// [`HttpError::InvalidHeader`] for the first name that is not an HTTP
    /// token or value that contains CR, LF or NUL.
    pub fn check_wire_safe(&self) -> Result<(), HttpError> {
        for (name, value) in self.iter() {
            let reason = if !is_token(name) {
                "name is not an HTTP token"
            } else if !is_safe_value(value) {
                "value contains CR, LF or NUL"
            } else {
                continue;
            };
            return Err(HttpError::InvalidHeader {
                name: name.escape_debug().to_string(),
                reason,
            });
        }
        Ok(())
    }

    /// Serializes the map as `Name: value\r\n` lines.
    pub fn write_lines(&self, out: &mut String) {
        for (name, value) in self.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.matches(name))
    }
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn is_safe_value(value: &str) -> bool {
    !value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0))
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_all_values() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Trace", "v1", false);
        headers.insert("x-trace", "v2", false);
        assert_eq!(headers.get_all("X-TRACE"), vec!["v1", "v2"]);
        assert_eq!(headers.get("x-trace"), Some("v1"));
    }

    #[test]
    fn test_override_replaces_all_values() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Trace", "v1", false);
        headers.insert("X-Trace", "v1b", false);
        headers.insert("X-TRACE", "v2", true);
        assert_eq!(headers.get_all("x-trace"), vec!["v2"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_override_keeps_position() {
        let mut headers = HeaderMap::new();
        headers.append("A", "1");
        headers.append("B", "2");
        headers.append("C", "3");
        headers.set("b", "two");
        let order: Vec<_> = headers.iter().collect();
        assert_eq!(order, vec![("A", "1"), ("b", "two"), ("C", "3")]);
    }

    #[test]
    fn test_names_are_trimmed_and_blank_ignored() {
        let mut headers = HeaderMap::new();
        headers.append("  Accept  ", "*/*");
        headers.append("   ", "ignored");
        headers.append("", "ignored");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept"), Some("*/*"));
        assert_eq!(headers.get(" ACCEPT "), Some("*/*"));
    }

    #[test]
    fn test_remove_returns_values() {
        let mut headers = HeaderMap::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        headers.append("Host", "example.com");
        assert_eq!(headers.remove("set-cookie"), vec!["a=1", "b=2"]);
        assert!(!headers.contains("Set-Cookie"));
        assert!(headers.contains("host"));
    }

    #[test]
    fn test_set_if_absent() {
        let mut headers = HeaderMap::new();
        headers.set_if_absent("User-Agent", "first");
        headers.set_if_absent("user-agent", "second");
        assert_eq!(headers.get_all("User-Agent"), vec!["first"]);
    }

    #[test]
    fn test_merge_from() {
        let mut base = HeaderMap::new();
        base.append("Accept", "text/html");
        base.append("User-Agent", "base");

        let mut extra = HeaderMap::new();
        extra.append("accept", "application/json");
        extra.append("X-Extra", "1");

        let mut keep = base.clone();
        keep.merge_from(&extra, false);
        assert_eq!(keep.get("Accept"), Some("text/html"));
        assert_eq!(keep.get("X-Extra"), Some("1"));

        base.merge_from(&extra, true);
        assert_eq!(base.get_all("Accept"), vec!["application/json"]);
    }

    #[test]
    fn test_write_lines() {
        let mut headers = HeaderMap::new();
        headers.append("Host", "example.com");
        headers.append("Accept", "*/*");
        let mut out = String::new();
        headers.write_lines(&mut out);
        assert_eq!(out, "Host: example.com\r\nAccept: */*\r\n");
    }

    #[test]
    fn test_check_wire_safe() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "*/*");
        headers.append("X-Quoted", "a \"b\"\tc");
        assert!(headers.check_wire_safe().is_ok());

        let mut split = headers.clone();
        split.append("X-Note", "a\r\nX-Injected: evil");
        let err = split.check_wire_safe().expect_err("CRLF in value");
        assert!(err.to_string().contains("X-Note"));

        for bad in ["bare\nline", "nul\0byte", "cr\rhere"] {
            let mut one = HeaderMap::new();
            one.append("X-V", bad);
            assert!(one.check_wire_safe().is_err(), "{bad:?}");
        }

        for bad_name in ["X Space", "X:Colon", "X\r\nInjected"] {
            let mut one = HeaderMap::new();
            one.append(bad_name, "v");
            assert!(one.check_wire_safe().is_err(), "{bad_name:?}");
        }
    }

    #[test]
    fn test_names_distinct_in_order() {
        let mut headers = HeaderMap::new();
        headers.append("B", "1");
        headers.append("a", "2");
        headers.append("b", "3");
        assert_eq!(headers.names(), vec!["B", "a"]);
    }
}
