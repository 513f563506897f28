//! Charset resolution for request bodies and response text.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use encoding_rs::Encoding;
use regex::Regex;

use crate::error_handling::HttpError;

static CONTENT_TYPE_CHARSET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_.:\-]+)"#).ok());

// <meta charset="x"> and <meta http-equiv=... content="text/html; charset=x">
static META_CHARSET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_.:\-]+)"#).ok()
});

/// A text encoding resolved from a WHATWG label.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Charset(&'static Encoding);

impl Charset {
    /// UTF-8.
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    /// Resolves `label`, failing with [`HttpError::Encoding`] when unknown.
    pub fn for_label(label: &str) -> Result<Self, HttpError> {
        Self::try_for_label(label).ok_or_else(|| HttpError::Encoding(label.trim().to_string()))
    }

    /// Resolves `label`, returning `None` when unknown.
    pub fn try_for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(Self)
    }

    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Encodes `text`, replacing unmappable characters with numeric references.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        let (bytes, _, _) = self.0.encode(text);
        bytes
    }

    /// Decodes `bytes`, replacing malformed sequences with U+FFFD.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _, _) = self.0.decode(bytes);
        text
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracts the `charset` parameter label from a Content-Type value.
pub fn label_from_content_type(content_type: &str) -> Option<&str> {
    CONTENT_TYPE_CHARSET
        .as_ref()?
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Finds a charset declared by a `<meta>` tag in an HTML document.
///
/// Only the first 4KB are scanned, decoded as ASCII-compatible text.
pub fn sniff_meta_charset(body: &[u8]) -> Option<Charset> {
    let head = &body[..body.len().min(4096)];
    let text = String::from_utf8_lossy(head);
    let label = META_CHARSET
        .as_ref()?
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;
    Charset::try_for_label(&label)
}
