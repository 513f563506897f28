//! Error type definitions.
//!
//! This module defines the error returned by every fallible client operation
//! and the initialization error used during logger setup.

use std::io;

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Errors raised while building, sending, or reading an HTTP exchange.
#[derive(Error, Debug)]
pub enum HttpError {
    /// DNS failure, refused connection, connect timeout, TLS handshake
    /// failure, or a proxy refusing the tunnel. Never retried.
    #[error("Connection to {target} failed: {source}")]
    Connection {
        /// `host:port` that was being connected to.
        target: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Malformed status line, header block, or chunk framing.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The body ended before its declared framing was complete.
    #[error("Premature end of stream after {bytes_read} body bytes")]
    TransientRead {
        /// Number of (decoded) body bytes read before the stream ended.
        bytes_read: usize,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Unsupported or unrecognized charset label.
    #[error("Unsupported charset: {0}")]
    Encoding(String),

    /// Unparseable URL or a scheme other than http/https.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A request header that cannot be written safely: a name that is not an
    /// HTTP token, or a value containing CR, LF or NUL.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// The offending header name, escaped for display.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Any other I/O failure while sending the request or reading the body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of [`HttpError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    /// See [`HttpError::Connection`].
    Connection,
    /// See [`HttpError::Protocol`].
    Protocol,
    /// See [`HttpError::TransientRead`].
    TransientRead,
    /// See [`HttpError::Encoding`].
    Encoding,
    /// See [`HttpError::InvalidUrl`].
    InvalidUrl,
    /// See [`HttpError::InvalidHeader`].
    InvalidHeader,
    /// See [`HttpError::Io`].
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    /// Returns a human-readable name for the error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "Connection error",
            ErrorKind::Protocol => "Protocol error",
            ErrorKind::TransientRead => "Transient read error",
            ErrorKind::Encoding => "Encoding error",
            ErrorKind::InvalidUrl => "Invalid URL",
            ErrorKind::InvalidHeader => "Invalid header",
            ErrorKind::Io => "I/O error",
        }
    }
}

impl HttpError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HttpError::Connection { .. } => ErrorKind::Connection,
            HttpError::Protocol(_) => ErrorKind::Protocol,
            HttpError::TransientRead { .. } => ErrorKind::TransientRead,
            HttpError::Encoding(_) => ErrorKind::Encoding,
            HttpError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            HttpError::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            HttpError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the error was caused by a connect or read timeout.
    pub fn is_timeout(&self) -> bool {
        let source = match self {
            HttpError::Connection { source, .. } => source,
            HttpError::TransientRead { source, .. } => source,
            HttpError::Io(source) => source,
            _ => return false,
        };
        matches!(
            source.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }

    pub(crate) fn connection(target: impl Into<String>, source: io::Error) -> Self {
        HttpError::Connection {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        HttpError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<httparse::Error> for HttpError {
    fn from(e: httparse::Error) -> Self {
        HttpError::Protocol(format!("malformed response head: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_error_kinds_have_string_representation() {
        for kind in ErrorKind::iter() {
            assert!(!kind.as_str().is_empty(), "{:?} should have a name", kind);
        }
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = HttpError::connection(
            "example.com:443",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(
            HttpError::Protocol("bad".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            HttpError::Encoding("x-unknown".into()).kind(),
            ErrorKind::Encoding
        );
        assert_eq!(
            HttpError::invalid_url("ftp://x", "unsupported scheme").kind(),
            ErrorKind::InvalidUrl
        );
        let err = HttpError::InvalidHeader {
            name: "X-Note".into(),
            reason: "value contains CR, LF or NUL",
        };
        assert_eq!(err.kind(), ErrorKind::InvalidHeader);
        assert_eq!(
            err.to_string(),
            "Invalid header 'X-Note': value contains CR, LF or NUL"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timed_out = HttpError::connection(
            "10.255.255.1:80",
            io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
        );
        assert!(timed_out.is_timeout());

        let refused = HttpError::connection(
            "127.0.0.1:1",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert!(!refused.is_timeout());
        assert!(!HttpError::Protocol("x".into()).is_timeout());
    }

    #[test]
    fn test_display_messages() {
        let err = HttpError::Encoding("x-klingon".into());
        assert_eq!(err.to_string(), "Unsupported charset: x-klingon");

        let err = HttpError::TransientRead {
            bytes_read: 12,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "eof"),
        };
        assert_eq!(
            err.to_string(),
            "Premature end of stream after 12 body bytes"
        );
    }

    #[test]
    fn test_httparse_error_becomes_protocol_error() {
        let err: HttpError = httparse::Error::Status.into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
