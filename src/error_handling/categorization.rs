//! Error categorization for body reads.
//!
//! Body readers only speak `std::io`, so framing problems travel through
//! `io::Error` payloads and are classified back into [`HttpError`] here.

use std::fmt;
use std::io;

use super::types::HttpError;

/// Payload of an `UnexpectedEof` raised when a body ends before its framing
/// says it should.
#[derive(Debug)]
pub(crate) struct PrematureEof {
    pub(crate) expected: Option<u64>,
    pub(crate) received: u64,
}

impl fmt::Display for PrematureEof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(expected) => write!(
                f,
                "stream closed after {} of {} body bytes",
                self.received, expected
            ),
            None => write!(
                f,
                "stream closed inside a chunk after {} body bytes",
                self.received
            ),
        }
    }
}

impl std::error::Error for PrematureEof {}

impl PrematureEof {
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::UnexpectedEof, self)
    }
}

/// Payload of an `InvalidData` error raised for an unparseable chunk header.
#[derive(Debug)]
pub(crate) struct MalformedChunk(pub(crate) String);

impl fmt::Display for MalformedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed chunk: {}", self.0)
    }
}

impl std::error::Error for MalformedChunk {}

impl MalformedChunk {
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

/// Whether an I/O error marks a body that ended early.
///
/// rustls reports a peer that closed without `close_notify` as a plain
/// `UnexpectedEof`, so that case is covered too.
pub(crate) fn is_premature_eof(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::UnexpectedEof
}

/// Converts an I/O error raised while reading a body into an [`HttpError`].
///
/// # Arguments
///
/// * `error` - The error returned by the body reader
/// * `bytes_read` - Decoded body bytes delivered before the failure
pub(crate) fn classify_body_error(error: io::Error, bytes_read: usize) -> HttpError {
    if is_premature_eof(&error) {
        return HttpError::TransientRead {
            bytes_read,
            source: error,
        };
    }
    let malformed = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MalformedChunk>())
        .map(|m| m.to_string());
    match malformed {
        Some(message) => HttpError::Protocol(message),
        None => HttpError::Io(error),
    }
}
