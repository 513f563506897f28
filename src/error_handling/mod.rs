//! Error handling.
//!
//! This module provides:
//! - [`HttpError`], returned by every fallible client operation
//! - [`ErrorKind`], a coarse classification used for logging and tests
//! - [`InitializationError`] for logger setup
//! - Classification of I/O failures raised inside body readers
//!
//! Errors are categorized into:
//! - **Connection**: failures before the request could be written
//! - **Protocol**: responses that do not parse as HTTP/1.x
//! - **TransientRead**: bodies cut short (optionally tolerated)
//! - **Encoding**: charsets that cannot be resolved

mod categorization;
mod types;

// Re-export public API
pub(crate) use categorization::{
    classify_body_error, is_premature_eof, MalformedChunk, PrematureEof,
};
pub use types::{ErrorKind, HttpError, InitializationError};
