//! Client configuration and constants.
//!
//! This module provides:
//! - Configuration constants (default headers, limits, multipart layout)
//! - Per-request settings ([`HttpConfig`])
//! - Logging option types shared by the library and the CLI

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{HttpConfig, LogFormat, LogLevel};
