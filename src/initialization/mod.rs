//! Process-wide initialization.
//!
//! This module provides:
//! - Logger setup (plain colored output or JSON lines)
//! - Installation of the rustls crypto provider used for https
//!
//! Both are meant to be called once, early, by binaries and tests.

mod logger;

use rustls::crypto::{ring::default_provider, CryptoProvider};

// Re-export public API
pub use logger::init_logger_with;

/// Installs the `ring` crypto provider as the rustls process default.
///
/// Call before the first https request when other crates in the process
/// might install a competing provider. Installing twice is harmless.
pub fn init_crypto_provider() {
    let _ = CryptoProvider::install_default(default_provider());
}
