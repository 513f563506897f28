//! Connection management.
//!
//! This module provides:
//! - [`Connection`]: one TCP (optionally TLS) stream per send attempt
//! - HTTP proxy support, including `CONNECT` tunnels for https
//! - Pluggable TLS through [`SocketFactory`] and rustls certificate verifiers
//!
//! Connections are never pooled; each redirect hop opens a fresh one.

mod proxy;
mod tls;
mod transport;

pub use proxy::Proxy;
pub use tls::{
    webpki_verifier, RustlsSocketFactory, SocketFactory, TlsOptions, TlsProtocol,
    TrustAllVerifier,
};
pub use transport::{ConnectOptions, Connection, Transport};
