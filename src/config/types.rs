//! Configuration types.
//!
//! This module defines the logging option enums used by the CLI and the
//! per-request [`HttpConfig`] that every [`crate::Request`] carries.

use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::DEFAULT_MAX_REDIRECT_COUNT;
use crate::connection::{Proxy, TlsOptions};
use crate::interceptor::InterceptorChain;
use crate::request::Request;
use crate::response::Response;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Per-request transport and pipeline settings.
///
/// A [`crate::ClientContext`] holds the default copy; each request clones it
/// at creation time and may then change its own copy freely.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Timeout for establishing the TCP connection. For https it also bounds
    /// each read and write of the proxy tunnel setup and the TLS handshake.
    pub connect_timeout: Option<Duration>,
    /// Timeout for each blocking read on the socket.
    pub read_timeout: Option<Duration>,
    /// Maximum number of redirect hops to follow.
    pub max_redirect_count: usize,
    /// Whether 3xx responses are followed at all.
    pub follow_redirects: bool,
    /// HTTP proxy used for every hop.
    pub proxy: Option<Proxy>,
    /// Certificate verifier and socket factory overrides for https.
    pub tls: TlsOptions,
    /// Chunked streaming block size for uploads; `0` disables chunked mode.
    pub block_size: usize,
    /// Send `Cache-Control: no-cache` and `Pragma: no-cache`.
    pub disable_cache: bool,
    /// Return the partial body instead of failing on a premature end of stream.
    pub ignore_eof_error: bool,
    /// Run the request/response interceptors again on every redirect hop.
    pub interceptor_on_redirect: bool,
    /// Interceptors applied to the request before it is sent.
    pub request_interceptors: InterceptorChain<Request>,
    /// Interceptors applied to the final response.
    pub response_interceptors: InterceptorChain<Response>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            max_redirect_count: DEFAULT_MAX_REDIRECT_COUNT,
            follow_redirects: true,
            proxy: None,
            tls: TlsOptions::default(),
            block_size: 0,
            disable_cache: false,
            ignore_eof_error: true,
            interceptor_on_redirect: false,
            request_interceptors: InterceptorChain::new(),
            response_interceptors: InterceptorChain::new(),
        }
    }
}

impl HttpConfig {
    /// Sets both the connect and the read timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
        self.read_timeout = timeout;
    }

    /// Whether another hop may be taken after `hops_taken` redirects.
    pub fn allows_redirect(&self, hops_taken: usize) -> bool {
        self.follow_redirects && hops_taken < self.max_redirect_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_format_debug() {
        assert_eq!(format!("{:?}", LogFormat::Plain), "Plain");
        assert_eq!(format!("{:?}", LogFormat::Json), "Json");
    }

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.max_redirect_count, 0);
        assert!(config.follow_redirects);
        assert!(config.ignore_eof_error);
        assert!(!config.disable_cache);
        assert!(!config.interceptor_on_redirect);
        assert_eq!(config.block_size, 0);
        assert!(config.connect_timeout.is_none());
        assert!(config.read_timeout.is_none());
        assert!(config.proxy.is_none());
        assert!(config.request_interceptors.is_empty());
    }

    #[test]
    fn test_set_timeout_applies_to_both_phases() {
        let mut config = HttpConfig::default();
        config.set_timeout(Some(Duration::from_millis(1500)));
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.read_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_allows_redirect_respects_cap_and_flag() {
        let mut config = HttpConfig {
            max_redirect_count: 2,
            ..Default::default()
        };
        assert!(config.allows_redirect(0));
        assert!(config.allows_redirect(1));
        assert!(!config.allows_redirect(2));

        config.follow_redirects = false;
        assert!(!config.allows_redirect(0));
    }
}
