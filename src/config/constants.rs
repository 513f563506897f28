//! Configuration constants.
//!
//! This module defines the defaults applied by [`crate::ClientContext`] and the
//! request pipeline: default headers, redirect limits, framing sizes and the
//! multipart boundary layout.

/// Default User-Agent sent with every request unless the context or the
/// request overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Default `Accept` header value.
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/json,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Compression advertised to servers.
/// Only gzip is advertised; deflate is still decoded when a server sends it.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip";

/// Charset label used for request bodies and as the response fallback.
pub const DEFAULT_CHARSET: &str = "UTF-8";

// Redirect handling
/// Redirect hops followed when nothing else is configured.
/// Zero means 3xx responses are handed back to the caller untouched.
pub const DEFAULT_MAX_REDIRECT_COUNT: usize = 0;
/// Hop cap applied when following is switched on while the cap is still zero.
pub const FOLLOW_REDIRECTS_DEFAULT_CAP: usize = 2;
/// Status codes that carry a `Location` worth following.
pub const REDIRECT_STATUS_CODES: &[u16] = &[301, 302, 303, 307, 308];

// Request body framing
/// Block size used for chunked uploads when the body length is unknown and
/// the caller did not pick one.
pub const DEFAULT_CHUNK_BLOCK_SIZE: usize = 4096;
/// Buffer size for streaming file parts and copying response bodies.
pub const COPY_BUFFER_SIZE: usize = 8192;

// Response head limits
/// Maximum size of a status line plus header block (64KB).
pub const MAX_HEADER_BLOCK_BYTES: usize = 64 * 1024;
/// Maximum number of header lines accepted in one response head.
pub const MAX_RESPONSE_HEADERS: usize = 128;
/// Maximum length of a single chunk-size line in a chunked body.
pub const MAX_CHUNK_LINE_BYTES: usize = 4096;

// Multipart
/// Fixed prefix of the per-process multipart boundary.
pub const MULTIPART_BOUNDARY_PREFIX: &str = "--------------------Courier_";
/// Number of random alphanumerics appended to the boundary prefix.
pub const MULTIPART_BOUNDARY_RANDOM_LEN: usize = 16;

// Content types
/// `application/x-www-form-urlencoded`
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `multipart/form-data`
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
/// `application/json`
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `application/xml`
pub const CONTENT_TYPE_XML: &str = "application/xml";
/// Fallback type for file parts whose extension is unknown.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Diagnostic body substituted when an error response carries no body.
pub const ERROR_BODY_TEMPLATE: &str = "Error request, response status: ";
