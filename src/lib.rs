//! courier library: a blocking HTTP/1.x client
//!
//! This library builds requests, writes urlencoded or multipart bodies, talks
//! HTTP/1.1 over plain TCP or rustls (directly or through an HTTP proxy),
//! follows redirects in a bounded loop, and decodes gzip or deflate responses
//! either eagerly or as a live stream.
//!
//! State that requests share (default headers, timeouts, cookie store,
//! interceptors, content decoders) lives in an explicit [`ClientContext`].
//!
//! # Example
//!
//! ```no_run
//! use courier::ClientContext;
//!
//! # fn main() -> Result<(), courier::HttpError> {
//! let context = ClientContext::new();
//! let mut response = context
//!     .post("http://localhost:8080/upload")?
//!     .form("title", "report")
//!     .form_file("attachment", "report.pdf")
//!     .set_follow_redirects(true)
//!     .execute()?;
//!
//! println!("{} {}", response.status(), response.text()?);
//! # Ok(())
//! # }
//! ```
//!
//! Each attempt, including each redirect hop, uses its own connection; there
//! is no connection pool.

#![warn(missing_docs)]

pub mod charset;
pub mod config;
pub mod connection;
mod context;
pub mod cookie;
pub mod encode;
mod error_handling;
pub mod header;
pub mod initialization;
pub mod interceptor;
mod method;
pub mod redirect;
mod request;
pub mod response;

// Re-export public API
pub use charset::Charset;
pub use config::{HttpConfig, LogFormat, LogLevel};
pub use connection::{Proxy, SocketFactory, TlsOptions, TlsProtocol};
pub use context::{ClientContext, ClientContextBuilder};
pub use cookie::{CookiePolicy, CookieStore};
pub use encode::{Form, MultipartPart};
pub use error_handling::{ErrorKind, HttpError, InitializationError};
pub use header::HeaderMap;
pub use interceptor::{Interceptor, InterceptorChain};
pub use method::Method;
pub use request::Request;
pub use response::{BodyReader, DecoderRegistry, Response};
