//! Request body encoding.
//!
//! This module provides:
//! - Form fields and multipart parts ([`Form`], [`MultipartPart`])
//! - `application/x-www-form-urlencoded` serialization
//! - `multipart/form-data` streaming with a per-process boundary
//! - Chunked transfer framing for bodies of unknown length
//! - Content-Type sniffing and guessing

mod chunked;
pub mod content_type;
mod form;
mod multipart;
mod urlencoded;

pub use chunked::ChunkedWriter;
pub use form::{Form, FormField, FormValue, MultipartPart, PartPayload};
pub use multipart::{boundary, MultipartEncoder};
pub use urlencoded::{append_query, encode_component, encode_pairs};
