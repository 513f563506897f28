//! Content-Encoding decoders.
//!
//! Decoders are looked up by encoding name in a [`DecoderRegistry`] carried by
//! the client context, so callers can add encodings or replace the built-in
//! gzip and deflate handling.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use log::debug;

/// A response body stream.
pub type BodyStream = Box<dyn Read + Send>;

/// Wraps a raw body stream in a decoding stream.
pub trait ContentDecoder: Send + Sync {
    /// Returns a stream yielding the decoded bytes of `stream`.
    fn wrap(&self, stream: BodyStream) -> BodyStream;
}

impl<F> ContentDecoder for F
where
    F: Fn(BodyStream) -> BodyStream + Send + Sync,
{
    fn wrap(&self, stream: BodyStream) -> BodyStream {
        self(stream)
    }
}

/// `Content-Encoding: gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipDecoder;

impl ContentDecoder for GzipDecoder {
    fn wrap(&self, stream: BodyStream) -> BodyStream {
        Box::new(flate2::read::MultiGzDecoder::new(stream))
    }
}

/// `Content-Encoding: deflate`, decoded as a raw deflate stream without the
/// zlib wrapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateDecoder;

impl ContentDecoder for DeflateDecoder {
    fn wrap(&self, stream: BodyStream) -> BodyStream {
        Box::new(flate2::read::DeflateDecoder::new(stream))
    }
}

/// Decoders keyed by lowercase encoding name.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn ContentDecoder>>,
}

impl DecoderRegistry {
    /// Registry with no decoders; every encoding passes through untouched.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `decoder` for `encoding`, replacing any previous one.
    pub fn register(&mut self, encoding: &str, decoder: impl ContentDecoder + 'static) {
        self.decoders
            .insert(encoding.trim().to_ascii_lowercase(), Arc::new(decoder));
    }

    /// Decoder registered for `encoding`, compared case-insensitively.
    pub fn resolve(&self, encoding: &str) -> Option<Arc<dyn ContentDecoder>> {
        self.decoders
            .get(&encoding.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Whether a decoder is registered for `encoding`.
    pub fn supports(&self, encoding: &str) -> bool {
        self.resolve(encoding).is_some()
    }

    /// Applies the decoders for a `Content-Encoding` header value.
    ///
    /// Codings listed as `a, b` were applied in that order, so they are
    /// undone in reverse. Unknown codings pass through.
    pub fn wrap(&self, content_encoding: Option<&str>, stream: BodyStream) -> BodyStream {
        let Some(value) = content_encoding else {
            return stream;
        };
        let mut stream = stream;
        for coding in value.rsplit(',').map(str::trim).filter(|c| !c.is_empty()) {
            match self.resolve(coding) {
                Some(decoder) => stream = decoder.wrap(stream),
                None if coding.eq_ignore_ascii_case("identity") => {}
                None => debug!("No decoder for content encoding '{coding}', passing through"),
            }
        }
        stream
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("gzip", GzipDecoder);
        registry.register("x-gzip", GzipDecoder);
        registry.register("deflate", DeflateDecoder);
        registry
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("DecoderRegistry")
            .field("encodings", &names)
            .finish()
    }
}
