//! HTTP request methods.

use std::fmt;

use strum_macros::{EnumIter, EnumString};

/// Request method.
///
/// `Patch` is never written to the wire: a PATCH request goes out as POST
/// with an `X-HTTP-Method-Override: PATCH` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Method {
    /// GET
    #[default]
    #[strum(serialize = "GET")]
    Get,
    /// POST
    #[strum(serialize = "POST")]
    Post,
    /// HEAD
    #[strum(serialize = "HEAD")]
    Head,
    /// OPTIONS
    #[strum(serialize = "OPTIONS")]
    Options,
    /// PUT
    #[strum(serialize = "PUT")]
    Put,
    /// DELETE
    #[strum(serialize = "DELETE")]
    Delete,
    /// TRACE
    #[strum(serialize = "TRACE")]
    Trace,
    /// CONNECT
    #[strum(serialize = "CONNECT")]
    Connect,
    /// PATCH
    #[strum(serialize = "PATCH")]
    Patch,
}

impl Method {
    /// Upper-case token as written in the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
        }
    }

    /// Whether a body is written for this method outside rest mode.
    pub fn sends_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Delete)
    }

    /// Whether any response body is discarded for this method.
    pub fn ignores_response_body(&self) -> bool {
        matches!(
            self,
            Method::Head | Method::Connect | Method::Options | Method::Trace
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
