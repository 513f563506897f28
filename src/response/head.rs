//! Status line and header block parsing.

use std::io::{BufRead, Read};

use log::trace;

use crate::config::{MAX_HEADER_BLOCK_BYTES, MAX_RESPONSE_HEADERS};
use crate::error_handling::HttpError;
use crate::header::HeaderMap;

/// Parsed status line and headers of one response.
#[derive(Debug, Clone)]
pub(crate) struct ResponseHead {
    pub(crate) status: u16,
    pub(crate) reason: String,
    /// Minor version: `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub(crate) version: u8,
    pub(crate) headers: HeaderMap,
}

/// Reads the next final response head from `reader`, skipping interim 1xx
/// responses other than `101 Switching Protocols`.
///
/// # Errors
///
/// [`HttpError::Protocol`] when the stream closes before a complete head, the
/// head exceeds the size or header-count limits, or it does not parse.
pub(crate) fn read_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead, HttpError> {
    loop {
        let raw = read_raw_head(reader)?;
        let head = parse_head(&raw)?;
        if (100..200).contains(&head.status) && head.status != 101 {
            trace!("Skipping interim {} response", head.status);
            continue;
        }
        return Ok(head);
    }
}

fn read_raw_head<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, HttpError> {
    let mut raw = Vec::with_capacity(1024);
    loop {
        let remaining = (MAX_HEADER_BLOCK_BYTES - raw.len()) as u64;
        if remaining == 0 {
            return Err(HttpError::Protocol(format!(
                "response head exceeds {MAX_HEADER_BLOCK_BYTES} bytes"
            )));
        }
        let start = raw.len();
        let n = reader.by_ref().take(remaining).read_until(b'\n', &mut raw)?;
        if n == 0 {
            return Err(HttpError::Protocol(if raw.is_empty() {
                "connection closed before a response was received".to_string()
            } else {
                "connection closed inside the response head".to_string()
            }));
        }
        let line = &raw[start..];
        // Tolerate blank lines before the status line
        if start == 0 && (line == b"\r\n" || line == b"\n") {
            raw.clear();
            continue;
        }
        if line == b"\r\n" || line == b"\n" {
            return Ok(raw);
        }
    }
}

fn parse_head(raw: &[u8]) -> Result<ResponseHead, HttpError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(raw)? {
        httparse::Status::Complete(_) => {}
        httparse::Status::Partial => {
            return Err(HttpError::Protocol("incomplete response head".to_string()))
        }
    }
    let status = response
        .code
        .ok_or_else(|| HttpError::Protocol("missing status code".to_string()))?;
    let mut map = HeaderMap::new();
    for header in response.headers.iter() {
        map.append(header.name, header_value(header.value));
    }
    trace!("Response head: {} {:?}", status, map);
    Ok(ResponseHead {
        status,
        reason: response.reason.unwrap_or("").to_string(),
        version: response.version.unwrap_or(1),
        headers: map,
    })
}

fn header_value(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // ISO-8859-1 maps each byte to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
