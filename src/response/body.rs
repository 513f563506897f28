//! Response body framing.
//!
//! Picks how the body is delimited on the wire and provides the readers that
//! enforce it. Readers report a body that ends early as an `UnexpectedEof`
//! carrying [`PrematureEof`], and a broken chunk header as `InvalidData`
//! carrying [`MalformedChunk`].

use std::io::{self, BufRead, Read};

use crate::config::MAX_CHUNK_LINE_BYTES;
use crate::error_handling::{is_premature_eof, HttpError, MalformedChunk, PrematureEof};
use crate::header::{names, HeaderMap};
use crate::method::Method;

/// How a response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// No body on the wire.
    Empty,
    /// Exactly this many bytes.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the server closes the connection.
    UntilClose,
}

/// Determines the framing of a response to `method`.
pub(crate) fn framing(method: Method, status: u16, headers: &HeaderMap) -> Result<Framing, HttpError> {
    if method.ignores_response_body() || (100..200).contains(&status) || status == 204 || status == 304 {
        return Ok(Framing::Empty);
    }
    if is_chunked(headers) {
        return Ok(Framing::Chunked);
    }
    if let Some(value) = headers.get(names::CONTENT_LENGTH) {
        let length = value
            .trim()
            .parse::<u64>()
            .map_err(|_| HttpError::Protocol(format!("invalid Content-Length '{value}'")))?;
        return Ok(if length == 0 {
            Framing::Empty
        } else {
            Framing::Length(length)
        });
    }
    Ok(Framing::UntilClose)
}

/// Whether the final transfer coding is `chunked`.
pub(crate) fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(names::TRANSFER_ENCODING)
        .into_iter()
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Reads exactly `length` bytes.
pub(crate) struct LengthReader<R> {
    inner: R,
    expected: u64,
    received: u64,
}

impl<R: Read> LengthReader<R> {
    pub(crate) fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            expected,
            received: 0,
        }
    }

    fn premature(&self) -> io::Error {
        PrematureEof {
            expected: Some(self.expected),
            received: self.received,
        }
        .into_io()
    }
}

impl<R: Read> Read for LengthReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.expected - self.received;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = remaining.min(buf.len() as u64) as usize;
        let n = match self.inner.read(&mut buf[..max]) {
            Ok(n) => n,
            Err(e) if is_premature_eof(&e) => return Err(self.premature()),
            Err(e) => return Err(e),
        };
        if n == 0 {
            return Err(self.premature());
        }
        self.received += n as u64;
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Trailers,
    Done,
}

/// Decodes a chunked body.
pub(crate) struct ChunkedReader<R> {
    inner: R,
    state: ChunkState,
    received: u64,
}

impl<R: BufRead> ChunkedReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            state: ChunkState::Size,
            received: 0,
        }
    }

    fn premature(&self) -> io::Error {
        PrematureEof {
            expected: None,
            received: self.received,
        }
        .into_io()
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = match (&mut self.inner)
            .take(MAX_CHUNK_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)
        {
            Ok(n) => n,
            Err(e) if is_premature_eof(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        if n == 0 {
            return Ok(None);
        }
        if !line.ends_with(b"\n") {
            if line.len() >= MAX_CHUNK_LINE_BYTES {
                return Err(MalformedChunk("chunk line too long".to_string()).into_io());
            }
            return Ok(None);
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(Some(line))
    }

    fn read_size(&mut self) -> io::Result<u64> {
        let line = self.read_line()?.ok_or_else(|| self.premature())?;
        let text = String::from_utf8_lossy(&line);
        let size_text = text.split(';').next().unwrap_or("").trim();
        u64::from_str_radix(size_text, 16)
            .map_err(|_| MalformedChunk(format!("invalid chunk size '{size_text}'")).into_io())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                ChunkState::Done => return Ok(0),
                ChunkState::Size => {
                    let size = self.read_size()?;
                    self.state = if size == 0 {
                        ChunkState::Trailers
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    let max = remaining.min(buf.len() as u64) as usize;
                    let n = match self.inner.read(&mut buf[..max]) {
                        Ok(n) => n,
                        Err(e) if is_premature_eof(&e) => return Err(self.premature()),
                        Err(e) => return Err(e),
                    };
                    if n == 0 {
                        return Err(self.premature());
                    }
                    self.received += n as u64;
                    let left = remaining - n as u64;
                    self.state = if left == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(left)
                    };
                    return Ok(n);
                }
                ChunkState::DataEnd => {
                    let line = self.read_line()?.ok_or_else(|| self.premature())?;
                    if !line.is_empty() {
                        return Err(MalformedChunk("missing CRLF after chunk data".to_string()).into_io());
                    }
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailers => {
                    // A stream that closes instead of sending the final CRLF still
                    // delivered every chunk.
                    match self.read_line()? {
                        Some(line) if !line.is_empty() => continue,
                        _ => self.state = ChunkState::Done,
                    }
                }
            }
        }
    }
}

/// Reads until the peer closes the connection.
///
/// A TLS peer that closes without `close_notify` ends the body normally.
pub(crate) struct UntilCloseReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> UntilCloseReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, done: false }
    }
}

impl<R: Read> Read for UntilCloseReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(0) => {
                self.done = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if is_premature_eof(&e) => {
                self.done = true;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{classify_body_error, ErrorKind};
    use std::io::Cursor;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name, *value);
        }
        map
    }

    fn read_all<R: Read>(mut reader: R) -> (Vec<u8>, Option<io::Error>) {
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return (out, None),
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) => return (out, Some(e)),
            }
        }
    }

    #[test]
    fn test_framing_rules() {
        let none = HeaderMap::new();
        assert_eq!(framing(Method::Head, 200, &headers(&[("Content-Length", "5")])).ok(), Some(Framing::Empty));
        assert_eq!(framing(Method::Get, 204, &none).ok(), Some(Framing::Empty));
        assert_eq!(framing(Method::Get, 304, &none).ok(), Some(Framing::Empty));
        assert_eq!(
            framing(Method::Get, 200, &headers(&[("Transfer-Encoding", "chunked"), ("Content-Length", "5")])).ok(),
            Some(Framing::Chunked)
        );
        assert_eq!(framing(Method::Get, 200, &headers(&[("Content-Length", " 42 ")])).ok(), Some(Framing::Length(42)));
        assert_eq!(framing(Method::Get, 200, &headers(&[("Content-Length", "0")])).ok(), Some(Framing::Empty));
        assert_eq!(framing(Method::Get, 200, &none).ok(), Some(Framing::UntilClose));
        assert!(framing(Method::Get, 200, &headers(&[("Content-Length", "abc")])).is_err());
    }

    #[test]
    fn test_is_chunked_uses_final_coding() {
        assert!(is_chunked(&headers(&[("Transfer-Encoding", "gzip, Chunked")])));
        assert!(!is_chunked(&headers(&[("Transfer-Encoding", "chunked, gzip")])));
        assert!(!is_chunked(&HeaderMap::new()));
    }

    #[test]
    fn test_length_reader() {
        let (body, err) = read_all(LengthReader::new(Cursor::new(b"hello world".to_vec()), 5));
        assert_eq!(body, b"hello");
        assert!(err.is_none());
    }

    #[test]
    fn test_length_reader_short_body() {
        let (body, err) = read_all(LengthReader::new(Cursor::new(b"abc".to_vec()), 10));
        assert_eq!(body, b"abc");
        let err = err.expect("premature eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(classify_body_error(err, 3).kind(), ErrorKind::TransientRead);
    }

    #[test]
    fn test_chunked_reader() {
        let wire = b"5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\nX-Trailer: t\r\n\r\nNEXT";
        let mut inner = Cursor::new(wire.to_vec());
        let (body, err) = read_all(ChunkedReader::new(&mut inner));
        assert_eq!(body, b"hello world");
        assert!(err.is_none());
        let mut rest = String::new();
        inner.read_to_string(&mut rest).expect("rest");
        assert_eq!(rest, "NEXT");
    }

    #[test]
    fn test_chunked_reader_premature_eof() {
        let wire = b"A\r\n0123";
        let (body, err) = read_all(ChunkedReader::new(Cursor::new(wire.to_vec())));
        assert_eq!(body, b"0123");
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_chunked_reader_eof_between_chunks() {
        let wire = b"3\r\nabc\r\n";
        let (body, err) = read_all(ChunkedReader::new(Cursor::new(wire.to_vec())));
        assert_eq!(body, b"abc");
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_chunked_reader_missing_final_crlf_is_complete() {
        let wire = b"3\r\nabc\r\n0\r\n";
        let (body, err) = read_all(ChunkedReader::new(Cursor::new(wire.to_vec())));
        assert_eq!(body, b"abc");
        assert!(err.is_none());
    }

    #[test]
    fn test_chunked_reader_malformed_size() {
        let (_, err) = read_all(ChunkedReader::new(Cursor::new(b"zz\r\nabc\r\n".to_vec())));
        let err = err.expect("malformed");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(classify_body_error(err, 0).kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_until_close_reader_treats_unexpected_eof_as_end() {
        struct TruncatedTls(Option<Vec<u8>>);
        impl Read for TruncatedTls {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.take() {
                    Some(data) => {
                        buf[..data.len()].copy_from_slice(&data);
                        Ok(data.len())
                    }
                    None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no close_notify")),
                }
            }
        }
        let mut reader = UntilCloseReader::new(TruncatedTls(Some(b"xy".to_vec())));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).expect("read");
        assert_eq!(out, b"xy");
    }
}
