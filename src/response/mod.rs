//! Response pipeline.
//!
//! A [`Response`] is created once the status line and headers are read. In
//! sync mode the body is read into memory before the caller sees it; in async
//! mode the body stays on the wire, and the connection stays open, until the
//! caller reads or closes it.

mod body;
mod decode;
mod head;

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use url::Url;

use crate::charset::{label_from_content_type, sniff_meta_charset, Charset};
use crate::config::{COPY_BUFFER_SIZE, ERROR_BODY_TEMPLATE, REDIRECT_STATUS_CODES};
use crate::connection::Connection;
use crate::cookie::parse_set_cookie;
use crate::error_handling::{classify_body_error, is_premature_eof, HttpError};
use crate::header::{names, HeaderMap};
use crate::method::Method;

use body::{framing, ChunkedReader, Framing, LengthReader, UntilCloseReader};
pub use decode::{BodyStream, ContentDecoder, DecoderRegistry, DeflateDecoder, GzipDecoder};
pub(crate) use head::{read_head, ResponseHead};

static DISPOSITION_FILENAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)filename="(.*?)""#).ok());

/// Settings the request pipeline hands to a new [`Response`].
pub(crate) struct ResponseOptions<'a> {
    pub(crate) method: Method,
    pub(crate) charset: Charset,
    pub(crate) decoders: &'a DecoderRegistry,
    pub(crate) ignore_eof: bool,
    pub(crate) is_async: bool,
}

enum BodyState {
    Pending(BodyStream),
    Materialized(Vec<u8>),
    Closed,
}

/// An HTTP response.
pub struct Response {
    status: u16,
    reason: String,
    version: u8,
    headers: HeaderMap,
    url: Url,
    charset: Charset,
    declared_charset: Option<String>,
    body: BodyState,
    connection: Option<Connection>,
    ignore_eof: bool,
    is_async: bool,
}

impl Response {
    /// Builds a response around a parsed head, taking over `connection`.
    pub(crate) fn new(
        mut connection: Connection,
        head: ResponseHead,
        options: &ResponseOptions<'_>,
    ) -> Result<Self, HttpError> {
        let url = connection.url().clone();
        let framing = framing(options.method, head.status, &head.headers)?;
        let declared_charset = head
            .headers
            .get(names::CONTENT_TYPE)
            .and_then(label_from_content_type)
            .map(str::to_string);
        let charset = declared_charset
            .as_deref()
            .and_then(Charset::try_for_label)
            .unwrap_or(options.charset);

        let stream: BodyStream = match framing {
            Framing::Empty => {
                if head.status >= 400 && !options.method.ignores_response_body() {
                    let synthetic = format!("{ERROR_BODY_TEMPLATE}{}", head.status);
                    Box::new(Cursor::new(synthetic.into_bytes()))
                } else {
                    Box::new(io::empty())
                }
            }
            framed => {
                let raw = connection.take_stream().ok_or_else(|| {
                    HttpError::Io(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "connection closed before the body was read",
                    ))
                })?;
                let raw: BodyStream = match framed {
                    Framing::Length(length) => Box::new(LengthReader::new(raw, length)),
                    Framing::Chunked => Box::new(ChunkedReader::new(raw)),
                    _ => Box::new(UntilCloseReader::new(raw)),
                };
                options
                    .decoders
                    .wrap(head.headers.get(names::CONTENT_ENCODING), raw)
            }
        };
        debug!(
            "Response {} {} from {} ({:?})",
            head.status, head.reason, url, framing
        );

        Ok(Self {
            status: head.status,
            reason: head.reason,
            version: head.version,
            headers: head.headers,
            url,
            charset,
            declared_charset,
            body: BodyState::Pending(stream),
            connection: Some(connection),
            ignore_eof: options.ignore_eof,
            is_async: options.is_async,
        })
    }

    /// Status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase from the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// `HTTP/1.0` or `HTTP/1.1`.
    pub fn version(&self) -> &'static str {
        if self.version == 0 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        }
    }

    /// Whether the status is 2xx.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is one that redirects to `Location`.
    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUS_CODES.contains(&self.status)
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers, for response interceptors.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// URL this response was received from (the last hop's URL).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Charset used by [`Response::text`] when the content declares none.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// `Content-Encoding` header value.
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers.get(names::CONTENT_ENCODING)
    }

    /// Whether the body was sent gzip-compressed.
    pub fn is_gzip(&self) -> bool {
        self.content_encoding()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case("gzip"))
    }

    /// Whether the body was sent deflate-compressed.
    pub fn is_deflate(&self) -> bool {
        self.content_encoding()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case("deflate"))
    }

    /// Whether the body was sent with chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        body::is_chunked(&self.headers)
    }

    /// Raw value of the first `Set-Cookie` header.
    pub fn cookie_str(&self) -> Option<&str> {
        self.headers.get(names::SET_COOKIE)
    }

    /// `name=value` pairs of every `Set-Cookie` header.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(names::SET_COOKIE)
            .into_iter()
            .filter_map(parse_set_cookie)
            .collect()
    }

    /// Value of the cookie `name` set by this response.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Whether the body is still on the wire.
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Reads the whole body into memory and closes the connection.
    ///
    /// Does nothing when the body was already read. A premature end of stream
    /// keeps the partial body when EOF errors are ignored.
    ///
    /// # Errors
    ///
    /// [`HttpError::TransientRead`] for a truncated body when EOF errors are
    /// not ignored, [`HttpError::Protocol`] for broken chunk framing, and
    /// [`HttpError::Io`] for other read failures. The connection is closed on
    /// every path.
    pub fn sync(&mut self) -> Result<&mut Self, HttpError> {
        if let BodyState::Pending(stream) = std::mem::replace(&mut self.body, BodyState::Closed) {
            let mut stream = stream;
            let mut bytes = Vec::new();
            let result = self.drain(&mut stream, &mut bytes);
            drop(stream);
            self.disconnect();
            result?;
            self.body = BodyState::Materialized(bytes);
        }
        self.is_async = false;
        Ok(self)
    }

    /// Body bytes, reading them first if needed.
    pub fn body_bytes(&mut self) -> Result<&[u8], HttpError> {
        self.sync()?;
        Ok(self.materialized())
    }

    /// Body decoded as text.
    ///
    /// A charset declared in `Content-Type` is used when present; otherwise a
    /// `<meta>` charset in the content wins over the request charset.
    ///
    /// # Errors
    ///
    /// [`HttpError::Encoding`] when the declared charset is unknown, plus any
    /// error from [`Response::sync`].
    pub fn text(&mut self) -> Result<String, HttpError> {
        self.sync()?;
        let charset = match self.declared_charset.as_deref() {
            Some(label) => Charset::for_label(label)?,
            None => sniff_meta_charset(self.materialized()).unwrap_or(self.charset),
        };
        Ok(charset.decode(self.materialized()).into_owned())
    }

    /// Reader over the body: the live stream in async mode, the buffered
    /// bytes otherwise. A live stream can be taken only once.
    pub fn body_reader(&mut self) -> BodyReader<'_> {
        match std::mem::replace(&mut self.body, BodyState::Closed) {
            BodyState::Pending(stream) => BodyReader::Live {
                stream,
                _connection: self.connection.take(),
            },
            BodyState::Materialized(bytes) => {
                self.body = BodyState::Materialized(bytes);
                BodyReader::Buffered(Cursor::new(self.materialized()))
            }
            BodyState::Closed => BodyReader::Buffered(Cursor::new(&[][..])),
        }
    }

    /// Copies the body to `out`, streaming it when it has not been read yet.
    /// Returns the number of bytes written.
    pub fn write_body<W: Write>(&mut self, out: &mut W) -> Result<u64, HttpError> {
        match std::mem::replace(&mut self.body, BodyState::Closed) {
            BodyState::Pending(stream) => {
                let mut stream = stream;
                let mut sink = CountingWriter { inner: out, count: 0 };
                let result = self.drain(&mut stream, &mut sink);
                drop(stream);
                self.disconnect();
                result?;
                sink.inner.flush()?;
                Ok(sink.count)
            }
            BodyState::Materialized(bytes) => {
                out.write_all(&bytes)?;
                out.flush()?;
                let len = bytes.len() as u64;
                self.body = BodyState::Materialized(bytes);
                Ok(len)
            }
            BodyState::Closed => Ok(0),
        }
    }

    /// Writes the body to a file and returns its path.
    ///
    /// When `path` is an existing directory the file name is taken from
    /// `Content-Disposition`, else from the last URL path segment.
    pub fn write_body_to_path(&mut self, path: impl AsRef<Path>) -> Result<PathBuf, HttpError> {
        let mut target = path.as_ref().to_path_buf();
        if target.is_dir() {
            target.push(self.complete_file_name());
        }
        let mut file = File::create(&target)?;
        self.write_body(&mut file)?;
        debug!("Wrote response body of {} to {}", self.url, target.display());
        Ok(target)
    }

    /// File name suggested for saving the body.
    pub fn complete_file_name(&self) -> String {
        let from_disposition = self
            .headers
            .get(names::CONTENT_DISPOSITION)
            .and_then(|value| {
                DISPOSITION_FILENAME
                    .as_ref()?
                    .captures(value)?
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
            })
            .filter(|name| !name.is_empty());
        if let Some(name) = from_disposition {
            return name;
        }
        self.url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string)
            .or_else(|| self.url.host_str().map(str::to_string))
            .unwrap_or_else(|| "download".to_string())
    }

    /// Closes the connection, discarding any unread body.
    pub fn close(&mut self) {
        if let BodyState::Pending(_) = self.body {
            self.body = BodyState::Closed;
        }
        self.disconnect();
    }

    fn drain<W: Write + ?Sized>(&self, stream: &mut BodyStream, out: &mut W) -> Result<(), HttpError> {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0usize;
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    out.write_all(&buf[..n])?;
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_premature_eof(&e) && self.ignore_eof => {
                    warn!(
                        "Ignoring premature end of body from {} after {} bytes: {}",
                        self.url, total, e
                    );
                    return Ok(());
                }
                Err(e) => return Err(classify_body_error(e, total)),
            }
        }
    }

    fn materialized(&self) -> &[u8] {
        match &self.body {
            BodyState::Materialized(bytes) => bytes,
            _ => &[],
        }
    }

    fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect_quietly();
        }
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            BodyState::Pending(_) => "pending".to_string(),
            BodyState::Materialized(bytes) => format!("{} bytes", bytes.len()),
            BodyState::Closed => "closed".to_string(),
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("charset", &self.charset)
            .field("body", &body)
            .finish()
    }
}

/// Reader returned by [`Response::body_reader`].
pub enum BodyReader<'a> {
    /// Body still on the wire; the connection closes when this is dropped.
    Live {
        /// Decoded body stream.
        stream: BodyStream,
        /// Keeps the socket open while the stream is read.
        _connection: Option<Connection>,
    },
    /// Body already in memory.
    Buffered(Cursor<&'a [u8]>),
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BodyReader::Live { stream, .. } => stream.read(buf),
            BodyReader::Buffered(cursor) => cursor.read(buf),
        }
    }
}

struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectOptions, TlsOptions};
    use crate::error_handling::ErrorKind;
    use std::net::{Shutdown, TcpListener};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// Connects to a server that writes `sent`, optionally half-closes, and
    /// then reports whether the client closed its side within five seconds.
    fn connected(sent: &'static [u8], half_close: bool) -> (Connection, JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .expect("timeout");
            stream.write_all(sent).expect("write");
            if half_close {
                stream.shutdown(Shutdown::Write).expect("shutdown");
            }
            let mut buf = [0u8; 64];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => return true,
                    Ok(_) => continue,
                    Err(e) => {
                        return matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                        )
                    }
                }
            }
        });
        let url = Url::parse(&format!("http://{addr}/file.bin")).expect("url");
        let tls = TlsOptions::default();
        let options = ConnectOptions {
            proxy: None,
            connect_timeout: Some(Duration::from_secs(2)),
            read_timeout: Some(Duration::from_secs(5)),
            tls: &tls,
            proxy_authorization: None,
        };
        let connection = Connection::open(&url, Method::Get, &options).expect("open");
        (connection, server)
    }

    fn live_response(connection: Connection, content_length: usize, ignore_eof: bool) -> Response {
        let mut headers = HeaderMap::new();
        headers.append(names::CONTENT_LENGTH, content_length.to_string());
        let head = ResponseHead {
            status: 200,
            reason: "OK".to_string(),
            version: 1,
            headers,
        };
        let decoders = DecoderRegistry::default();
        let options = ResponseOptions {
            method: Method::Get,
            charset: Charset::default(),
            decoders: &decoders,
            ignore_eof,
            is_async: true,
        };
        Response::new(connection, head, &options).expect("response")
    }

    fn still_connected(response: &Response) -> bool {
        response
            .connection
            .as_ref()
            .is_some_and(Connection::is_connected)
    }

    #[test]
    fn test_sync_closes_connection() {
        let (connection, server) = connected(b"hello", false);
        let mut response = live_response(connection, 5, true);
        assert!(still_connected(&response));

        response.sync().expect("sync");
        assert!(response.connection.is_none());
        assert!(!response.is_async());
        assert!(server.join().expect("server"), "socket left open");

        // Later calls find nothing left to close
        response.sync().expect("second sync");
        response.close();
        assert_eq!(response.body_bytes().expect("body"), b"hello");
    }

    #[test]
    fn test_write_body_closes_connection() {
        let (connection, server) = connected(b"hello", false);
        let mut response = live_response(connection, 5, true);
        let mut out = Vec::new();
        assert_eq!(response.write_body(&mut out).expect("write"), 5);
        assert_eq!(out, b"hello");
        assert!(response.connection.is_none());
        assert!(server.join().expect("server"), "socket left open");
    }

    #[test]
    fn test_close_discards_unread_body() {
        let (connection, server) = connected(b"hello", false);
        let mut response = live_response(connection, 100, true);
        response.close();
        assert!(response.connection.is_none());
        assert!(server.join().expect("server"), "socket left open");
        response.close();
        assert!(response.body_bytes().expect("body").is_empty());
    }

    #[test]
    fn test_failed_sync_still_closes_connection() {
        let (connection, server) = connected(b"abcd", true);
        let mut response = live_response(connection, 10, false);
        let err = response.sync().expect_err("body is short");
        assert_eq!(err.kind(), ErrorKind::TransientRead);
        assert!(response.connection.is_none());
        assert!(server.join().expect("server"), "socket left open");
    }

    #[test]
    fn test_body_reader_owns_connection_until_dropped() {
        let (connection, server) = connected(b"hello", false);
        let mut response = live_response(connection, 5, true);
        let mut reader = response.body_reader();
        let mut body = String::new();
        reader.read_to_string(&mut body).expect("read");
        assert_eq!(body, "hello");
        drop(reader);
        assert!(response.connection.is_none());
        assert!(server.join().expect("server"), "socket left open");
    }

    #[test]
    fn test_drop_closes_connection() {
        let (connection, server) = connected(b"hello", false);
        drop(live_response(connection, 5, true));
        assert!(server.join().expect("server"), "socket left open");
    }
}
