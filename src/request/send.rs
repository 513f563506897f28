//! One send attempt: connect, write the request, read the response head.

use std::io::{self, BufWriter, Write};

use log::{debug, trace};
use url::Url;

use super::Request;
use crate::config::{CONTENT_TYPE_FORM_URLENCODED, DEFAULT_CHUNK_BLOCK_SIZE};
use crate::connection::{ConnectOptions, Connection};
use crate::cookie::CookiePolicy;
use crate::encode::{content_type, encode_pairs, ChunkedWriter, MultipartEncoder};
use crate::error_handling::HttpError;
use crate::header::{names, HeaderMap};
use crate::response::{read_head, Response, ResponseOptions};

/// Body as it goes on the wire.
enum Outgoing<'a> {
    Nothing,
    Bytes(&'a [u8]),
    Encoded(Vec<u8>),
    Multipart(MultipartEncoder<'a>),
}

impl Outgoing<'_> {
    fn write_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        match self {
            Outgoing::Nothing => Ok(()),
            Outgoing::Bytes(bytes) => out.write_all(bytes),
            Outgoing::Encoded(bytes) => out.write_all(bytes),
            Outgoing::Multipart(encoder) => encoder.write_to(out),
        }
    }
}

/// Sends `request` to its current URL and returns the response with the body
/// still unread. Redirects are not followed here.
///
/// # Errors
///
/// [`HttpError::InvalidHeader`] before anything is sent when a header would
/// break the request head, [`HttpError::Connection`] when the connection
/// cannot be opened,
/// [`HttpError::Io`] when writing the request fails, and
/// [`HttpError::Protocol`] when the response head does not parse. The
/// connection is closed before any error is returned.
pub(crate) fn send_once(request: &mut Request, is_async: bool) -> Result<Response, HttpError> {
    let url = request.effective_url();
    let https = url.scheme() == "https";
    let tunneled = https && request.config.proxy.is_some();

    let mut headers = HeaderMap::new();
    if !request.headers.contains(names::HOST) {
        headers.set(names::HOST, host_header(&url));
    }
    headers.merge_from(&request.headers, true);
    apply_cookie_policy(request, &url, &mut headers);
    if request.config.disable_cache {
        headers.set(names::CACHE_CONTROL, "no-cache");
        headers.set(names::PRAGMA, "no-cache");
    }
    headers.check_wire_safe()?;

    let proxy_authorization = if tunneled {
        headers.remove(names::PROXY_AUTHORIZATION).into_iter().next()
    } else {
        None
    };
    let options = ConnectOptions {
        proxy: request.config.proxy.as_ref(),
        connect_timeout: request.config.connect_timeout,
        read_timeout: request.config.read_timeout,
        tls: &request.config.tls,
        proxy_authorization: proxy_authorization.as_deref(),
    };
    let mut connection = Connection::open(&url, request.method, &options)?;

    let block_size = request.config.block_size;
    let charset = request.charset;
    let sends_body = request.sends_body();
    let (mut outgoing, chunk_block) = if !sends_body {
        headers.remove(names::CONTENT_LENGTH);
        headers.remove(names::TRANSFER_ENCODING);
        (Outgoing::Nothing, None)
    } else if let Some(body) = request.body.as_deref() {
        let chunk = frame(&mut headers, Some(body.len() as u64), block_size);
        (Outgoing::Bytes(body), chunk)
    } else if let Some(form) = request.form.as_mut().filter(|f| f.has_parts()) {
        let encoder = MultipartEncoder::new(form, charset);
        headers.set(names::CONTENT_TYPE, encoder.content_type());
        let chunk = frame(&mut headers, encoder.content_length(), block_size);
        (Outgoing::Multipart(encoder), chunk)
    } else if let Some(form) = request.form.as_ref().filter(|f| !f.is_empty()) {
        let encoded = encode_pairs(form.text_pairs(), charset).into_bytes();
        headers.set_if_absent(
            names::CONTENT_TYPE,
            content_type::with_charset(CONTENT_TYPE_FORM_URLENCODED, charset.name()),
        );
        let chunk = frame(&mut headers, Some(encoded.len() as u64), block_size);
        (Outgoing::Encoded(encoded), chunk)
    } else {
        headers.remove(names::TRANSFER_ENCODING);
        headers.set(names::CONTENT_LENGTH, "0");
        (Outgoing::Nothing, None)
    };

    let mut head = format!(
        "{} {} HTTP/1.1\r\n",
        request.method,
        connection.request_target()
    );
    headers.write_lines(&mut head);
    head.push_str("\r\n");
    debug!("Sending {} {}", request.method, url);
    trace!("Request head for {}:\n{}", url, head.trim_end());

    if let Err(e) = write_request(&mut connection, head.as_bytes(), &mut outgoing, chunk_block) {
        connection.disconnect_quietly();
        return Err(HttpError::Io(e));
    }
    drop(outgoing);

    let parsed = connection
        .reader()
        .map_err(HttpError::Io)
        .and_then(read_head);
    let response_head = match parsed {
        Ok(head) => head,
        Err(e) => {
            connection.disconnect_quietly();
            return Err(e);
        }
    };
    trace!(
        "Response head from {}: {} {} {:?}",
        url,
        response_head.status,
        response_head.reason,
        response_head.headers
    );

    if let Some(store) = request.context.cookie_store() {
        store.store_response_cookies(&url, response_head.headers.get_all(names::SET_COOKIE));
    }

    Response::new(
        connection,
        response_head,
        &ResponseOptions {
            method: request.method,
            charset,
            decoders: request.context.decoders(),
            ignore_eof: request.config.ignore_eof_error,
            is_async,
        },
    )
}

/// Picks `Content-Length` or chunked framing. Returns the chunk block size
/// when the body goes out chunked.
fn frame(headers: &mut HeaderMap, length: Option<u64>, block_size: usize) -> Option<usize> {
    match length {
        Some(length) if block_size == 0 => {
            headers.remove(names::TRANSFER_ENCODING);
            headers.set(names::CONTENT_LENGTH, length.to_string());
            None
        }
        _ => {
            headers.remove(names::CONTENT_LENGTH);
            headers.set(names::TRANSFER_ENCODING, "chunked");
            Some(if block_size > 0 {
                block_size
            } else {
                DEFAULT_CHUNK_BLOCK_SIZE
            })
        }
    }
}

fn apply_cookie_policy(request: &Request, url: &Url, headers: &mut HeaderMap) {
    match &request.cookie {
        CookiePolicy::Default => {
            let stored = request
                .context
                .cookie_store()
                .and_then(|store| store.get_for_url(url));
            if let Some(cookie) = stored {
                headers.set_if_absent(names::COOKIE, cookie);
            }
        }
        CookiePolicy::Explicit(cookie) => headers.set(names::COOKIE, cookie.clone()),
        CookiePolicy::Disabled => {
            headers.remove(names::COOKIE);
        }
    }
}

fn write_request(
    connection: &mut Connection,
    head: &[u8],
    body: &mut Outgoing<'_>,
    chunk_block: Option<usize>,
) -> io::Result<()> {
    let mut out = BufWriter::new(connection.writer()?);
    out.write_all(head)?;
    match chunk_block {
        Some(block_size) => {
            let mut chunked = ChunkedWriter::new(&mut out, block_size);
            body.write_to(&mut chunked)?;
            chunked.finish()?;
        }
        None => body.write_to(&mut out)?,
    }
    out.flush()
}

/// `Host` value: the host, plus the port when it is not the scheme default.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
