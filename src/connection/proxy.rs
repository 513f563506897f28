//! HTTP proxy support.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;

use log::debug;

use crate::config::{MAX_HEADER_BLOCK_BYTES, MAX_RESPONSE_HEADERS};

/// An HTTP proxy reached over plain TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    host: String,
    port: u16,
}

impl Proxy {
    /// Proxy at `host:port`.
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Proxy port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Asks the proxy on `tcp` to open a tunnel to `target` (`host:port`).
///
/// Fails when the proxy answers with anything other than 2xx.
pub(crate) fn establish_tunnel(
    tcp: &mut TcpStream,
    target: &str,
    proxy_authorization: Option<&str>,
) -> io::Result<()> {
    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some(auth) = proxy_authorization {
        request.push_str("Proxy-Authorization: ");
        request.push_str(auth);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    tcp.write_all(request.as_bytes())?;
    tcp.flush()?;

    // Read byte by byte so nothing past the head (the TLS handshake) is consumed.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_HEADER_BLOCK_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "proxy CONNECT response head too large",
            ));
        }
        if tcp.read(&mut byte)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed the connection during CONNECT",
            ));
        }
        head.push(byte[0]);
    }

    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    response
        .parse(&head)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let code = response.code.unwrap_or(0);
    if !(200..300).contains(&code) {
        return Err(io::Error::other(format!(
            "proxy refused tunnel to {target}: {code} {}",
            response.reason.unwrap_or("")
        )));
    }
    debug!("Proxy tunnel to {target} established");
    Ok(())
}
