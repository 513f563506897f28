//! One transport connection per send attempt.

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use url::Url;

use super::proxy::{establish_tunnel, Proxy};
use super::tls::TlsOptions;
use crate::error_handling::HttpError;
use crate::method::Method;

/// Byte stream a request is written to and a response read from.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Settings needed to open a [`Connection`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions<'a> {
    /// HTTP proxy to go through.
    pub proxy: Option<&'a Proxy>,
    /// Timeout per address for the TCP connect; zero means none.
    pub connect_timeout: Option<Duration>,
    /// Timeout for each socket read; zero means none.
    pub read_timeout: Option<Duration>,
    /// Verifier and socket factory for https.
    pub tls: &'a TlsOptions,
    /// `Proxy-Authorization` value sent with a CONNECT tunnel request.
    pub proxy_authorization: Option<&'a str>,
}

/// A connected transport bound to one request attempt.
///
/// Dropping the connection disconnects it.
pub struct Connection {
    url: Url,
    method: Method,
    target: String,
    control: Option<TcpStream>,
    stream: Option<BufReader<Box<dyn Transport>>>,
    absolute_form: bool,
}

impl Connection {
    /// Connects to the host of `url` (or to the proxy) and completes the TLS
    /// handshake for `https`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Connection`] for DNS, connect, timeout, proxy
    /// tunnel and handshake failures.
    pub fn open(url: &Url, method: Method, options: &ConnectOptions<'_>) -> Result<Self, HttpError> {
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::invalid_url(url.as_str(), "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::invalid_url(url.as_str(), "missing port"))?;
        let target = format!("{host}:{port}");
        let https = url.scheme() == "https";

        let (dial_label, addrs) = match options.proxy {
            Some(proxy) => {
                let label = proxy.to_string();
                let addrs = (proxy.host(), proxy.port())
                    .to_socket_addrs()
                    .map(|a| a.collect::<Vec<_>>());
                (label, addrs)
            }
            None => (target.clone(), url.socket_addrs(|| None)),
        };
        let addrs = addrs.map_err(|e| HttpError::connection(dial_label.clone(), e))?;
        let connect_timeout = non_zero(options.connect_timeout);
        let read_timeout = non_zero(options.read_timeout);
        let tcp = dial(&addrs, connect_timeout)
            .map_err(|e| HttpError::connection(dial_label.clone(), e))?;
        let _ = tcp.set_nodelay(true);
        let control = tcp
            .try_clone()
            .map_err(|e| HttpError::connection(dial_label.clone(), e))?;

        let stream: Box<dyn Transport> = if https {
            // Tunnel setup and handshake count as connecting
            set_timeouts(&tcp, connect_timeout.or(read_timeout), connect_timeout)
                .map_err(|e| HttpError::connection(dial_label.clone(), e))?;
            let mut tcp = tcp;
            if options.proxy.is_some() {
                establish_tunnel(&mut tcp, &target, options.proxy_authorization)
                    .map_err(|e| HttpError::connection(dial_label.clone(), e))?;
            }
            let verifier = options.tls.verifier();
            let stream = options
                .tls
                .factory()
                .wrap(host, tcp, verifier, options.tls.protocol)
                .map_err(|e| HttpError::connection(target.clone(), e))?;
            set_timeouts(&control, read_timeout, None)
                .map_err(|e| HttpError::connection(target.clone(), e))?;
            stream
        } else {
            set_timeouts(&tcp, read_timeout, None)
                .map_err(|e| HttpError::connection(dial_label.clone(), e))?;
            Box::new(tcp)
        };

        debug!(
            "Opened {} connection to {}{}",
            url.scheme(),
            target,
            options
                .proxy
                .map(|p| format!(" via proxy {p}"))
                .unwrap_or_default()
        );

        Ok(Self {
            url: url.clone(),
            method,
            target,
            control: Some(control),
            stream: Some(BufReader::new(stream)),
            absolute_form: options.proxy.is_some() && !https,
        })
    }

    /// The URL this connection was opened for.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The method of the request using this connection.
    pub fn method(&self) -> Method {
        self.method
    }

    /// `host:port` of the origin server.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Request target for the request line: the absolute URL when talking
    /// to a plain HTTP proxy, otherwise path and query.
    pub fn request_target(&self) -> String {
        if self.absolute_form {
            let mut url = self.url.clone();
            url.set_fragment(None);
            // Credentials never go on the request line
            let _ = url.set_username("");
            let _ = url.set_password(None);
            return url.to_string();
        }
        let mut target = self.url.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// Whether the request line uses the absolute-form target.
    pub fn is_absolute_form(&self) -> bool {
        self.absolute_form
    }

    /// Stream to write the request to.
    pub fn writer(&mut self) -> io::Result<&mut dyn Write> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.get_mut()),
            None => Err(not_connected()),
        }
    }

    /// Buffered stream to read the response from.
    pub fn reader(&mut self) -> io::Result<&mut BufReader<Box<dyn Transport>>> {
        self.stream.as_mut().ok_or_else(not_connected)
    }

    /// Hands the stream over to a body reader. The connection keeps a handle
    /// that can still shut the socket down.
    pub fn take_stream(&mut self) -> Option<BufReader<Box<dyn Transport>>> {
        self.stream.take()
    }

    /// Whether the connection has not been disconnected yet.
    pub fn is_connected(&self) -> bool {
        self.control.is_some() || self.stream.is_some()
    }

    /// Closes the socket. Safe to call any number of times; errors are
    /// ignored.
    pub fn disconnect_quietly(&mut self) {
        if !self.is_connected() {
            return;
        }
        self.stream = None;
        if let Some(control) = self.control.take() {
            let _ = control.shutdown(Shutdown::Both);
        }
        debug!("Disconnected from {}", self.target);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect_quietly();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn dial(addrs: &[SocketAddr], timeout: Option<Duration>) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {addr} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

/// Socket options are shared by every handle to the socket, so this also
/// applies to streams already handed to a TLS session.
fn set_timeouts(tcp: &TcpStream, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
    tcp.set_read_timeout(read)?;
    tcp.set_write_timeout(write)
}

fn non_zero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|d| !d.is_zero())
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection already closed")
}
