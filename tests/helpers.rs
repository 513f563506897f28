// Shared test helpers: scripted TCP servers and blocking-call plumbing.
//
// Wiremock covers well-formed exchanges; the scripted servers here give
// byte-level control for truncated bodies, odd framing and wire captures.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Runs a blocking client call off the async test runtime.
#[allow(dead_code)] // Used by other test files
pub async fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// A request as captured by a scripted server.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Captured {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl Captured {
    /// All values of header `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }
}

/// Reads one request (head plus Content-Length or chunked body).
#[allow(dead_code)]
pub fn read_request(stream: &mut TcpStream) -> Captured {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("request line");
    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).expect("header line") == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.trim_end().split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    let mut captured = Captured {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: Vec::new(),
    };
    if captured
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).expect("chunk size");
            let size = usize::from_str_radix(size_line.trim(), 16).expect("hex size");
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).expect("chunk");
            if size == 0 {
                break;
            }
            captured.body.extend_from_slice(&chunk[..size]);
        }
    } else if let Some(length) = captured.header("content-length") {
        let mut body = vec![0u8; length.parse().expect("content length")];
        reader.read_exact(&mut body).expect("body");
        captured.body = body;
    }
    captured
}

/// Serves one connection per reply, in order, and returns what each request
/// carried. Each connection is closed after its reply is written.
#[allow(dead_code)]
pub fn serve_sequence(replies: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .expect("timeout");
            captured.push(read_request(&mut stream));
            stream.write_all(&reply).expect("reply");
            stream.flush().expect("flush");
        }
        captured
    });
    (base, handle)
}

/// Serves a single reply.
#[allow(dead_code)]
pub fn serve_once(reply: impl Into<Vec<u8>>) -> (String, JoinHandle<Captured>) {
    let (base, handle) = serve_sequence(vec![reply.into()]);
    let handle = thread::spawn(move || {
        handle
            .join()
            .expect("server thread")
            .into_iter()
            .next()
            .expect("one request")
    });
    (base, handle)
}

/// Accepts one connection, reads the request and then holds the socket open
/// without answering for `hold`.
#[allow(dead_code)]
pub fn serve_silence(hold: Duration) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = read_request(&mut stream);
        thread::sleep(hold);
    });
    (base, handle)
}

/// Reads the request, writes `reply` and keeps the socket open. Resolves to
/// whether the client closed the connection within five seconds.
#[allow(dead_code)]
pub fn serve_and_watch_close(reply: impl Into<Vec<u8>>) -> (String, JoinHandle<bool>) {
    let reply = reply.into();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        let _ = read_request(&mut stream);
        stream.write_all(&reply).expect("reply");
        let mut buf = [0u8; 256];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(e) => {
                    return matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
                    )
                }
            }
        }
    });
    (base, handle)
}

/// Reads the request head only, then drops the socket with the body unread.
#[allow(dead_code)]
pub fn serve_hangup_after_head() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream);
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).expect("head line") == 0 || line == "\r\n" {
                break;
            }
        }
    });
    (base, handle)
}
