//! Minimal HTTP/1.1 server that answers with scripted statuses, for integration tests.
//!
//! Each connection carries one request and is closed after the reply. Replies
//! are handed out in order; once the script runs out the last reply repeats.
//! With [`start_per_path`] every request path plays the script on its own.
//! Every request is recorded so tests can check what went over the wire.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Wait this long before answering.
    pub delay: Duration,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: format!("status {status}").into_bytes(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct StatusServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/".
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    sent: Arc<Mutex<Vec<usize>>>,
}

impl StatusServer {
    /// Body bytes written per finished reply, in completion order. A reply whose
    /// client hung up early shows fewer bytes than its body holds.
    pub fn body_bytes_sent(&self) -> Vec<usize> {
        self.sent.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path.trim_start_matches('/'))
    }
}

struct Script {
    replies: Vec<Reply>,
    per_path: bool,
    next: HashMap<String, usize>,
}

impl Script {
    fn next_reply(&mut self, path: &str) -> Reply {
        let key = if self.per_path { path } else { "" };
        let next = self.next.entry(key.to_string()).or_default();
        let idx = (*next).min(self.replies.len() - 1);
        *next += 1;
        self.replies[idx].clone()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(replies: Vec<Reply>) -> StatusServer {
    serve(replies, false)
}

/// Like [`start`], but each request path keeps its own place in the script.
pub fn start_per_path(replies: Vec<Reply>) -> StatusServer {
    serve(replies, true)
}

fn serve(replies: Vec<Reply>, per_path: bool) -> StatusServer {
    assert!(!replies.is_empty(), "need at least one reply");
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let script = Arc::new(Mutex::new(Script {
        replies,
        per_path,
        next: HashMap::new(),
    }));
    {
        let requests = Arc::clone(&requests);
        let sent = Arc::clone(&sent);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let requests = Arc::clone(&requests);
                let sent = Arc::clone(&sent);
                let script = Arc::clone(&script);
                thread::spawn(move || handle(stream, &requests, &sent, &script));
            }
        });
    }
    StatusServer {
        url: format!("http://127.0.0.1:{}/", port),
        requests,
        sent,
    }
}

/// Shorthand for plain status replies.
pub fn statuses(codes: &[u16]) -> StatusServer {
    start(codes.iter().map(|&c| Reply::status(c)).collect())
}

fn handle(
    mut stream: TcpStream,
    requests: &Mutex<Vec<Recorded>>,
    sent: &Mutex<Vec<usize>>,
    script: &Mutex<Script>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(recorded) = read_request(&mut stream) else {
        return;
    };
    let head_only = recorded.method.eq_ignore_ascii_case("HEAD");
    let reply = script.lock().unwrap().next_reply(&recorded.path);
    requests.lock().unwrap().push(recorded);

    if !reply.delay.is_zero() {
        thread::sleep(reply.delay);
    }
    let mut response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    let mut written = 0;
    if !head_only {
        for chunk in reply.body.chunks(64 * 1024) {
            if stream.write_all(chunk).is_err() {
                break;
            }
            written += chunk.len();
        }
    }
    let _ = stream.flush();
    sent.lock().unwrap().push(written);
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };
    let head = std::str::from_utf8(&data[..header_end]).ok()?.to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&buf[..n]),
        }
    }
    body.truncate(content_length);
    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
