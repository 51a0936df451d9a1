//! libcurl-backed [`Transport`].
//!
//! Each send hands its `Easy2` handle to a transfer thread and returns once the
//! response head is in; the body is then streamed (see [`super::stream`]).
//! Idle handles go back into a small shared pool so their connections can be
//! reused by later calls. The pool lock is only held to pop or push a handle.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use ::curl::easy::{Easy2, List};

use super::stream::{link, StreamHandler};
use super::{Transport, TransportError, TransportErrorKind};
use crate::cancel::CancelToken;
use crate::request::OutgoingRequest;
use crate::response::Response;

/// Tunables for [`CurlTransport`].
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Hard limit for a whole transfer, including time the caller spends
    /// reading the body. `None` leaves it to the cancel token.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    /// When false every connection is closed after its transfer.
    pub keep_alive: bool,
    /// Idle handles kept for reuse.
    pub max_idle_handles: usize,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            follow_redirects: true,
            max_redirects: 10,
            keep_alive: true,
            max_idle_handles: 16,
        }
    }
}

struct HandlePool {
    idle: Mutex<Vec<Easy2<StreamHandler>>>,
    max_idle: usize,
    keep_alive: bool,
}

impl HandlePool {
    fn checkout(&self) -> Easy2<StreamHandler> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Easy2::new(StreamHandler::default()))
    }

    fn checkin(&self, mut easy: Easy2<StreamHandler>) {
        if !self.keep_alive {
            return;
        }
        // Drop the finished transfer's channels.
        *easy.get_mut() = StreamHandler::default();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(easy);
        }
    }
}

/// Sends requests with libcurl easy handles.
pub struct CurlTransport {
    options: CurlOptions,
    pool: Arc<HandlePool>,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::with_options(CurlOptions::default())
    }

    pub fn with_options(options: CurlOptions) -> Self {
        let pool = Arc::new(HandlePool {
            idle: Mutex::new(Vec::new()),
            max_idle: options.max_idle_handles,
            keep_alive: options.keep_alive,
        });
        Self { options, pool }
    }

    pub fn options(&self) -> &CurlOptions {
        &self.options
    }

    /// Applies method, headers and limits. The body itself is fed later by
    /// [`super::stream::TransferLink::wait`].
    fn configure(
        &self,
        easy: &mut Easy2<StreamHandler>,
        request: &OutgoingRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<(), TransportError> {
        let method = request.method;
        let has_body = request.body.is_some();

        easy.reset();
        easy.url(request.url.as_str())?;
        easy.follow_location(self.options.follow_redirects)?;
        easy.max_redirections(self.options.max_redirects)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        if let Some(timeout) = effective_timeout(self.options.timeout, cancel.remaining()) {
            easy.timeout(timeout)?;
        }
        easy.forbid_reuse(!self.options.keep_alive)?;
        easy.progress(true)?;

        match method {
            "HEAD" => easy.nobody(true)?,
            _ if has_body => {
                easy.post(true)?;
                if let Some(len) = request.content_length {
                    easy.post_field_size(len)?;
                }
            }
            "GET" => easy.get(true)?,
            // Body-carrying methods without a body still send `Content-Length: 0`.
            "POST" | "PUT" | "PATCH" => {
                easy.post(true)?;
                easy.post_fields_copy(&[])?;
            }
            _ => {}
        }
        // The upload above is set up as a POST; every other method keeps its own verb.
        if method != "POST" && (has_body || !matches!(method, "GET" | "HEAD")) {
            easy.custom_request(method)?;
        }

        let mut list = List::new();
        for (name, value) in request.headers.iter() {
            if value.is_empty() {
                // curl drops "Name:" headers; "Name;" sends an empty value.
                list.append(&format!("{};", name.trim()))?;
            } else {
                list.append(&format!("{}: {}", name.trim(), value.trim()))?;
            }
        }
        if has_body && !request.headers.contains("expect") {
            list.append("Expect:")?;
        }
        easy.http_headers(list)?;
        Ok(())
    }
}

impl Transport for CurlTransport {
    fn send(
        &self,
        request: OutgoingRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError> {
        let mut easy = self.pool.checkout();
        self.configure(&mut easy, &request, cancel)?;
        let (handler, link) = link(cancel, request.body.is_some());
        *easy.get_mut() = handler;

        let pool = Arc::clone(&self.pool);
        thread::Builder::new()
            .name("retryhttp-transfer".to_string())
            .spawn(move || {
                let performed = easy.perform();
                let status = easy.response_code().unwrap_or(0);
                // A handle whose transfer failed may hold a broken connection.
                if easy.get_mut().finish(status, performed) {
                    pool.checkin(easy);
                }
            })
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e))?;

        link.wait(request.body)
    }
}

/// Shorter of the configured timeout and the time left on the cancel token.
/// Never zero, since curl reads a zero timeout as "no timeout".
fn effective_timeout(
    configured: Option<Duration>,
    remaining: Option<Duration>,
) -> Option<Duration> {
    let timeout = match (configured, remaining) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    timeout.map(|t| t.max(Duration::from_millis(1)))
}
