//! Transport capability: send one request, get a response or an error.
//!
//! Transports never retry and never rewrite the request; the retry loop in
//! [`crate::retry`] owns both concerns.

mod classify;
pub mod curl;
mod parse;
mod stream;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::request::OutgoingRequest;
use crate::response::Response;

pub use self::classify::classify_curl_error;
pub use self::curl::{CurlOptions, CurlTransport};
pub use self::parse::parse_header_lines;

/// Sends a single HTTP request.
///
/// Implementations must be usable from many threads at once. `cancel` should
/// be honoured for long transfers where possible.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: OutgoingRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: OutgoingRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError> {
        (**self).send(request, cancel)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        request: OutgoingRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError> {
        (**self).send(request, cancel)
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// DNS, connection refused, proxy resolution.
    Connect,
    /// Connect or transfer timed out.
    Timeout,
    /// TLS handshake or certificate failure.
    Tls,
    /// Send/receive failure after connecting, or the request body could not be read.
    Io,
    /// Transfer stopped because the call was cancelled.
    Aborted,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Aborted => "aborted",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(s)
    }
}

/// Network-level failure of one attempt. Never carries a response.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    pub fn is_connect(&self) -> bool {
        self.kind == TransportErrorKind::Connect
    }
}
