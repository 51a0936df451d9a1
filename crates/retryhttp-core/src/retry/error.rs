//! Errors returned by the client and its retry loop.

use std::io;

use url::Url;

use crate::response::Response;
use crate::transport::TransportError;

/// Boxed error used for retry-policy overrides.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while executing a request.
///
/// Non-retryable HTTP responses (4xx and friends) are not errors; they come
/// back as an ordinary [`Response`](crate::Response).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Buffering or measuring the request body failed. No attempt was made.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] io::Error),

    /// Seeking the body back to its start failed between attempts.
    #[error("{method} {url}: failed to seek body: {source}")]
    BodyRewind {
        method: String,
        url: Url,
        #[source]
        source: io::Error,
    },

    /// The last attempt failed at the network level and the policy stopped retrying.
    #[error("{method} {url} request failed: {source}")]
    Transport {
        method: String,
        url: Url,
        #[source]
        source: TransportError,
    },

    /// The retry policy stopped with its own error. `response` is the
    /// attempt's response, if it got that far, left unread.
    #[error("{method} {url} rejected by retry policy: {source}")]
    Rejected {
        method: String,
        url: Url,
        #[source]
        source: BoxError,
        response: Option<Response>,
    },

    /// Every attempt was used up while the policy still asked for a retry.
    /// `last_error` is the transport error of the final attempt, if it had one.
    #[error("{method} {url} giving up after {attempts} attempts")]
    RetriesExhausted {
        method: String,
        url: Url,
        attempts: u32,
        last_status: Option<u32>,
        #[source]
        last_error: Option<TransportError>,
    },

    /// The cancel token fired during an attempt or a backoff sleep.
    #[error("{method} {url} cancelled after {attempts} attempts")]
    Cancelled {
        method: String,
        url: Url,
        attempts: u32,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Error::RetriesExhausted { .. })
    }

    /// Response carried by [`Error::Rejected`].
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Rejected { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    /// Attempts made before the error, for variants that track it.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetriesExhausted { attempts, .. } | Error::Cancelled { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}
