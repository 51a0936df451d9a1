//! Blocking HTTP client with automatic retries.
//!
//! A [`Client`] wraps every call in a retry loop: transport errors and
//! 500-range responses are retried with backoff, everything else is handed
//! back to the caller untouched. Request bodies are kept rewindable so the
//! exact same bytes go out on every attempt.

pub mod body;
pub mod cancel;
pub mod client;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use body::Body;
pub use cancel::CancelToken;
pub use client::{Client, ClientBuilder};
pub use request::{Headers, Request};
pub use response::Response;
pub use retry::{AttemptOutcome, Error, RetryDecision};
pub use transport::{Transport, TransportError, TransportErrorKind};
