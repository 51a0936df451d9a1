//! Retry loop, retry policy and backoff.
//!
//! The policy decides whether an attempt is worth repeating, the backoff
//! decides how long to wait first, and [`run_with_retry`] drives both around
//! a [`Transport`](crate::transport::Transport) so every client call shares
//! the same behaviour.

mod backoff;
mod error;
mod policy;
mod run;


pub use backoff::{Backoff, BackoffKind, ExponentialBackoff, LinearJitterBackoff};
pub use error::{BoxError, Error};
pub use policy::{
    is_retryable_status, AttemptOutcome, DefaultRetryPolicy, RetryDecision, RetryPolicy,
};
pub use run::{run_with_retry, RequestHook, ResponseHook, RetrySettings, DEFAULT_DRAIN_LIMIT};
