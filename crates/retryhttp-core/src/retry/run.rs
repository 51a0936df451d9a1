//! Retry loop: send, classify, drain, back off, repeat.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backoff::{Backoff, ExponentialBackoff};
use super::error::Error;
use super::policy::{AttemptOutcome, DefaultRetryPolicy, RetryDecision, RetryPolicy};
use crate::cancel::CancelToken;
use crate::metrics::{AttemptResult, Instrumentation};
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;

/// Bytes read from a discarded response so its connection can be reused.
pub const DEFAULT_DRAIN_LIMIT: u64 = 4096;

/// Called before every attempt with the attempt number (0 = initial try).
pub type RequestHook = Arc<dyn Fn(u32, &Request) + Send + Sync>;

/// Called after every attempt, whatever the outcome.
pub type ResponseHook = Arc<dyn Fn(&AttemptOutcome) + Send + Sync>;

/// Immutable retry configuration shared by every call made through a client.
#[derive(Clone)]
pub struct RetrySettings {
    pub wait_min: Duration,
    pub wait_max: Duration,
    /// Retries after the initial attempt; a call makes at most `max_retries + 1` attempts.
    pub max_retries: u32,
    pub drain_limit: u64,
    pub policy: Arc<dyn RetryPolicy>,
    pub backoff: Arc<dyn Backoff>,
    pub on_request: Option<RequestHook>,
    pub on_response: Option<ResponseHook>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(30),
            max_retries: 4,
            drain_limit: DEFAULT_DRAIN_LIMIT,
            policy: Arc::new(DefaultRetryPolicy::new()),
            backoff: Arc::new(ExponentialBackoff),
            on_request: None,
            on_response: None,
        }
    }
}

impl fmt::Debug for RetrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySettings")
            .field("wait_min", &self.wait_min)
            .field("wait_max", &self.wait_max)
            .field("max_retries", &self.max_retries)
            .field("drain_limit", &self.drain_limit)
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .finish_non_exhaustive()
    }
}

/// Runs `request` until the policy stops, the attempts run out, or `cancel` fires.
///
/// The request (and its body) is owned by this call for all attempts. Returns
/// the last response when the policy stops on one, including 4xx.
pub fn run_with_retry(
    transport: &dyn Transport,
    settings: &RetrySettings,
    instrumentation: &dyn Instrumentation,
    mut request: Request,
    cancel: &CancelToken,
) -> Result<Response, Error> {
    tracing::debug!(method = %request.method(), url = %request.url(), "sending request");
    instrumentation.call_started();
    let started = Instant::now();
    let mut attempts = 0u32;
    let result = attempt_loop(
        transport,
        settings,
        instrumentation,
        &mut request,
        cancel,
        &mut attempts,
    );
    instrumentation.call_finished(attempts, started.elapsed(), result.is_ok());
    result
}

fn attempt_loop(
    transport: &dyn Transport,
    settings: &RetrySettings,
    instrumentation: &dyn Instrumentation,
    request: &mut Request,
    cancel: &CancelToken,
    attempts: &mut u32,
) -> Result<Response, Error> {
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(request, *attempts));
        }

        request
            .rewind_body()
            .map_err(|source| Error::BodyRewind {
                method: request.method().to_string(),
                url: request.url().clone(),
                source,
            })?;

        if let Some(hook) = &settings.on_request {
            hook(attempt, request);
        }

        let sent_at = Instant::now();
        let outcome = match transport.send(request.outgoing(), cancel) {
            Ok(resp) => AttemptOutcome::Response(resp),
            Err(err) => AttemptOutcome::Failed(err),
        };
        let elapsed = sent_at.elapsed();
        *attempts = attempt + 1;

        if let Some(hook) = &settings.on_response {
            hook(&outcome);
        }

        if let AttemptOutcome::Failed(err) = &outcome {
            if cancel.is_cancelled() {
                instrumentation.attempt_finished(attempt, elapsed, AttemptResult::Failure);
                return Err(cancelled(request, *attempts));
            }
            tracing::warn!(
                method = %request.method(),
                url = %request.url(),
                attempt,
                error = %err,
                "request failed"
            );
        }

        match settings.policy.check(&outcome) {
            RetryDecision::Stop => {
                let result = match outcome {
                    AttemptOutcome::Response(resp) => Ok(resp),
                    AttemptOutcome::Failed(source) => Err(Error::Transport {
                        method: request.method().to_string(),
                        url: request.url().clone(),
                        source,
                    }),
                };
                let finished = if result.is_ok() {
                    AttemptResult::Success
                } else {
                    AttemptResult::Failure
                };
                instrumentation.attempt_finished(attempt, elapsed, finished);
                return result;
            }
            RetryDecision::Fail(source) => {
                instrumentation.attempt_finished(attempt, elapsed, AttemptResult::Failure);
                let response = match outcome {
                    AttemptOutcome::Response(resp) => Some(resp),
                    AttemptOutcome::Failed(_) => None,
                };
                return Err(Error::Rejected {
                    method: request.method().to_string(),
                    url: request.url().clone(),
                    source,
                    response,
                });
            }
            RetryDecision::Retry => {
                instrumentation.attempt_finished(attempt, elapsed, AttemptResult::Retried);
            }
        }

        let last_status = outcome.status();
        let last_error = match outcome {
            AttemptOutcome::Response(resp) => {
                if let Err(e) = resp.drain(settings.drain_limit) {
                    tracing::error!(url = %request.url(), "error reading response body: {}", e);
                }
                None
            }
            AttemptOutcome::Failed(err) => Some(err),
        };

        let remaining = settings.max_retries.saturating_sub(attempt);
        if remaining == 0 {
            return Err(Error::RetriesExhausted {
                method: request.method().to_string(),
                url: request.url().clone(),
                attempts: *attempts,
                last_status,
                last_error,
            });
        }

        let wait = settings
            .backoff
            .delay(settings.wait_min, settings.wait_max, attempt);
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            status = ?last_status,
            "retrying in {:?} ({} left)",
            wait,
            remaining
        );
        if !cancel.sleep(wait) {
            return Err(cancelled(request, *attempts));
        }
        attempt += 1;
    }
}

fn cancelled(request: &Request, attempts: u32) -> Error {
    Error::Cancelled {
        method: request.method().to_string(),
        url: request.url().clone(),
        attempts,
    }
}
