use crate::response::Response;
use crate::transport::TransportError;

use super::error::BoxError;

/// Result of one attempt: a response or a transport error, never both.
#[derive(Debug)]
pub enum AttemptOutcome {
    Response(Response),
    Failed(TransportError),
}

impl AttemptOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            AttemptOutcome::Response(r) => Some(r),
            AttemptOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            AttemptOutcome::Response(_) => None,
            AttemptOutcome::Failed(e) => Some(e),
        }
    }

    pub fn status(&self) -> Option<u32> {
        self.response().map(Response::status)
    }
}

/// What to do after an attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Try again after backing off.
    Retry,
    /// Hand the outcome back to the caller as-is.
    Stop,
    /// Stop and report this error instead of the outcome.
    Fail(BoxError),
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry)
    }
}

/// Classifies an attempt as retryable or final.
///
/// Called once per attempt with the outcome the transport produced. Must be
/// side-effect free with respect to the outcome: the response body belongs to
/// whoever receives it next.
pub trait RetryPolicy: Send + Sync {
    fn check(&self, outcome: &AttemptOutcome) -> RetryDecision;
}

impl<F> RetryPolicy for F
where
    F: Fn(&AttemptOutcome) -> RetryDecision + Send + Sync,
{
    fn check(&self, outcome: &AttemptOutcome) -> RetryDecision {
        self(outcome)
    }
}

/// Status codes the default policy retries: `0` (no usable status) and 5xx.
///
/// Anything at or above 500 counts, so invalid codes like 999 are retried too.
pub fn is_retryable_status(status: u32) -> bool {
    status == 0 || status >= 500
}

/// Retries transport errors and [retryable statuses](is_retryable_status),
/// plus any extra statuses configured by the caller (e.g. 429).
#[derive(Debug, Clone, Default)]
pub struct DefaultRetryPolicy {
    extra_statuses: Vec<u32>,
}

impl DefaultRetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_statuses(statuses: impl IntoIterator<Item = u32>) -> Self {
        Self {
            extra_statuses: statuses.into_iter().collect(),
        }
    }

    pub fn extra_statuses(&self) -> &[u32] {
        &self.extra_statuses
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn check(&self, outcome: &AttemptOutcome) -> RetryDecision {
        match outcome {
            AttemptOutcome::Failed(_) => RetryDecision::Retry,
            AttemptOutcome::Response(resp) => {
                let status = resp.status();
                if is_retryable_status(status) || self.extra_statuses.contains(&status) {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Stop
                }
            }
        }
    }
}
