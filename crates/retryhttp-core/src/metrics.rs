//! Instrumentation of calls and attempts.
//!
//! [`Instrumentation`] is observe-only: it never affects control flow and the
//! client works without it ([`NoopInstrumentation`]). [`MetricsInstrumentation`]
//! reports through a [`metrics::Recorder`] handed in at construction, so no
//! process-wide recorder is required.
//!
//! Metrics (all with a single fixed `result` label):
//! - `http_client_do_count`, `http_client_do_success_count`, `http_client_do_failure_count`
//! - `http_client_retry_do_count`, `http_client_retry_do_success_count`,
//!   `http_client_retry_do_failure_count`
//! - `http_client_task_duration` (seconds, per attempt)
//! - `http_client_retry_duration` (seconds, whole call, only when it retried)

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ::metrics::{Counter, Histogram, Key, Label, Level, Metadata, Recorder, Unit};

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    /// Final attempt, response returned to the caller.
    Success,
    /// Final attempt, error returned to the caller.
    Failure,
    /// Policy asked for another attempt.
    Retried,
}

/// Observer for the retry loop. Must be cheap and thread-safe.
pub trait Instrumentation: Send + Sync {
    fn call_started(&self) {}

    fn attempt_finished(&self, _attempt: u32, _elapsed: Duration, _result: AttemptResult) {}

    fn call_finished(&self, _attempts: u32, _elapsed: Duration, _succeeded: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {}

const DO_COUNT: &str = "http_client_do_count";
const DO_SUCCESS_COUNT: &str = "http_client_do_success_count";
const DO_FAILURE_COUNT: &str = "http_client_do_failure_count";
const RETRY_COUNT: &str = "http_client_retry_do_count";
const RETRY_SUCCESS_COUNT: &str = "http_client_retry_do_success_count";
const RETRY_FAILURE_COUNT: &str = "http_client_retry_do_failure_count";
const TASK_DURATION: &str = "http_client_task_duration";
const RETRY_DURATION: &str = "http_client_retry_duration";

struct Handles {
    calls: Counter,
    successes: Counter,
    failures: Counter,
    retries: Counter,
    retry_successes: Counter,
    retry_failures: Counter,
    attempt_duration: Histogram,
    retry_duration: Histogram,
}

/// [`Instrumentation`] backed by a `metrics` recorder.
///
/// Handles are registered with the recorder the first time they are needed
/// and then reused; registering the same names again on another instance is
/// harmless because recorders hand back the existing series.
pub struct MetricsInstrumentation {
    recorder: Arc<dyn Recorder + Send + Sync>,
    handles: OnceLock<Handles>,
}

impl MetricsInstrumentation {
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self {
            recorder,
            handles: OnceLock::new(),
        }
    }

    /// Describe and register every metric now instead of on first use.
    pub fn register(&self) {
        self.handles();
    }

    pub fn is_registered(&self) -> bool {
        self.handles.get().is_some()
    }

    fn handles(&self) -> &Handles {
        self.handles.get_or_init(|| {
            let r = self.recorder.as_ref();
            describe(r);
            Handles {
                calls: counter(r, DO_COUNT, "do_total"),
                successes: counter(r, DO_SUCCESS_COUNT, "do_success"),
                failures: counter(r, DO_FAILURE_COUNT, "do_failed"),
                retries: counter(r, RETRY_COUNT, "retry_total"),
                retry_successes: counter(r, RETRY_SUCCESS_COUNT, "retry_success"),
                retry_failures: counter(r, RETRY_FAILURE_COUNT, "retry_failed"),
                attempt_duration: histogram(r, TASK_DURATION, "http_client_do_total_duration"),
                retry_duration: histogram(
                    r,
                    RETRY_DURATION,
                    "http_client_do_retry_total_duration",
                ),
            }
        })
    }
}

impl Instrumentation for MetricsInstrumentation {
    fn call_started(&self) {
        self.handles().calls.increment(1);
    }

    fn attempt_finished(&self, _attempt: u32, elapsed: Duration, result: AttemptResult) {
        let h = self.handles();
        h.attempt_duration.record(elapsed.as_secs_f64());
        if result == AttemptResult::Retried {
            h.retries.increment(1);
        }
    }

    fn call_finished(&self, attempts: u32, elapsed: Duration, succeeded: bool) {
        let h = self.handles();
        if succeeded {
            h.successes.increment(1);
        } else {
            h.failures.increment(1);
        }
        if attempts > 1 {
            h.retry_duration.record(elapsed.as_secs_f64());
            if succeeded {
                h.retry_successes.increment(1);
            } else {
                h.retry_failures.increment(1);
            }
        }
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

fn counter(recorder: &dyn Recorder, name: &'static str, result: &'static str) -> Counter {
    let key = Key::from_parts(name, vec![Label::new("result", result)]);
    recorder.register_counter(&key, &metadata())
}

fn histogram(recorder: &dyn Recorder, name: &'static str, result: &'static str) -> Histogram {
    let key = Key::from_parts(name, vec![Label::new("result", result)]);
    recorder.register_histogram(&key, &metadata())
}

fn describe(recorder: &dyn Recorder) {
    let counters = [
        (DO_COUNT, "Number of client calls"),
        (DO_SUCCESS_COUNT, "Number of client calls that returned a response"),
        (DO_FAILURE_COUNT, "Number of client calls that returned an error"),
        (RETRY_COUNT, "Number of retried attempts"),
        (RETRY_SUCCESS_COUNT, "Number of retried calls that eventually succeeded"),
        (RETRY_FAILURE_COUNT, "Number of retried calls that eventually failed"),
    ];
    for (name, help) in counters {
        recorder.describe_counter(name.into(), None, help.into());
    }
    recorder.describe_histogram(
        TASK_DURATION.into(),
        Some(Unit::Seconds),
        "Duration of each attempt".into(),
    );
    recorder.describe_histogram(
        RETRY_DURATION.into(),
        Some(Unit::Seconds),
        "Total duration of calls that needed retries".into(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

    fn prometheus() -> (Arc<dyn Recorder + Send + Sync>, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let recorder: Arc<dyn Recorder + Send + Sync> = Arc::new(recorder);
        (recorder, handle)
    }

    fn value_of(rendered: &str, name: &str, result: &str) -> Option<f64> {
        let label = format!("result=\"{result}\"");
        rendered
            .lines()
            .find(|l| l.starts_with(name) && l.contains(&label))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
    }

    #[test]
    fn registration_is_lazy_and_idempotent() {
        let (recorder, _handle) = prometheus();
        let a = MetricsInstrumentation::new(Arc::clone(&recorder));
        assert!(!a.is_registered());
        a.register();
        a.register();
        assert!(a.is_registered());
        let b = MetricsInstrumentation::new(recorder);
        b.register();
        a.call_started();
        b.call_started();
    }

    #[test]
    fn counts_calls_retries_and_outcomes() {
        let (recorder, handle) = prometheus();
        let m = MetricsInstrumentation::new(recorder);

        // one call that retried twice and then succeeded
        m.call_started();
        m.attempt_finished(0, Duration::from_millis(3), AttemptResult::Retried);
        m.attempt_finished(1, Duration::from_millis(3), AttemptResult::Retried);
        m.attempt_finished(2, Duration::from_millis(3), AttemptResult::Success);
        m.call_finished(3, Duration::from_millis(20), true);

        // one call that failed on the first attempt
        m.call_started();
        m.attempt_finished(0, Duration::from_millis(1), AttemptResult::Failure);
        m.call_finished(1, Duration::from_millis(1), false);

        let out = handle.render();
        assert_eq!(value_of(&out, "http_client_do_count", "do_total"), Some(2.0));
        assert_eq!(
            value_of(&out, "http_client_do_success_count", "do_success"),
            Some(1.0)
        );
        assert_eq!(
            value_of(&out, "http_client_do_failure_count", "do_failed"),
            Some(1.0)
        );
        assert_eq!(
            value_of(&out, "http_client_retry_do_count", "retry_total"),
            Some(2.0)
        );
        assert_eq!(
            value_of(&out, "http_client_retry_do_success_count", "retry_success"),
            Some(1.0)
        );
        assert!(out.contains("http_client_task_duration"));
    }
}
