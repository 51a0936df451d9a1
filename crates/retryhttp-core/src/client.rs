//! The retrying client and its builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::body::Body;
use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::metrics::{Instrumentation, NoopInstrumentation};
use crate::request::{Headers, Request};
use crate::response::Response;
use crate::retry::{
    run_with_retry, AttemptOutcome, Backoff, BackoffKind, DefaultRetryPolicy, Error,
    ExponentialBackoff, LinearJitterBackoff, RetryPolicy, RetrySettings,
};
use crate::transport::{CurlOptions, CurlTransport, Transport};

/// Blocking HTTP client that retries failed attempts.
///
/// Cheap to clone; clones share the transport (and its connection pool) and
/// the retry settings. Safe to use from many threads at once: every call
/// keeps its own attempt counter and body position.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    settings: Arc<RetrySettings>,
    instrumentation: Arc<dyn Instrumentation>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client with the default curl transport, 4 retries, 1s-30s exponential backoff.
    pub fn new() -> Self {
        Self {
            transport: Arc::new(CurlTransport::new()),
            settings: Arc::new(RetrySettings::default()),
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Sends `request`, retrying as configured. Non-retryable responses,
    /// 4xx included, come back as `Ok`.
    pub fn send(&self, request: Request) -> Result<Response, Error> {
        self.send_with_cancel(request, &CancelToken::new())
    }

    /// Like [`send`](Self::send) but stops as soon as `cancel` fires, also
    /// in the middle of a transfer or a backoff wait.
    pub fn send_with_cancel(
        &self,
        request: Request,
        cancel: &CancelToken,
    ) -> Result<Response, Error> {
        run_with_retry(
            self.transport.as_ref(),
            &self.settings,
            self.instrumentation.as_ref(),
            request,
            cancel,
        )
    }

    /// Builds and sends a request in one go.
    pub fn execute(
        &self,
        method: &str,
        url: &str,
        headers: Headers,
        body: Option<Body>,
    ) -> Result<Response, Error> {
        let mut request = Request::new(method, url)?.with_headers(headers);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.send(request)
    }

    pub fn get(&self, url: &str) -> Result<Response, Error> {
        self.send(Request::new("GET", url)?)
    }

    pub fn head(&self, url: &str) -> Result<Response, Error> {
        self.send(Request::new("HEAD", url)?)
    }

    pub fn post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<Body>,
    ) -> Result<Response, Error> {
        let request = Request::new("POST", url)?
            .header("Content-Type", content_type)
            .with_body(body);
        self.send(request)
    }

    pub fn put(&self, url: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.send(Request::new("PUT", url)?.with_body(body))
    }

    /// POSTs `fields` as `application/x-www-form-urlencoded`.
    pub fn post_form<K, V>(&self, url: &str, fields: &[(K, V)]) -> Result<Response, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.send(Request::form("POST", url, fields)?)
    }
}

/// Configures a [`Client`]. Settings are frozen by [`build`](Self::build).
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    curl: CurlOptions,
    settings: RetrySettings,
    instrumentation: Arc<dyn Instrumentation>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            curl: CurlOptions::default(),
            settings: RetrySettings::default(),
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }

    /// Builder preloaded from a config file's values.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self, Error> {
        let wait_min = secs(cfg.retry_wait_min_secs, "retry_wait_min_secs")?;
        let wait_max = secs(cfg.retry_wait_max_secs, "retry_wait_max_secs")?;
        let mut builder = Self::new()
            .retry_max(cfg.max_retries)
            .retry_wait_min(wait_min)
            .retry_wait_max(wait_max)
            .backoff_kind(cfg.backoff)
            .drain_limit(cfg.response_drain_limit);
        if !cfg.retry_statuses.is_empty() {
            builder = builder.retry_policy(DefaultRetryPolicy::with_extra_statuses(
                cfg.retry_statuses.iter().copied(),
            ));
        }
        if let Some(transport) = &cfg.transport {
            builder = builder.curl_options(transport.to_curl_options());
        }
        Ok(builder)
    }

    /// Use a custom transport instead of libcurl; curl options are then ignored.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn curl_options(mut self, options: CurlOptions) -> Self {
        self.curl = options;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.curl.connect_timeout = timeout;
        self
    }

    /// Per-attempt limit for the whole transfer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.curl.timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.curl.follow_redirects = follow;
        self
    }

    pub fn disable_keep_alives(mut self, disable: bool) -> Self {
        self.curl.keep_alive = !disable;
        self
    }

    pub fn retry_wait_min(mut self, wait: Duration) -> Self {
        self.settings.wait_min = wait;
        self
    }

    pub fn retry_wait_max(mut self, wait: Duration) -> Self {
        self.settings.wait_max = wait;
        self
    }

    /// Retries after the first attempt; 0 disables retrying.
    pub fn retry_max(mut self, retries: u32) -> Self {
        self.settings.max_retries = retries;
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.settings.policy = Arc::new(policy);
        self
    }

    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.settings.backoff = Arc::new(backoff);
        self
    }

    pub fn backoff_kind(self, kind: BackoffKind) -> Self {
        match kind {
            BackoffKind::Exponential => self.backoff(ExponentialBackoff),
            BackoffKind::LinearJitter => self.backoff(LinearJitterBackoff),
        }
    }

    pub fn drain_limit(mut self, bytes: u64) -> Self {
        self.settings.drain_limit = bytes;
        self
    }

    /// Called before every attempt with the attempt number (0 for the first).
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &Request) + Send + Sync + 'static,
    {
        self.settings.on_request = Some(Arc::new(hook));
        self
    }

    /// Called after every attempt with its outcome.
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptOutcome) + Send + Sync + 'static,
    {
        self.settings.on_response = Some(Arc::new(hook));
        self
    }

    pub fn instrumentation(mut self, instrumentation: impl Instrumentation + 'static) -> Self {
        self.instrumentation = Arc::new(instrumentation);
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        if self.settings.wait_min > self.settings.wait_max {
            return Err(Error::Config(format!(
                "retry wait min {:?} is greater than max {:?}",
                self.settings.wait_min, self.settings.wait_max
            )));
        }
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(CurlTransport::with_options(self.curl)),
        };
        Ok(Client {
            transport,
            settings: Arc::new(self.settings),
            instrumentation: self.instrumentation,
        })
    }
}

fn secs(value: f64, key: &str) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::Config(format!("{key} = {value}: {e}")))
}
