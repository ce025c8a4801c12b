//! Retry interceptor with configurable backoff.
//!
//! [`Retry`] repeats the rest of the chain while attempts fail with a
//! retryable error or status code, waiting between attempts according to a
//! [`Backoff`] schedule. The wait is cut short when the call's context is
//! done.

mod backoff;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use tracing::debug;

pub use self::backoff::{Backoff, jitter_up};
use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Error, Reply, Request, Result};

/// Header carrying the retry attempt number, from the first retry onward.
pub const ATTEMPT_HEADER: &str = "x-retry-attempt";

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS: [u16; 9] = [408, 409, 423, 429, 500, 502, 503, 504, 507];

/// Decides whether an attempt that failed with an error is retried.
pub type RetryOnError = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Decides whether an attempt that produced a reply is retried.
pub type RetryOnStatus = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// Default error classifier: connection failures, timeouts and
/// cancellations.
///
/// Cancellation of the whole call still stops the loop, since the overall
/// context is checked after the classifier.
#[must_use]
pub fn default_retry_on_error(error: &Error) -> bool {
    error.is_connection() || error.is_timeout() || error.is_canceled()
}

/// Default status classifier: [`DEFAULT_RETRYABLE_STATUS`].
#[must_use]
pub fn default_retry_on_status(status: u16) -> bool {
    DEFAULT_RETRYABLE_STATUS.contains(&status)
}

/// Configuration for [`Retry`].
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_attempts: u32,
    /// Deadline applied to each attempt, never later than the call's own.
    pub per_attempt_timeout: Option<Duration>,
    /// Send [`ATTEMPT_HEADER`] on retries.
    pub attempt_header: bool,
    /// Wait between attempts.
    pub backoff: Backoff,
    retry_on_error: RetryOnError,
    retry_on_status: RetryOnStatus,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            per_attempt_timeout: None,
            attempt_header: false,
            backoff: Backoff::default(),
            retry_on_error: Arc::new(default_retry_on_error),
            retry_on_status: Arc::new(default_retry_on_status),
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("per_attempt_timeout", &self.per_attempt_timeout)
            .field("attempt_header", &self.attempt_header)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryConfig {
    /// Retry up to `max_attempts` times with the default policy.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    /// Tag retries with [`ATTEMPT_HEADER`].
    #[must_use]
    pub const fn attempt_header(mut self, enabled: bool) -> Self {
        self.attempt_header = enabled;
        self
    }

    /// Set the backoff schedule.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the error classifier.
    #[must_use]
    pub fn retry_on_error<F>(mut self, classify: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retry_on_error = Arc::new(classify);
        self
    }

    /// Replace the status classifier.
    #[must_use]
    pub fn retry_on_status<F>(mut self, classify: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.retry_on_status = Arc::new(classify);
        self
    }

    /// Retry exactly these status codes.
    #[must_use]
    pub fn retry_on_statuses(self, statuses: impl IntoIterator<Item = u16>) -> Self {
        let statuses: Vec<u16> = statuses.into_iter().collect();
        self.retry_on_status(move |status| statuses.contains(&status))
    }

    fn should_retry(&self, outcome: &Result<Reply>) -> bool {
        match outcome {
            Ok(reply) => (self.retry_on_status)(reply.status()),
            Err(err) => (self.retry_on_error)(err),
        }
    }
}

/// Retries the rest of the chain.
///
/// A streaming body is read into memory before the first attempt so every
/// attempt sends the same bytes. Once the attempts are used up, the last
/// outcome is returned unchanged.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use weft::middleware::{Backoff, Retry, RetryConfig};
///
/// let client = Client::builder()
///     .interceptor(Retry::with_config(
///         RetryConfig::new(3).backoff(Backoff::exponential(Duration::from_millis(100))),
///     ))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    /// Retry up to `max_attempts` times with the default policy.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self::with_config(RetryConfig::new(max_attempts))
    }

    /// Retry with a full configuration.
    #[must_use]
    pub const fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn attempt_request(&self, request: &Request, attempt: u32) -> Result<Request> {
        let mut current = request
            .try_clone()
            .ok_or_else(|| Error::invalid_request("request body cannot be replayed"))?;
        if let Some(timeout) = self.config.per_attempt_timeout {
            current.set_context(request.context().with_timeout(timeout));
        }
        if attempt > 0 && self.config.attempt_header {
            current
                .headers_mut()
                .insert(HeaderName::from_static(ATTEMPT_HEADER), HeaderValue::from(attempt));
        }
        Ok(current)
    }

    async fn run<'a>(&'a self, client: &'a Client, mut request: Request, next: Next<'a>) -> Result<Reply> {
        let config = &self.config;
        request.body_mut().buffer().await?;
        let overall = request.context().clone();

        let mut attempt = 0;
        loop {
            let current = self.attempt_request(&request, attempt)?;
            let outcome = next.run(client, current).await;

            if attempt >= config.max_attempts {
                return outcome;
            }
            if !config.should_retry(&outcome) {
                return outcome;
            }
            if overall.is_done() {
                debug!(attempt, "call context done, not retrying");
                return outcome;
            }

            let delay = config.backoff.delay(attempt);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            match &outcome {
                Ok(reply) => debug!(attempt, delay_ms, status = reply.status(), "retrying request"),
                Err(err) => debug!(attempt, delay_ms, error = %err, "retrying request"),
            }

            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    reason = overall.done() => {
                        debug!(attempt, %reason, "call context done during backoff");
                        return outcome;
                    }
                }
            }
            attempt += 1;
        }
    }
}

impl Interceptor for Retry {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        if self.config.max_attempts == 0 {
            return next.run(client, request);
        }
        Box::pin(self.run(client, request, next))
    }
}
