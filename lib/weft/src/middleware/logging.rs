//! Request/reply logging interceptor.
//!
//! Logs each call through the `tracing` crate inside an `http_request` span.

use std::time::Instant;

use tracing::{Instrument, Level, debug, info, span, warn};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Reply, Request, Result};

/// Log level for the logging interceptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level (request/reply headers included).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

/// Interceptor that logs requests and their outcome.
///
/// Register it first to see the request as the caller built it, last to
/// see what actually goes on the wire.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::Logging;
///
/// let client = Client::builder()
///     .interceptor(Logging::new())
///     .build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logging {
    level: LogLevel,
}

impl Logging {
    /// Log at info level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log at debug level.
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// The configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl Interceptor for Logging {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        let method = request.method();
        let url = request.url().to_string();
        let deadline_ms = request.context().deadline().map(|deadline| {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX)
        });
        let level = self.level;

        let span = span!(Level::INFO, "http_request", %method, %url);

        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(
                            system = "http.client",
                            headers = ?request.headers(),
                            deadline_ms,
                            "sending request"
                        );
                    }
                    LogLevel::Info => {
                        info!(system = "http.client", deadline_ms, "sending request");
                    }
                }

                let result = next.run(client, request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(reply) => {
                        let status = reply.status();
                        if reply.is_success() {
                            info!(system = "http.client", status, elapsed_ms, "request completed");
                        } else {
                            warn!(
                                system = "http.client",
                                status,
                                elapsed_ms,
                                "request failed with HTTP error"
                            );
                        }
                        if level == LogLevel::Debug {
                            debug!(headers = ?reply.headers(), "reply headers");
                        }
                    }
                    Err(err) => {
                        warn!(system = "http.client", error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
