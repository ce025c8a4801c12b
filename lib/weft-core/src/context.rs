//! Call context: deadline and cancellation threaded through every attempt.
//!
//! A [`Context`] travels with the [`crate::Request`]. Interceptors may derive
//! a child with a shorter deadline (per-attempt timeouts) but a child can
//! never outlive its parent: its deadline is clamped to the parent's and
//! canceling the parent cancels the child.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Deadline and cancellation signal for one logical call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl Context {
    /// A context without deadline, canceled only explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derive a child whose deadline is the earlier of `deadline` and the
    /// current one.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Derive a child that expires after `timeout`, or earlier if the
    /// current deadline comes first.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The effective deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation token observed by this context.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.cancellation.is_cancelled() {
            return Some(Error::Canceled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(Error::Timeout),
            _ => None,
        }
    }

    /// Returns `true` once the deadline passed or the token was canceled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves when the context is done, yielding the reason.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancellation.cancelled() => Error::Canceled,
                    () = tokio::time::sleep_until(deadline) => Error::Timeout,
                }
            }
            None => {
                self.cancellation.cancelled().await;
                Error::Canceled
            }
        }
    }

    /// Drive `future` to completion unless the context finishes first.
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background_is_live() {
        let ctx = Context::background();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn child_never_extends_parent_deadline() {
        let parent = Context::background().with_timeout(Duration::from_millis(100));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.with_timeout(Duration::from_millis(10));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn canceling_parent_cancels_child() {
        let parent = Context::background();
        let child = parent.with_timeout(Duration::from_secs(1));
        parent.cancel();
        assert!(matches!(child.err(), Some(Error::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn canceling_child_leaves_parent_live() {
        let parent = Context::background();
        let child = parent.with_timeout(Duration::from_secs(1));
        child.cancel();
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(matches!(ctx.err(), Some(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_races_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_future_output() {
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let result = ctx.run(async { Ok(42) }).await;
        assert_eq!(result.expect("completes"), 42);
    }
}
