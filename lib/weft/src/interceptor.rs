//! The interceptor contract.
//!
//! An [`Interceptor`] wraps the rest of the call: it receives the request,
//! may rewrite it, decides whether to delegate to [`Next`], and may inspect
//! or replace what comes back. A frame calls [`Next`] at most once per
//! logical attempt; only an explicit retry loop such as
//! the retry middleware calls it again for a fresh attempt.
//!
//! ```ignore
//! struct Stamp;
//!
//! impl Interceptor for Stamp {
//!     fn intercept<'a>(
//!         &'a self,
//!         client: &'a Client,
//!         mut request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Reply>> {
//!         request.headers_mut().insert("x-stamp", HeaderValue::from_static("1"));
//!         next.run(client, request)
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

pub use futures_util::future::BoxFuture;

use crate::{Client, Reply, Request, Result};

/// A middleware frame in the call chain.
pub trait Interceptor: Send + Sync + 'static {
    /// Handle one call.
    ///
    /// Call `next.run(client, request)` to proceed, or return without
    /// calling it to short-circuit the rest of the chain.
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>>;
}

impl<I> Interceptor for Arc<I>
where
    I: Interceptor + ?Sized,
{
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        (**self).intercept(client, request, next)
    }
}

/// Anything that turns a request into a reply.
///
/// The terminal round trip is a `Doer`, and so is a composed chain
/// (see [`crate::Composed`]).
pub trait Doer: Send + Sync {
    /// Perform the call.
    fn call<'a>(&'a self, client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>>;
}

impl<D> Doer for Arc<D>
where
    D: Doer + ?Sized,
{
    fn call<'a>(&'a self, client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>> {
        (**self).call(client, request)
    }
}

/// The rest of the chain after the current frame.
///
/// `Next` is cheap to copy: a frame that retries keeps it and runs it once
/// per attempt.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Doer,
}

impl<'a> Next<'a> {
    pub(crate) fn new(interceptors: &'a [Arc<dyn Interceptor>], terminal: &'a dyn Doer) -> Self {
        Self {
            interceptors,
            terminal,
        }
    }

    /// Run the remaining interceptors, then the terminal.
    pub fn run(self, client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>> {
        match self.interceptors.split_first() {
            Some((current, rest)) => current.intercept(client, request, Next::new(rest, self.terminal)),
            None => self.terminal.call(client, request),
        }
    }

    /// Number of interceptors left before the terminal.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.interceptors.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
