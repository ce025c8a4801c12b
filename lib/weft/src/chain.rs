//! Composition of interceptors into a single call pipeline.
//!
//! Interceptors run in onion order: the first one registered sees the
//! request first and the reply last.

use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::interceptor::{BoxFuture, Doer, Interceptor, Next};
use crate::{Client, Reply, Request, Result};

/// An ordered list of interceptors composed around a terminal [`Doer`].
#[derive(Clone, Default)]
pub struct Chain {
    kind: Kind,
}

#[derive(Clone, Default)]
enum Kind {
    #[default]
    Empty,
    Single(Arc<dyn Interceptor>),
    Nested(Vec<Arc<dyn Interceptor>>),
}

impl Chain {
    /// Compose `interceptors`, outermost first.
    #[must_use]
    pub fn new(mut interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        let kind = match interceptors.len() {
            0 => Kind::Empty,
            1 => interceptors.pop().map_or(Kind::Empty, Kind::Single),
            _ => Kind::Nested(interceptors),
        };
        Self { kind }
    }

    /// Client-level interceptors first, then call-level ones.
    #[must_use]
    pub fn merge(client: &[Arc<dyn Interceptor>], call: &[Arc<dyn Interceptor>]) -> Self {
        Self::new(client.iter().chain(call).cloned().collect())
    }

    /// Number of composed interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors().len()
    }

    /// Returns `true` if nothing wraps the terminal.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::Empty)
    }

    fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        match &self.kind {
            Kind::Empty => &[],
            Kind::Single(interceptor) => slice::from_ref(interceptor),
            Kind::Nested(interceptors) => interceptors,
        }
    }

    /// Run the chain around `terminal`.
    pub fn run<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        terminal: &'a dyn Doer,
    ) -> BoxFuture<'a, Result<Reply>> {
        match &self.kind {
            Kind::Empty => terminal.call(client, request),
            Kind::Single(interceptor) => {
                interceptor.intercept(client, request, Next::new(&[], terminal))
            }
            Kind::Nested(interceptors) => Next::new(interceptors, terminal).run(client, request),
        }
    }

    /// Bind the chain to a terminal, producing a single [`Doer`].
    #[must_use]
    pub fn with_terminal<D: Doer>(self, terminal: D) -> Composed<D> {
        Composed {
            chain: self,
            terminal,
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

/// A chain bound to its terminal.
pub struct Composed<D> {
    chain: Chain,
    terminal: D,
}

impl<D> Composed<D> {
    /// The composed chain.
    #[must_use]
    pub const fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl<D: Doer> Doer for Composed<D> {
    fn call<'a>(&'a self, client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>> {
        self.chain.run(client, request, &self.terminal)
    }
}

impl<D> fmt::Debug for Composed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composed")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}
