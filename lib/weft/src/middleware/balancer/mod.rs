//! Client-side load balancing.
//!
//! Write the target host as a comma-separated candidate list
//! (`http://10.0.0.1:80,10.0.0.2:80/path`); [`Balancer`] replaces it with
//! one host chosen by its [`Picker`] before the rest of the chain runs.

mod picker;

use std::sync::Arc;

use tracing::trace;

pub use self::picker::{
    FirstPicker, HashPicker, KeyLocation, PickInfo, Picker, RandomPicker, RoundRobinPicker,
};
use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Reply, Request, Result};

/// Picks one host out of the request's candidate list.
///
/// Clones share the picker, so a round-robin cursor advances across every
/// clone.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::balancer::{Balancer, RoundRobinPicker};
///
/// let client = Client::builder()
///     .interceptor(Balancer::new(RoundRobinPicker::new()))
///     .build();
/// let reply = client.get("http://10.0.0.1:8080,10.0.0.2:8080/health").await?;
/// ```
#[derive(Clone)]
pub struct Balancer {
    picker: Arc<dyn Picker>,
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer").finish_non_exhaustive()
    }
}

impl Default for Balancer {
    fn default() -> Self {
        Self::new(FirstPicker)
    }
}

impl Balancer {
    /// Balance with the given picker.
    #[must_use]
    pub fn new(picker: impl Picker) -> Self {
        Self {
            picker: Arc::new(picker),
        }
    }

    /// Balance with a picker shared with other balancers.
    #[must_use]
    pub fn shared(picker: Arc<dyn Picker>) -> Self {
        Self { picker }
    }

    fn select(&self, request: &mut Request) -> Result<()> {
        let host_field = request.host_field();
        let host = self.picker.pick(&PickInfo::new(
            &host_field,
            request.url(),
            request.headers(),
            request.context(),
        ))?;
        trace!(candidates = %host_field, %host, "picked host");
        request.set_host(&host)
    }
}

impl Interceptor for Balancer {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        if let Err(err) = self.select(&mut request) {
            return Box::pin(async move { Err(err) });
        }
        next.run(client, request)
    }
}
