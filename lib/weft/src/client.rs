//! The HTTP client and its per-call entry points.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use http::header::{COOKIE, HeaderValue, SET_COOKIE};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::chain::Chain;
use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::cookie::{CookieStore, Jar};
use crate::interceptor::{BoxFuture, Doer, Interceptor};
use crate::redirect::RedirectPolicy;
use crate::transport::{HyperTransport, Transport};
use crate::{Context, Error, Method, Reply, Request, Result};

/// HTTP client: defaults shared by every call plus the client-level
/// interceptors.
///
/// Cloning is cheap; clones share the transport and the cookie store.
///
/// # Example
///
/// ```ignore
/// use weft::Client;
/// use weft::middleware::SetHeader;
///
/// let client = Client::builder()
///     .interceptor(SetHeader::new("user-agent", "weft")?)
///     .build();
///
/// let reply = client.get("https://api.example.com/users/42").await?;
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    cookies: Option<Arc<dyn CookieStore>>,
    redirect: RedirectPolicy,
    config: ClientConfig,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("redirect", &self.redirect)
            .field("cookies", &self.cookies.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a new client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The redirect policy applied below the chain.
    #[must_use]
    pub const fn redirect_policy(&self) -> &RedirectPolicy {
        &self.redirect
    }

    /// The cookie store, if cookies are enabled.
    #[must_use]
    pub fn cookie_store(&self) -> Option<&Arc<dyn CookieStore>> {
        self.cookies.as_ref()
    }

    /// Client-level interceptors, outermost first.
    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Append a client-level interceptor.
    ///
    /// Calls already in flight keep the list they started with.
    pub fn push_interceptor(&mut self, interceptor: impl Interceptor) {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// Replace the client-level interceptors.
    pub fn set_interceptors(&mut self, interceptors: Vec<Arc<dyn Interceptor>>) {
        self.interceptors = interceptors;
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Parse `target`, then run the client and call interceptors around the
    /// round trip.
    ///
    /// # Errors
    ///
    /// Returns a construction error for a malformed target (no interceptor
    /// runs), otherwise whatever the outermost interceptor returns.
    pub async fn execute(&self, method: Method, target: &str, options: CallOptions) -> Result<Reply> {
        let mut request = Request::parse(method, target)?;
        request.set_context(options.context);
        self.dispatch(request, &options.interceptors).await
    }

    /// Run an already built request through the client-level interceptors.
    ///
    /// The request keeps its own context.
    pub async fn send(&self, request: Request) -> Result<Reply> {
        self.dispatch(request, &[]).await
    }

    async fn dispatch(&self, request: Request, call: &[Arc<dyn Interceptor>]) -> Result<Reply> {
        if self.interceptors.is_empty() && call.is_empty() {
            return RoundTrip.call(self, request).await;
        }
        let chain = Chain::merge(&self.interceptors, call);
        chain.run(self, request, &RoundTrip).await
    }

    /// Start a call with an explicit method.
    #[must_use]
    pub fn request(&self, method: Method, target: impl Into<String>) -> Call<'_> {
        Call::new(self, method, target.into())
    }

    /// Start a GET call.
    #[must_use]
    pub fn get(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Get, target)
    }

    /// Start a HEAD call.
    #[must_use]
    pub fn head(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Head, target)
    }

    /// Start a POST call.
    #[must_use]
    pub fn post(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Post, target)
    }

    /// Start a PUT call.
    #[must_use]
    pub fn put(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Put, target)
    }

    /// Start a PATCH call.
    #[must_use]
    pub fn patch(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Patch, target)
    }

    /// Start a DELETE call.
    #[must_use]
    pub fn delete(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Delete, target)
    }

    /// Start a CONNECT call.
    #[must_use]
    pub fn connect(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Connect, target)
    }

    /// Start an OPTIONS call.
    #[must_use]
    pub fn options(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Options, target)
    }

    /// Start a TRACE call.
    #[must_use]
    pub fn trace(&self, target: impl Into<String>) -> Call<'_> {
        self.request(Method::Trace, target)
    }

    // ========================================================================
    // Terminal round trip
    // ========================================================================

    async fn round_trip(&self, mut request: Request) -> Result<Reply> {
        if let Some(candidates) = request.host_candidates() {
            return Err(Error::invalid_request(format!(
                "unresolved host candidates `{candidates}`"
            )));
        }

        let context = match self.config.timeout {
            Some(timeout) => request.context().with_timeout(timeout),
            None => request.context().clone(),
        };
        if self.redirect.is_enabled() {
            context.run(request.body_mut().buffer()).await?;
        }

        let mut previous: Vec<Url> = Vec::new();
        loop {
            let replay = if self.redirect.is_enabled() {
                request.try_clone()
            } else {
                None
            };
            self.attach_cookies(&mut request);
            request.set_context(context.clone());
            let head = request.head();
            previous.push(head.url.clone());

            let response = context.run(self.transport.round_trip(request)).await?;
            self.store_cookies(&head.url, response.headers());

            let next = match replay {
                Some(replay) => self.redirect.next_request(&head, replay, &response, &previous)?,
                None => None,
            };
            match next {
                Some(next) => {
                    debug!(
                        status = response.status(),
                        from = %head.url,
                        to = %next.url(),
                        "following redirect"
                    );
                    request = next;
                }
                None => return Ok(Reply::new(head, response)),
            }
        }
    }

    fn attach_cookies(&self, request: &mut Request) {
        let Some(value) = self
            .cookies
            .as_ref()
            .and_then(|store| store.cookies(request.url()))
        else {
            return;
        };
        let headers = request.headers_mut();
        let merged = match headers.get(COOKIE).and_then(|existing| existing.to_str().ok()) {
            Some(existing) => value
                .to_str()
                .ok()
                .and_then(|value| HeaderValue::from_str(&format!("{existing}; {value}")).ok()),
            None => Some(value),
        };
        if let Some(merged) = merged {
            headers.insert(COOKIE, merged);
        }
    }

    fn store_cookies(&self, url: &Url, headers: &http::HeaderMap) {
        if let Some(store) = &self.cookies {
            let mut set_cookies = headers.get_all(SET_COOKIE).iter();
            store.set_cookies(&mut set_cookies, url);
        }
    }
}

/// The terminal [`Doer`]: one logical round trip through the transport,
/// including redirects and cookies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundTrip;

impl Doer for RoundTrip {
    fn call<'a>(&'a self, client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>> {
        Box::pin(client.round_trip(request))
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Call-scoped settings: extra interceptors and the call context.
#[derive(Clone, Default)]
pub struct CallOptions {
    interceptors: Vec<Arc<dyn Interceptor>>,
    context: Context,
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("interceptors", &self.interceptors.len())
            .field("context", &self.context)
            .finish()
    }
}

impl CallOptions {
    /// No call interceptors, background context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call-level interceptor (runs inside the client-level ones).
    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append an already shared interceptor.
    #[must_use]
    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Set the call context.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// The call context.
    #[must_use]
    pub const fn call_context(&self) -> &Context {
        &self.context
    }
}

/// A call being prepared; await it (or call [`Call::send`]) to execute.
#[must_use = "a call does nothing until it is awaited"]
pub struct Call<'a> {
    client: &'a Client,
    method: Method,
    target: String,
    options: CallOptions,
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Call<'a> {
    fn new(client: &'a Client, method: Method, target: String) -> Self {
        Self {
            client,
            method,
            target,
            options: CallOptions::new(),
        }
    }

    /// Append a call-level interceptor.
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.options = self.options.with(interceptor);
        self
    }

    /// Append an already shared interceptor.
    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.options = self.options.with_shared(interceptor);
        self
    }

    /// Append several shared interceptors.
    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>) -> Self {
        for interceptor in interceptors {
            self.options = self.options.with_shared(interceptor);
        }
        self
    }

    /// Replace the call context.
    pub fn context(mut self, context: Context) -> Self {
        self.options = self.options.context(context);
        self
    }

    /// Bound the whole call, retries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let context = self.options.context.with_timeout(timeout);
        self.options = self.options.context(context);
        self
    }

    /// Bound the whole call by an absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        let context = self.options.context.with_deadline(deadline);
        self.options = self.options.context(context);
        self
    }

    /// Cancel the call when `token` is canceled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        let context = self.options.context.clone().with_cancellation(token);
        self.options = self.options.context(context);
        self
    }

    /// Execute the call.
    pub fn send(self) -> impl Future<Output = Result<Reply>> + Send + 'a {
        self.client.execute_owned(self.method, self.target, self.options)
    }
}

impl<'a> IntoFuture for Call<'a> {
    type Output = Result<Reply>;
    type IntoFuture = BoxFuture<'a, Result<Reply>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}

impl Client {
    async fn execute_owned(&self, method: Method, target: String, options: CallOptions) -> Result<Reply> {
        self.execute(method, &target, options).await
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Client`].
///
/// Transport, TLS and cookie settings are fixed once the client is built.
pub struct ClientBuilder {
    config: ClientConfigBuilder,
    transport: Option<Arc<dyn Transport>>,
    cookies: Option<Arc<dyn CookieStore>>,
    redirect: RedirectPolicy,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfigBuilder::default(),
            transport: None,
            cookies: Some(Arc::new(Jar::default())),
            redirect: RedirectPolicy::default(),
            interceptors: Vec::new(),
        }
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("cookies", &self.cookies.is_some())
            .field("redirect", &self.redirect)
            .field("interceptors_count", &self.interceptors.len())
            .finish()
    }
}

impl ClientBuilder {
    // ========================================================================
    // Core Configuration
    // ========================================================================

    /// Set the overall call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Rely on call contexts alone; no client-level timeout.
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.config = self.config.no_timeout();
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Replace the default hyper transport.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom cookie store.
    #[must_use]
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(store);
        self
    }

    /// Disable cookie handling.
    #[must_use]
    pub fn no_cookies(mut self) -> Self {
        self.cookies = None;
        self
    }

    /// Set the redirect policy.
    #[must_use]
    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = policy;
        self
    }

    // ========================================================================
    // Interceptors
    // ========================================================================

    /// Add a client-level interceptor.
    ///
    /// Interceptors run in order: first added = outermost (sees the request
    /// first and the reply last).
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Add an already shared interceptor.
    #[must_use]
    pub fn interceptor_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the client.
    #[must_use]
    pub fn build(self) -> Client {
        let config = self.config.build();
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new(&config)));

        Client {
            transport,
            cookies: self.cookies,
            redirect: self.redirect,
            config,
            interceptors: self.interceptors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_default() {
        let client = Client::new();
        assert_eq!(client.config().timeout, Some(Duration::from_secs(30)));
        assert!(client.cookie_store().is_some());
        assert!(client.redirect_policy().is_enabled());
        assert!(client.interceptors().is_empty());
    }

    #[test]
    fn client_builder() {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_idle_per_host(16)
            .no_cookies()
            .redirect(RedirectPolicy::none())
            .build();

        assert_eq!(client.config().timeout, Some(Duration::from_secs(60)));
        assert_eq!(client.config().pool_idle_per_host, 16);
        assert!(client.cookie_store().is_none());
        assert!(!client.redirect_policy().is_enabled());
    }

    #[test]
    fn client_is_clone() {
        let client = Client::new();
        let _cloned = client.clone();
    }

    #[test]
    fn client_is_debug() {
        let client = Client::new();
        let debug = format!("{client:?}");
        assert!(debug.contains("Client"));
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }
}
