//! The transport boundary: one HTTP round trip, nothing else.
//!
//! The chain never talks to the network directly. It hands the final
//! request to a [`Transport`], which owns connection pooling, TLS and DNS.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::ServiceExt;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::interceptor::BoxFuture;
use crate::{Error, Request, Response, Result, config::ClientConfig, connector};

/// Perform exactly one HTTP exchange.
pub trait Transport: Send + Sync + 'static {
    /// Send `request` and buffer the response.
    fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response>>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        (**self).round_trip(request)
    }
}

// ============================================================================
// Hyper transport
// ============================================================================

/// Transport backed by the hyper-util pooled client over rustls.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl HyperTransport {
    /// Build the pooled client from the connection settings in `config`.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .retry_canceled_requests(config.retry_canceled_requests)
            .build(connector::https_connector(config));
        Self { inner }
    }

    /// Build a hyper request from a buffered weft request.
    fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (head, body, _context) = request.into_parts();

        let bytes = body.as_bytes().cloned().unwrap_or_default();
        let mut http_request = http::Request::builder()
            .method(http::Method::from(head.method))
            .uri(head.url.as_str())
            .body(Full::new(bytes.clone()))
            .map_err(|e| Error::invalid_request(e.to_string()))?;
        *http_request.headers_mut() = head.headers;
        if !bytes.is_empty() {
            http_request
                .headers_mut()
                .entry(http::header::CONTENT_LENGTH)
                .or_insert_with(|| http::HeaderValue::from(bytes.len()));
        }

        Ok(http_request)
    }

    async fn execute(&self, mut request: Request) -> Result<Response> {
        // hyper sends a full body; streams are read up front
        request.body_mut().buffer().await?;
        let hyper_request = Self::build_hyper_request(request)?;

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(parts.status.as_u16(), parts.headers, body))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        // the legacy client hides the rustls cause behind its Debug output
        let detail = format!("{err:?}").to_lowercase();

        if detail.contains("ssl") || detail.contains("tls") || detail.contains("certificate") {
            return Error::tls(err.to_string());
        }

        Error::connection(err.to_string())
    }
}

impl Transport for HyperTransport {
    fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        Box::pin(self.execute(request))
    }
}

impl Service<Request> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send + 'static>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

// ============================================================================
// Tower service adapter
// ============================================================================

/// Type-erased tower service usable as a transport.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Adapts any `tower::Service<Request>` into a [`Transport`].
///
/// Useful for mocks in tests, or for putting tower layers (concurrency
/// limits, load shedding) underneath the interceptor chain.
///
/// # Example
///
/// ```ignore
/// let transport = ServiceTransport::new(tower::service_fn(|request: Request| async move {
///     Ok::<_, Error>(Response::new(200, HeaderMap::new(), Bytes::new()))
/// }));
/// ```
#[derive(Clone)]
pub struct ServiceTransport {
    inner: Arc<Mutex<BoxedService>>,
}

impl std::fmt::Debug for ServiceTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTransport").finish_non_exhaustive()
    }
}

impl ServiceTransport {
    /// Wrap a service.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(BoxCloneService::new(service))),
        }
    }
}

impl Transport for ServiceTransport {
    fn round_trip(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        // Lock, clone the service, and release the lock immediately
        let service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}
