//! Outbound HTTP requests.
//!
//! Use [`Request::parse`] for a raw target string (including the
//! comma-separated host candidate syntax used by load balancing), or
//! [`Request::builder`] to construct requests with headers, query
//! parameters, and bodies.
//!
//! # Example
//!
//! ```
//! use weft_core::{Method, Request};
//!
//! let request = Request::builder(Method::Get, "https://api.example.com".parse().expect("url"))
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .build()
//!     .expect("valid request");
//! assert_eq!(request.url().as_str(), "https://api.example.com/?page=1");
//! ```

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use url::Url;

use crate::{Body, Context, Error, Method, Result};

/// A mutable outbound HTTP request.
///
/// Every interceptor frame owns the request while it runs and may rewrite
/// any part of it before handing it to `next`.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    host_candidates: Option<String>,
    headers: HeaderMap,
    body: Body,
    context: Context,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            host_candidates: None,
            headers: HeaderMap::new(),
            body: Body::empty(),
            context: Context::background(),
        }
    }

    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Parse a raw target.
    ///
    /// The authority may list several `host:port` candidates separated by
    /// commas (`http://a:1,b:2/path`). The raw list is kept as the host
    /// field and the URL is built from the first non-empty candidate; a
    /// load-balancing interceptor must resolve the list with
    /// [`Request::set_host`] before the request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for a malformed target and
    /// [`Error::EmptyHostList`] when a candidate list holds no host.
    pub fn parse(method: Method, target: &str) -> Result<Self> {
        let Some((scheme, rest)) = target.split_once("://") else {
            return Ok(Self::new(method, Url::parse(target)?));
        };
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let (userinfo, hosts) = match authority.rfind('@') {
            Some(at) => authority.split_at(at + 1),
            None => ("", authority),
        };
        if !hosts.contains(',') {
            return Ok(Self::new(method, Url::parse(target)?));
        }

        let first = split_hosts(hosts).next().ok_or(Error::EmptyHostList)?;
        let url = Url::parse(&format!("{scheme}://{userinfo}{first}{tail}"))?;
        let mut request = Self::new(method, url);
        request.host_candidates = Some(hosts.to_owned());
        Ok(request)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Replace the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the URL.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Replace the URL; this also drops any unresolved host candidates.
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
        self.host_candidates = None;
    }

    /// The raw host field: the candidate list when one is pending,
    /// otherwise `host[:port]` of the URL.
    #[must_use]
    pub fn host_field(&self) -> String {
        if let Some(candidates) = &self.host_candidates {
            return candidates.clone();
        }
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// The unresolved host candidate list, if any.
    #[must_use]
    pub fn host_candidates(&self) -> Option<&str> {
        self.host_candidates.as_deref()
    }

    /// Install a raw comma-separated host candidate list.
    pub fn set_host_candidates(&mut self, candidates: impl Into<String>) {
        self.host_candidates = Some(candidates.into());
    }

    /// Point the URL at a single `host[:port]` and clear the candidate list.
    ///
    /// # Errors
    ///
    /// Returns an error if the host or port is not valid for the URL.
    pub fn set_host(&mut self, host: &str) -> Result<()> {
        let (name, port) = split_host_port(host)?;
        self.url.set_host(Some(name))?;
        self.url
            .set_port(port)
            .map_err(|()| Error::invalid_request(format!("cannot set port on {}", self.url)))?;
        self.host_candidates = None;
        Ok(())
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name, if present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable access to the body.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Take the body, leaving an empty one.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// The call context (deadline and cancellation).
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Replace the call context.
    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// Snapshot of method, URL and headers.
    #[must_use]
    pub fn head(&self) -> RequestHead {
        RequestHead {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Clone the request, or `None` if the body is an unbuffered stream.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        Some(Self {
            method: self.method,
            url: self.url.clone(),
            host_candidates: self.host_candidates.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
            context: self.context.clone(),
        })
    }

    /// Consume into (head, body, context).
    #[must_use]
    pub fn into_parts(self) -> (RequestHead, Body, Context) {
        let head = RequestHead {
            method: self.method,
            url: self.url,
            headers: self.headers,
        };
        (head, self.body, self.context)
    }
}

/// Method, URL and headers of a request, kept by the [`crate::Reply`].
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// HTTP method.
    pub method: Method,
    /// Final request URL.
    pub url: Url,
    /// Request headers as sent.
    pub headers: HeaderMap,
}

/// Split a raw host field into trimmed, non-empty candidates.
pub fn split_hosts(field: &str) -> impl Iterator<Item = &str> {
    field
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

fn split_host_port(host: &str) -> Result<(&str, Option<u16>)> {
    let invalid = || Error::invalid_request(format!("invalid host `{host}`"));
    let (name, port) = if host.starts_with('[') {
        let close = host.find(']').ok_or_else(invalid)?;
        let (name, rest) = host.split_at(close + 1);
        let port = if rest.is_empty() {
            None
        } else {
            Some(rest.strip_prefix(':').ok_or_else(invalid)?)
        };
        (name, port)
    } else {
        match host.split_once(':') {
            Some((name, port)) if !port.contains(':') => (name, Some(port)),
            _ => (host, None),
        }
    };
    if name.is_empty() {
        return Err(invalid());
    }
    let port = port
        .map(|port| port.parse::<u16>().map_err(|_| invalid()))
        .transpose()?;
    Ok((name, port))
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
    error: Option<Error>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            request: Request::new(method, url),
            error: None,
        }
    }

    /// Sets a header, replacing existing values.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.request.headers.insert(name, value);
            }
            _ => self.fail(Error::invalid_header(format!("{name}: {value}"))),
        }
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers<'h>(mut self, headers: impl IntoIterator<Item = (&'h str, &'h str)>) -> Self {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.request.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Sets the call context.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.request.context = context;
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns the first invalid header encountered.
    pub fn build(self) -> Result<Request> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.request),
        }
    }

    fn fail(&mut self, err: Error) {
        self.error.get_or_insert(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_host() {
        let request = Request::parse(Method::Get, "https://api.example.com/users?page=2")
            .expect("valid target");
        assert!(request.host_candidates().is_none());
        assert_eq!(request.host_field(), "api.example.com");
        assert_eq!(request.url().path(), "/users");
    }

    #[test]
    fn parse_host_candidates() {
        let request =
            Request::parse(Method::Get, "http://user:pw@a:1, b:2,c:3/items?q=x").expect("valid");
        assert_eq!(request.host_candidates(), Some("a:1, b:2,c:3"));
        assert_eq!(request.host_field(), "a:1, b:2,c:3");
        assert_eq!(request.url().host_str(), Some("a"));
        assert_eq!(request.url().port(), Some(1));
        assert_eq!(request.url().username(), "user");
        assert_eq!(request.url().path(), "/items");
        assert_eq!(request.url().query(), Some("q=x"));
    }

    #[test]
    fn parse_candidates_skip_leading_empty() {
        let request = Request::parse(Method::Get, "http://,b:2/").expect("valid");
        assert_eq!(request.url().host_str(), Some("b"));
    }

    #[test]
    fn parse_empty_candidates() {
        let err = Request::parse(Method::Get, "http://, ,/").expect_err("no host");
        assert!(matches!(err, Error::EmptyHostList));
    }

    #[test]
    fn parse_malformed_target() {
        let err = Request::parse(Method::Get, "not a url").expect_err("malformed");
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn set_host_resolves_candidates() {
        let mut request = Request::parse(Method::Get, "http://a:1,b:2/path").expect("valid");
        request.set_host("b:2").expect("valid host");
        assert!(request.host_candidates().is_none());
        assert_eq!(request.url().as_str(), "http://b:2/path");
        assert_eq!(request.host_field(), "b:2");
    }

    #[test]
    fn set_host_ipv6() {
        let mut request = Request::parse(Method::Get, "http://localhost/").expect("valid");
        request.set_host("[::1]:8080").expect("valid host");
        assert_eq!(request.url().as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn set_host_rejects_bad_port() {
        let mut request = Request::parse(Method::Get, "http://localhost/").expect("valid");
        assert!(request.set_host("a:notaport").is_err());
        assert!(request.set_host(":80").is_err());
    }

    #[test]
    fn split_hosts_trims() {
        let hosts: Vec<_> = split_hosts(" a:1 ,, b:2 ,").collect();
        assert_eq!(hosts, ["a:1", "b:2"]);
        assert_eq!(split_hosts("").count(), 0);
    }

    #[test]
    fn builder_headers_and_query() {
        let request = Request::builder(Method::Post, "https://example.com/x".parse().expect("url"))
            .header("X-One", "1")
            .headers([("X-Two", "2")])
            .query("a", "b c")
            .body("payload")
            .build()
            .expect("valid");
        assert_eq!(request.header("x-one"), Some("1"));
        assert_eq!(request.header("x-two"), Some("2"));
        assert_eq!(request.url().query(), Some("a=b+c"));
        assert_eq!(request.body().content_length(), Some(7));
    }

    #[test]
    fn builder_rejects_invalid_header() {
        let result = Request::builder(Method::Get, "https://example.com".parse().expect("url"))
            .header("bad header", "x")
            .build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn try_clone_buffered_and_stream() {
        let request = Request::builder(Method::Put, "https://example.com".parse().expect("url"))
            .body("data")
            .build()
            .expect("valid");
        let clone = request.try_clone().expect("buffered body");
        assert_eq!(clone.body().as_bytes(), request.body().as_bytes());

        let mut streaming = request;
        streaming.set_body(Body::from_stream(futures_util::stream::empty()));
        assert!(streaming.try_clone().is_none());
    }
}
