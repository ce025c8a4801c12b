//! Redirect policy applied by the terminal round trip.
//!
//! Redirects are followed below the interceptor chain: interceptors see one
//! call and its final reply, whose [`crate::RequestHead`] names the URL
//! that actually answered.

use std::fmt;
use std::sync::Arc;

use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION};
use url::Url;

use crate::{Error, Method, Request, RequestHead, Response, Result};

/// Default maximum number of redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// A redirect about to be followed, as seen by a custom policy.
#[derive(Debug)]
pub struct Attempt<'a> {
    status: u16,
    url: &'a Url,
    previous: &'a [Url],
}

impl Attempt<'_> {
    /// Status of the redirect response.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Where the redirect points.
    #[must_use]
    pub const fn url(&self) -> &Url {
        self.url
    }

    /// URLs already requested during this call, oldest first.
    #[must_use]
    pub const fn previous(&self) -> &[Url] {
        self.previous
    }
}

/// Decision of a custom redirect policy.
#[derive(Debug)]
pub enum Action {
    /// Follow the redirect.
    Follow,
    /// Return the redirect response as the reply.
    Stop,
    /// Fail the call.
    Error(Error),
}

type CheckFn = Arc<dyn Fn(&Attempt<'_>) -> Action + Send + Sync>;

/// How the client reacts to 3xx responses.
#[derive(Clone)]
pub struct RedirectPolicy {
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    None,
    Limited(usize),
    Custom(CheckFn),
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::limited(DEFAULT_MAX_REDIRECTS)
    }
}

impl fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::None => f.write_str("RedirectPolicy::None"),
            Kind::Limited(max) => write!(f, "RedirectPolicy::Limited({max})"),
            Kind::Custom(_) => f.write_str("RedirectPolicy::Custom"),
        }
    }
}

impl RedirectPolicy {
    /// Never follow redirects; 3xx responses are returned as replies.
    #[must_use]
    pub const fn none() -> Self {
        Self { kind: Kind::None }
    }

    /// Follow up to `max` redirects, then fail with
    /// [`Error::TooManyRedirects`].
    #[must_use]
    pub const fn limited(max: usize) -> Self {
        Self {
            kind: Kind::Limited(max),
        }
    }

    /// Let `check` decide on every redirect.
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Attempt<'_>) -> Action + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Custom(Arc::new(check)),
        }
    }

    /// Returns `false` for [`RedirectPolicy::none`].
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.kind, Kind::None)
    }

    /// Build the next hop for `response`, or `None` if the response is the
    /// final reply.
    ///
    /// `replay` is a copy of the request that produced `response`, taken
    /// before it was sent; `previous` lists every URL requested so far.
    pub(crate) fn next_request(
        &self,
        head: &RequestHead,
        mut replay: Request,
        response: &Response,
        previous: &[Url],
    ) -> Result<Option<Request>> {
        let status = response.status();
        if !is_redirect(status) || !self.is_enabled() {
            return Ok(None);
        }

        let location = response.header(LOCATION.as_str()).ok_or_else(|| {
            Error::InvalidRedirect("redirect response missing Location header".into())
        })?;
        let url = resolve_redirect_url(&head.url, location)?;

        match &self.kind {
            Kind::None => return Ok(None),
            Kind::Limited(max) if previous.len() > *max => {
                return Err(Error::TooManyRedirects {
                    count: previous.len() - 1,
                    max: *max,
                });
            }
            Kind::Limited(_) => {}
            Kind::Custom(check) => match check(&Attempt {
                status,
                url: &url,
                previous,
            }) {
                Action::Follow => {}
                Action::Stop => return Ok(None),
                Action::Error(err) => return Err(err),
            },
        }

        let method = redirect_method(status, head.method);
        if method != head.method {
            replay.take_body();
            replay.headers_mut().remove(CONTENT_TYPE);
            replay.headers_mut().remove(CONTENT_LENGTH);
        }
        if url.host_str() != head.url.host_str() {
            replay.headers_mut().remove(AUTHORIZATION);
            replay.headers_mut().remove(COOKIE);
        }
        replay.set_method(method);
        replay.set_url(url);
        Ok(Some(replay))
    }
}

/// Check if a status code is a redirect.
fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Determine the method for the redirected request.
///
/// - 301, 302, 303: switch to GET (HEAD stays HEAD)
/// - 307, 308: Preserve original method
fn redirect_method(status: u16, original: Method) -> Method {
    match (status, original) {
        (307 | 308, method) | (_, method @ Method::Head) => method,
        _ => Method::Get,
    }
}

/// Resolve a redirect Location URL relative to the original request URL.
fn resolve_redirect_url(base_url: &Url, location: &str) -> Result<Url> {
    // Try parsing as absolute URL first
    if let Ok(url) = Url::parse(location) {
        return Ok(url);
    }

    // Parse as relative URL
    base_url.join(location).map_err(Error::InvalidUrl)
}
