//! The inbound side of a call: a response plus the request that produced it.

use bytes::Bytes;
use http::HeaderMap;

use crate::{Error, RequestHead, Response, Result};

/// An immutable reply, as seen by interceptors on the way back up the chain.
#[derive(Debug, Clone)]
pub struct Reply {
    request: RequestHead,
    response: Response,
}

impl Reply {
    /// Pair a response with the head of the request that produced it.
    #[must_use]
    pub const fn new(request: RequestHead, response: Response) -> Self {
        Self { request, response }
    }

    /// The request that produced this reply (after every rewrite and
    /// redirect).
    #[must_use]
    pub const fn request(&self) -> &RequestHead {
        &self.request
    }

    /// The underlying response.
    #[must_use]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.response.status()
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.response.is_success()
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Single response header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        self.response.body()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the failing JSON path and message.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.response.json()
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Body`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String> {
        self.response
            .text()
            .map_err(|err| Error::Body(err.to_string()))
    }

    /// Turn a non-2xx reply into [`Error::Http`], keeping the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] for any status outside 200..300.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status();
        let message = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown Status");
        Err(Error::http_with_body(
            status,
            message,
            self.response.into_body(),
        ))
    }

    /// Consume into the response.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Consume into (request head, response).
    #[must_use]
    pub fn into_parts(self) -> (RequestHead, Response) {
        (self.request, self.response)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;
    use crate::{Method, Request};

    fn reply(status: u16, body: &'static str) -> Reply {
        let request = Request::parse(Method::Get, "https://example.com/a").expect("valid");
        Reply::new(
            request.head(),
            Response::new(status, HeaderMap::new(), Bytes::from(body)),
        )
    }

    #[test]
    fn reply_keeps_request_head() {
        let reply = reply(200, "ok");
        check!(reply.request().method == Method::Get);
        check!(reply.request().url.as_str() == "https://example.com/a");
        check!(reply.text().expect("utf8") == "ok");
    }

    #[test]
    fn error_for_status_passes_success() {
        let_assert!(Ok(reply) = reply(204, "").error_for_status());
        check!(reply.status() == 204);
    }

    #[test]
    fn error_for_status_keeps_body() {
        let_assert!(Err(err) = reply(404, r#"{"error":"missing"}"#).error_for_status());
        check!(err.status() == Some(404));
        check!(err.to_string() == "HTTP error 404: Not Found");
        check!(err.body().map(Bytes::as_ref) == Some(&br#"{"error":"missing"}"#[..]));
    }
}
