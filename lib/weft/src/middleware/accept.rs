//! `Accept` header interceptor.

use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, ContentType, Error, Reply, Request, Result};

/// Sets the `Accept` header and optionally checks the reply's media type.
///
/// With checking enabled, a non-empty reply whose `Content-Type` (ignoring
/// parameters such as `charset`) differs from the accepted type fails with
/// [`Error::UnexpectedContentType`].
///
/// # Example
///
/// ```ignore
/// use weft::middleware::Accept;
///
/// let reply = client
///     .get("https://api.example.com/users")
///     .with(Accept::json().verify())
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Accept {
    value: HeaderValue,
    verify: bool,
}

impl Accept {
    /// Accept the given media type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `content_type` is not a valid
    /// header value.
    pub fn new(content_type: &str) -> Result<Self> {
        let value = HeaderValue::from_str(content_type)
            .map_err(|_| Error::invalid_header(format!("invalid accept value `{content_type}`")))?;
        Ok(Self {
            value,
            verify: false,
        })
    }

    /// Accept one of the well-known content types.
    #[must_use]
    pub const fn content_type(content_type: ContentType) -> Self {
        Self {
            value: HeaderValue::from_static(content_type.as_str()),
            verify: false,
        }
    }

    /// Accept `application/json`.
    #[must_use]
    pub const fn json() -> Self {
        Self::content_type(ContentType::Json)
    }

    /// Fail replies whose content type does not match.
    #[must_use]
    pub const fn verify(mut self) -> Self {
        self.verify = true;
        self
    }

    fn check(&self, reply: &Reply) -> Result<()> {
        if reply.body().is_empty() {
            return Ok(());
        }
        let actual = reply
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let expected = self.value.to_str().unwrap_or_default();
        if media_type(actual).eq_ignore_ascii_case(media_type(expected)) {
            Ok(())
        } else {
            Err(Error::UnexpectedContentType {
                expected: expected.to_owned(),
                actual: actual.to_owned(),
            })
        }
    }
}

fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

impl Interceptor for Accept {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        request.headers_mut().insert(ACCEPT, self.value.clone());
        if !self.verify {
            return next.run(client, request);
        }
        Box::pin(async move {
            let reply = next.run(client, request).await?;
            self.check(&reply)?;
            Ok(reply)
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderMap;

    use super::*;
    use crate::{Method, Response};

    fn reply(content_type: Option<&'static str>, body: &'static str) -> Reply {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        let request = Request::parse(Method::Get, "https://example.com").expect("valid");
        Reply::new(
            request.head(),
            Response::new(200, headers, Bytes::from_static(body.as_bytes())),
        )
    }

    #[test]
    fn media_type_ignores_parameters() {
        let accept = Accept::json().verify();
        assert!(accept
            .check(&reply(Some("application/json; charset=utf-8"), "{}"))
            .is_ok());
    }

    #[test]
    fn mismatch_is_reported() {
        let accept = Accept::json().verify();
        let err = accept
            .check(&reply(Some("text/html"), "<html/>"))
            .expect_err("mismatch");
        assert_eq!(
            err.to_string(),
            "expected content-type `application/json`, got `text/html`"
        );
    }

    #[test]
    fn empty_body_is_not_checked() {
        let accept = Accept::json().verify();
        assert!(accept.check(&reply(None, "")).is_ok());
    }
}
