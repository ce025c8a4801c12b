//! Request body interceptor.
//!
//! [`SetBody`] encodes a [`Payload`] into the request body and sets
//! `Content-Type` and `Content-Length` to match.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures_util::Stream;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Body, BodyStream, Client, ContentType, Error, Payload, Reply, Request, Result};

enum Source {
    Payload(Payload),
    Stream(Mutex<Option<BodyStream>>),
}

/// Writes the request body.
///
/// Rejects GET, HEAD and OPTIONS requests with
/// [`Error::BodyNotSupported`] before the rest of the chain runs.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::SetBody;
///
/// let reply = client
///     .post("https://api.example.com/users")
///     .with(SetBody::json(NewUser { name: "Alice".into() }))
///     .await?;
/// ```
pub struct SetBody {
    source: Source,
    content_type: HeaderValue,
}

impl fmt::Debug for SetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Payload(payload) => format!("{payload:?}"),
            Source::Stream(_) => "Stream".to_owned(),
        };
        f.debug_struct("SetBody")
            .field("source", &source)
            .field("content_type", &self.content_type)
            .finish()
    }
}

const fn static_content_type(content_type: ContentType) -> HeaderValue {
    HeaderValue::from_static(content_type.as_str())
}

fn parse_content_type(content_type: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(content_type)
        .map_err(|_| Error::invalid_header(format!("invalid content type `{content_type}`")))
}

impl SetBody {
    /// A `text/plain` body.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            source: Source::Payload(Payload::Text(text.into())),
            content_type: static_content_type(ContentType::PlainText),
        }
    }

    /// Raw bytes sent as `application/octet-stream`.
    #[must_use]
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Payload(Payload::Bytes(bytes.into())),
            content_type: static_content_type(ContentType::OctetStream),
        }
    }

    /// A value encoded as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn form<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self {
            source: Source::Payload(Payload::form(value)),
            content_type: static_content_type(ContentType::FormUrlEncoded),
        }
    }

    /// A value encoded as `application/json`.
    #[must_use]
    pub fn json<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self {
            source: Source::Payload(Payload::json(value)),
            content_type: static_content_type(ContentType::Json),
        }
    }

    /// Any payload with an explicit content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `content_type` is not a valid
    /// header value.
    pub fn payload(payload: Payload, content_type: &str) -> Result<Self> {
        Ok(Self {
            source: Source::Payload(payload),
            content_type: parse_content_type(content_type)?,
        })
    }

    /// A value encoded by a custom marshal function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `content_type` is not a valid
    /// header value.
    pub fn object<T, F, E>(value: T, content_type: &str, marshal: F) -> Result<Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<Vec<u8>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self::payload(Payload::structured(value, marshal), content_type)
    }

    /// A streaming body with unknown length.
    ///
    /// The stream is consumed by the first call that uses this interceptor;
    /// later calls fail with [`Error::InvalidRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `content_type` is not a valid
    /// header value.
    pub fn reader<S>(stream: S, content_type: &str) -> Result<Self>
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Ok(Self {
            source: Source::Stream(Mutex::new(Some(Box::pin(stream)))),
            content_type: parse_content_type(content_type)?,
        })
    }

    fn write(&self, request: &mut Request) -> Result<()> {
        let method = request.method();
        if !method.supports_body() {
            return Err(Error::BodyNotSupported(method));
        }

        let body = match &self.source {
            Source::Payload(payload) => Body::from(payload.encode()?),
            Source::Stream(stream) => {
                let stream = stream
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .ok_or_else(|| Error::invalid_request("reader body already consumed"))?;
                Body::from_stream(stream)
            }
        };

        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, self.content_type.clone());
        match body.content_length() {
            Some(length) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
            }
            None => {
                headers.remove(CONTENT_LENGTH);
            }
        }
        request.set_body(body);
        Ok(())
    }
}

impl Interceptor for SetBody {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        if let Err(err) = self.write(&mut request) {
            return Box::pin(async move { Err(err) });
        }
        next.run(client, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    fn request(method: Method) -> Request {
        Request::parse(method, "https://example.com/items").expect("valid")
    }

    #[test]
    fn json_sets_headers() {
        let mut request = request(Method::Post);
        SetBody::json(serde_json::json!({"name": "Alice"}))
            .write(&mut request)
            .expect("write");

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("content-length"), Some("16"));
        assert_eq!(
            request.body().as_bytes().map(Bytes::as_ref),
            Some(&br#"{"name":"Alice"}"#[..])
        );
    }

    #[test]
    fn rejects_get() {
        let mut request = request(Method::Get);
        let err = SetBody::text("hello").write(&mut request).expect_err("no body on GET");
        assert!(matches!(err, Error::BodyNotSupported(Method::Get)));
    }

    #[test]
    fn reader_is_single_use() {
        let chunks = futures_util::stream::iter(vec![Ok(Bytes::from("chunk"))]);
        let body = SetBody::reader(chunks, "application/octet-stream").expect("valid");

        let mut first = request(Method::Put);
        body.write(&mut first).expect("first use");
        assert!(first.body().is_stream());
        assert!(first.header("content-length").is_none());

        let mut second = request(Method::Put);
        assert!(matches!(body.write(&mut second), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn object_uses_marshal_fn() {
        let body = SetBody::object(7_u32, "application/x-custom", |value| {
            Ok::<_, std::fmt::Error>(format!("value={value}").into_bytes())
        })
        .expect("valid");
        let mut request = request(Method::Patch);
        body.write(&mut request).expect("write");
        assert_eq!(request.header("content-type"), Some("application/x-custom"));
        assert_eq!(request.body().content_length(), Some(7));
    }

    #[test]
    fn invalid_content_type() {
        assert!(SetBody::payload(Payload::from("x"), "bad\nvalue").is_err());
    }
}
