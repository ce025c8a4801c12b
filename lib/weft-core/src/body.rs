//! Request bodies and body serialization utilities.
//!
//! [`Body`] is what a [`crate::Request`] carries: nothing, a buffered byte
//! string, or a single-read stream. [`Payload`] is what body-writing
//! middleware starts from before it encodes into a [`Body`].

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{Error, Result};

/// A single-read stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An outbound request body.
#[derive(Default)]
pub struct Body {
    kind: Kind,
}

#[derive(Default)]
enum Kind {
    #[default]
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A body read from a stream of chunks.
    ///
    /// Stream bodies can be sent once; call [`Body::buffer`] to make them
    /// re-sendable.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            kind: Kind::Stream(Box::pin(stream)),
        }
    }

    /// Returns `true` for an empty body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Full(bytes) => bytes.is_empty(),
            Kind::Stream(_) => false,
        }
    }

    /// Returns `true` if the body is a stream that was not buffered yet.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self.kind, Kind::Stream(_))
    }

    /// The buffered bytes, if the body is not a stream.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            Kind::Full(bytes) => Some(bytes),
            Kind::Empty | Kind::Stream(_) => None,
        }
    }

    /// Length in bytes, when known without reading.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        match &self.kind {
            Kind::Empty => Some(0),
            Kind::Full(bytes) => u64::try_from(bytes.len()).ok(),
            Kind::Stream(_) => None,
        }
    }

    /// Cheap clone of a buffered body; `None` for an unbuffered stream.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match &self.kind {
            Kind::Empty => Some(Self::empty()),
            Kind::Full(bytes) => Some(Self::from(bytes.clone())),
            Kind::Stream(_) => None,
        }
    }

    /// Read a streaming body fully into memory, in place.
    ///
    /// After this call the body is buffered: every clone starts from the
    /// first byte.
    pub async fn buffer(&mut self) -> Result<()> {
        if let Kind::Stream(stream) = &mut self.kind {
            let mut buf = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                buf.extend_from_slice(&chunk?);
            }
            self.kind = Kind::Full(buf.freeze());
        }
        Ok(())
    }

    /// Consume the body into bytes, reading the stream if needed.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        self.buffer().await?;
        Ok(match self.kind {
            Kind::Full(bytes) => bytes,
            Kind::Empty | Kind::Stream(_) => Bytes::new(),
        })
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Empty => f.write_str("Body::Empty"),
            Kind::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Kind::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Full(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

// ============================================================================
// Payload
// ============================================================================

type MarshalFn = Arc<dyn Fn() -> Result<Bytes> + Send + Sync>;

/// Source data for body-writing middleware.
///
/// `Text` and `Bytes` are sent verbatim; `Structured` is encoded by its
/// marshal function every time the payload is written.
#[derive(Clone)]
pub enum Payload {
    /// Raw text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// A value paired with the function that encodes it.
    Structured(Structured),
}

/// A value captured together with its marshal function.
#[derive(Clone)]
pub struct Structured {
    marshal: MarshalFn,
}

impl Structured {
    /// Encode the captured value.
    pub fn marshal(&self) -> Result<Bytes> {
        (self.marshal)()
    }
}

impl fmt::Debug for Structured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Structured(..)")
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Structured(structured) => structured.fmt(f),
        }
    }
}

impl Payload {
    /// A structured value encoded with a custom marshal function.
    pub fn structured<T, F, E>(value: T, marshal: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<Vec<u8>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self::Structured(Structured {
            marshal: Arc::new(move || {
                marshal(&value).map(Bytes::from).map_err(Error::marshal)
            }),
        })
    }

    /// A value encoded as JSON.
    pub fn json<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self::Structured(Structured {
            marshal: Arc::new(move || to_json(&value)),
        })
    }

    /// A value encoded as `application/x-www-form-urlencoded`.
    pub fn form<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self::Structured(Structured {
            marshal: Arc::new(move || to_form(&value)),
        })
    }

    /// Encode into bytes.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Self::Text(text) => Ok(Bytes::from(text.clone())),
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Structured(structured) => structured.marshal(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

// ============================================================================
// Content types and codecs
// ============================================================================

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// XML content type (`application/xml`).
    Xml,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
    /// Protobuf content type (`application/x-protobuf`).
    Protobuf,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
            Self::Protobuf => "application/x-protobuf",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize a value to JSON bytes.
///
/// # Example
///
/// ```
/// use weft_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_urlencoded::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// Uses `serde_html_form` which supports `Vec<T>` for repeated parameters
/// (e.g., `?tags=a&tags=b`).
pub fn to_query_string<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Deserialize JSON bytes, reporting the path of the failing field.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        Error::json_deserialization(path, err.into_inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Login {
        username: String,
        password: String,
    }

    #[tokio::test]
    async fn buffer_stream_body() {
        let chunks = vec![Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
        let mut body = Body::from_stream(futures_util::stream::iter(chunks));
        assert!(body.is_stream());
        assert!(body.try_clone().is_none());
        assert_eq!(body.content_length(), None);

        body.buffer().await.expect("buffer");

        assert!(!body.is_stream());
        assert_eq!(body.as_bytes().map(Bytes::as_ref), Some(&b"hello world"[..]));
        assert_eq!(body.content_length(), Some(11));
        let clone = body.try_clone().expect("buffered body clones");
        assert_eq!(clone.as_bytes(), body.as_bytes());
    }

    #[tokio::test]
    async fn buffer_propagates_stream_error() {
        let chunks = vec![Ok(Bytes::from("partial")), Err(Error::Body("reset".into()))];
        let mut body = Body::from_stream(futures_util::stream::iter(chunks));
        let err = body.buffer().await.expect_err("stream fails");
        assert!(matches!(err, Error::Body(_)));
    }

    #[test]
    fn empty_body() {
        let body = Body::empty();
        assert!(body.is_empty());
        assert_eq!(body.content_length(), Some(0));
        assert!(body.as_bytes().is_none());
    }

    #[test]
    fn payload_variants_encode() {
        let text = Payload::from("plain");
        assert_eq!(text.encode().expect("text").as_ref(), b"plain");

        let raw = Payload::from(vec![1_u8, 2, 3]);
        assert_eq!(raw.encode().expect("bytes").as_ref(), &[1, 2, 3]);

        let json = Payload::json(serde_json::json!({"id": 7}));
        assert_eq!(json.encode().expect("json").as_ref(), br#"{"id":7}"#);

        let form = Payload::form(Login {
            username: "alice".into(),
            password: "secret".into(),
        });
        assert_eq!(
            form.encode().expect("form").as_ref(),
            b"username=alice&password=secret"
        );
    }

    #[test]
    fn payload_custom_marshal_error() {
        let payload = Payload::structured(3_u8, |_| Err::<Vec<u8>, _>("unsupported value"));
        let err = payload.encode().expect_err("marshal fails");
        assert_eq!(err.to_string(), "marshal error: unsupported value");
    }

    #[test]
    fn from_json_reports_path() {
        let err = from_json::<Login>(br#"{"username": "bob"}"#).expect_err("missing field");
        assert!(matches!(err, Error::JsonDeserialization { .. }));
    }

    #[test]
    fn query_string_repeats_vec() {
        #[derive(serde::Serialize)]
        struct Tags {
            tag: Vec<&'static str>,
        }
        let query = to_query_string(&Tags { tag: vec!["a", "b"] }).expect("query");
        assert_eq!(query, "tag=a&tag=b");
    }
}
