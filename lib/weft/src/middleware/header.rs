//! Header rewriting interceptors.

use http::header::{HeaderName, HeaderValue};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Error, Reply, Request, Result};

/// Parse a header pair, reporting both halves on failure.
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::invalid_header(format!("invalid header name `{name}`")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_header(format!("invalid value for header `{name}`")))?;
    Ok((header_name, header_value))
}

/// Sets a header, replacing any existing value.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::SetHeader;
///
/// let client = Client::builder()
///     .interceptor(SetHeader::new("x-api-version", "2")?)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    /// Create a header setter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name or value is invalid.
    pub fn new(name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }

    /// Create a header setter from already-validated parts.
    #[must_use]
    pub const fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl Interceptor for SetHeader {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        request
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
        next.run(client, request)
    }
}

/// Sets several headers at once, replacing existing values.
#[derive(Debug, Clone, Default)]
pub struct SetHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SetHeaders {
    /// Create from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for the first invalid pair.
    pub fn new<'h>(headers: impl IntoIterator<Item = (&'h str, &'h str)>) -> Result<Self> {
        let headers = headers
            .into_iter()
            .map(|(name, value)| parse_header(name, value))
            .collect::<Result<_>>()?;
        Ok(Self { headers })
    }
}

impl Interceptor for SetHeaders {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }
        next.run(client, request)
    }
}

/// Appends a header value, keeping existing ones.
#[derive(Debug, Clone)]
pub struct AddHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl AddHeader {
    /// Create a header appender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name or value is invalid.
    pub fn new(name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }
}

impl Interceptor for AddHeader {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        request
            .headers_mut()
            .append(self.name.clone(), self.value.clone());
        next.run(client, request)
    }
}

/// Removes every value of a header.
#[derive(Debug, Clone)]
pub struct DelHeader {
    name: HeaderName,
}

impl DelHeader {
    /// Create a header remover.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name is invalid.
    pub fn new(name: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::invalid_header(format!("invalid header name `{name}`")))?;
        Ok(Self { name })
    }
}

impl Interceptor for DelHeader {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        request.headers_mut().remove(&self.name);
        next.run(client, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_rejects_invalid_name() {
        let err = SetHeader::new("bad name", "x").expect_err("invalid");
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn set_header_rejects_invalid_value() {
        let err = SetHeader::new("x-ok", "line\nbreak").expect_err("invalid");
        assert_eq!(err.to_string(), "invalid header: invalid value for header `x-ok`");
    }

    #[test]
    fn set_headers_collects_pairs() {
        let headers = SetHeaders::new([("x-a", "1"), ("x-b", "2")]).expect("valid");
        assert_eq!(headers.headers.len(), 2);
        assert!(SetHeaders::new([("x-a", "1"), ("", "2")]).is_err());
    }
}
