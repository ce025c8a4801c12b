//! Authentication interceptors.
//!
//! Each one writes credentials into the request before delegating; none of
//! them looks at the reply.

use http::header::{AUTHORIZATION, HeaderName, HeaderValue};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::middleware::header::parse_header;
use crate::{Client, Error, Reply, Request, Result};

fn authorization(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_header("invalid authorization credentials"))?;
    value.set_sensitive(true);
    Ok(value)
}

fn set_authorization<'a>(
    value: &HeaderValue,
    client: &'a Client,
    mut request: Request,
    next: Next<'a>,
) -> BoxFuture<'a, Result<Reply>> {
    request.headers_mut().insert(AUTHORIZATION, value.clone());
    next.run(client, request)
}

/// Adds an `Authorization: Basic <base64(user:pass)>` header.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::BasicAuth;
///
/// let client = Client::builder()
///     .interceptor(BasicAuth::new("username", "password")?)
///     .build();
/// ```
#[cfg(feature = "middleware-basic-auth")]
#[derive(Debug, Clone)]
pub struct BasicAuth {
    credentials: HeaderValue,
}

#[cfg(feature = "middleware-basic-auth")]
impl BasicAuth {
    /// Create basic auth with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the encoded value is not a valid
    /// header (it always is for UTF-8 input).
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Result<Self> {
        use base64::Engine;

        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Ok(Self {
            credentials: authorization(&format!("Basic {encoded}"))?,
        })
    }
}

#[cfg(feature = "middleware-basic-auth")]
impl Interceptor for BasicAuth {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        set_authorization(&self.credentials, client, request, next)
    }
}

/// Adds an `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    credentials: HeaderValue,
}

impl BearerAuth {
    /// Create bearer auth with the given token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the token is not a valid header
    /// value.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            credentials: authorization(&format!("Bearer {}", token.as_ref()))?,
        })
    }
}

impl Interceptor for BearerAuth {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        set_authorization(&self.credentials, client, request, next)
    }
}

/// Adds an `Authorization: <scheme> <token>` header.
///
/// A blank scheme sends the raw token.
#[derive(Debug, Clone)]
pub struct CustomToken {
    credentials: HeaderValue,
}

impl CustomToken {
    /// Create a token header with a custom scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the result is not a valid header
    /// value.
    pub fn new(scheme: &str, token: &str) -> Result<Self> {
        let scheme = scheme.trim();
        let value = if scheme.is_empty() {
            token.to_owned()
        } else {
            format!("{scheme} {token}")
        };
        Ok(Self {
            credentials: authorization(&value)?,
        })
    }
}

impl Interceptor for CustomToken {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        set_authorization(&self.credentials, client, request, next)
    }
}

#[derive(Debug, Clone)]
enum KeyPlacement {
    Header(HeaderName, HeaderValue),
    Query(String, String),
}

/// Sends an API key in a header or in the query string.
#[derive(Debug, Clone)]
pub struct ApiKey {
    placement: KeyPlacement,
}

impl ApiKey {
    /// Send the key as header `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name or key is invalid.
    pub fn header(name: &str, key: &str) -> Result<Self> {
        let (name, mut value) = parse_header(name, key)?;
        value.set_sensitive(true);
        Ok(Self {
            placement: KeyPlacement::Header(name, value),
        })
    }

    /// Send the key as query parameter `name`.
    #[must_use]
    pub fn query(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            placement: KeyPlacement::Query(name.into(), key.into()),
        }
    }
}

impl Interceptor for ApiKey {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        match &self.placement {
            KeyPlacement::Header(name, value) => {
                request.headers_mut().insert(name.clone(), value.clone());
            }
            KeyPlacement::Query(name, key) => {
                request.url_mut().query_pairs_mut().append_pair(name, key);
            }
        }
        next.run(client, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "middleware-basic-auth")]
    #[test]
    fn basic_auth_encodes_correctly() {
        let auth = BasicAuth::new("user", "pass").expect("valid");
        assert_eq!(auth.credentials, "Basic dXNlcjpwYXNz");
        assert!(auth.credentials.is_sensitive());
    }

    #[test]
    fn bearer_auth_value() {
        let auth = BearerAuth::new("test-token").expect("valid");
        assert_eq!(auth.credentials, "Bearer test-token");
    }

    #[test]
    fn custom_token_blank_scheme_sends_raw_token() {
        let auth = CustomToken::new("  ", "raw-token").expect("valid");
        assert_eq!(auth.credentials, "raw-token");

        let auth = CustomToken::new("Token", "abc").expect("valid");
        assert_eq!(auth.credentials, "Token abc");
    }

    #[test]
    fn api_key_rejects_invalid_header() {
        assert!(ApiKey::header("x-api-key", "bad\nkey").is_err());
    }
}
