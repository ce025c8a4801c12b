//! Per-call cookie interceptors.
//!
//! These edit the `Cookie` request header directly. Cookies persisted
//! across calls live in the client's [`crate::CookieStore`].

use http::header::{COOKIE, HeaderValue};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Error, Reply, Request, Result};

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b'=' | b';' | b',' | b'"'))
}

fn valid_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'\\'))
}

/// Appends `name=value` pairs to the `Cookie` header.
///
/// Pairs already present on the request are kept; new ones follow them.
///
/// # Example
///
/// ```ignore
/// use weft::middleware::Cookies;
///
/// let reply = client
///     .get("https://example.com/cart")
///     .with(Cookies::new([("session", "abc123"), ("theme", "dark")])?)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Cookies {
    pairs: String,
}

impl Cookies {
    /// Cookies from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for the first pair with a name or
    /// value that is not allowed in a `Cookie` header.
    pub fn new<'c>(cookies: impl IntoIterator<Item = (&'c str, &'c str)>) -> Result<Self> {
        let mut pairs = Vec::new();
        for (name, value) in cookies {
            if !valid_name(name) {
                return Err(Error::invalid_header(format!("invalid cookie name `{name}`")));
            }
            if !valid_value(value) {
                return Err(Error::invalid_header(format!(
                    "invalid value for cookie `{name}`"
                )));
            }
            pairs.push(format!("{name}={value}"));
        }
        Ok(Self {
            pairs: pairs.join("; "),
        })
    }

    /// A single cookie.
    ///
    /// # Errors
    ///
    /// See [`Cookies::new`].
    pub fn single(name: &str, value: &str) -> Result<Self> {
        Self::new([(name, value)])
    }

    fn apply(&self, request: &mut Request) -> Result<()> {
        if self.pairs.is_empty() {
            return Ok(());
        }
        let header = match request.header(COOKIE.as_str()) {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{existing}; {}", self.pairs)
            }
            _ => self.pairs.clone(),
        };
        let value = HeaderValue::from_str(&header)
            .map_err(|_| Error::invalid_header("invalid cookie header"))?;
        request.headers_mut().insert(COOKIE, value);
        Ok(())
    }
}

impl Interceptor for Cookies {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        if let Err(err) = self.apply(&mut request) {
            return Box::pin(async move { Err(err) });
        }
        next.run(client, request)
    }
}

/// Removes the `Cookie` header set so far.
///
/// Cookies attached later by the client's store are not affected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearCookies;

impl Interceptor for ClearCookies {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        request.headers_mut().remove(COOKIE);
        next.run(client, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    fn request() -> Request {
        Request::parse(Method::Get, "https://example.com").expect("valid")
    }

    #[test]
    fn pairs_are_joined() {
        let cookies = Cookies::new([("a", "1"), ("b", "2")]).expect("valid");
        let mut request = request();
        cookies.apply(&mut request).expect("apply");
        assert_eq!(request.header("cookie"), Some("a=1; b=2"));
    }

    #[test]
    fn existing_cookie_header_is_kept() {
        let mut request = request();
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_static("first=0"));
        Cookies::single("next", "1")
            .expect("valid")
            .apply(&mut request)
            .expect("apply");
        assert_eq!(request.header("cookie"), Some("first=0; next=1"));
    }

    #[test]
    fn rejects_bad_names_and_values() {
        assert!(Cookies::single("", "x").is_err());
        assert!(Cookies::single("a=b", "x").is_err());
        assert!(Cookies::single("ok", "semi;colon").is_err());
    }
}
