//! Client-side cookie storage.
//!
//! The terminal round trip asks the store for a `Cookie` header before each
//! hop and hands it every `Set-Cookie` header that comes back.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use ::cookie::time::OffsetDateTime;
use http::HeaderValue;
use tokio::time::Instant;
use url::Url;

/// Persistent cookie storage for a [`crate::Client`].
pub trait CookieStore: Send + Sync + 'static {
    /// Store the `Set-Cookie` headers of a response from `url`.
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url);

    /// The `Cookie` header value to send to `url`, if any.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;
}

/// In-memory cookie jar.
///
/// Cookies are host-only: the `Domain` attribute is ignored and a cookie is
/// sent back to the exact host that set it. `Max-Age` and `Expires` are
/// honored: a lifetime already over deletes the cookie, and expired
/// cookies are pruned whenever the host stores new ones.
#[derive(Debug, Default)]
pub struct Jar {
    cookies: RwLock<HashMap<String, Vec<Cookie>>>,
}

#[derive(Debug, Clone)]
struct Cookie {
    name: String,
    value: String,
    path: String,
    secure: bool,
    expires: Option<Instant>,
}

impl Cookie {
    /// Parse a `Set-Cookie` header; the flag is set when the header deletes
    /// the cookie (`Max-Age<=0` or an `Expires` in the past).
    fn parse(header: &str, url: &Url) -> Option<(Self, bool)> {
        let raw = ::cookie::Cookie::parse(header).ok()?;

        // Max-Age wins over Expires.
        let lifetime = raw.max_age().or_else(|| {
            raw.expires_datetime()
                .map(|expires| expires - OffsetDateTime::now_utc())
        });
        let (expires, deleted) = match lifetime {
            None => (None, false),
            Some(remaining) if !remaining.is_positive() => (None, true),
            Some(remaining) => {
                let secs = u64::try_from(remaining.whole_seconds()).unwrap_or_default();
                (Instant::now().checked_add(Duration::from_secs(secs)), false)
            }
        };

        let cookie = Self {
            name: raw.name().to_owned(),
            value: raw.value().trim_matches('"').to_owned(),
            path: raw
                .path()
                .filter(|path| path.starts_with('/'))
                .map_or_else(|| default_path(url), str::to_owned),
            secure: raw.secure().unwrap_or(false),
            expires,
        };
        Some((cookie, deleted))
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    fn matches(&self, url: &Url, now: Instant) -> bool {
        if self.secure && url.scheme() != "https" {
            return false;
        }
        !self.is_expired(now) && path_matches(&self.path, url.path())
    }
}

/// Directory of the request path, per RFC 6265 section 5.1.4.
fn default_path(url: &Url) -> String {
    match url.path().rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(slash) => url.path().get(..slash).unwrap_or("/").to_owned(),
    }
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

impl Jar {
    /// An empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single `Set-Cookie` style string as if `url` had sent it.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            self.set_cookies(&mut std::iter::once(&value), url);
        }
    }

    /// Drop every stored cookie.
    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CookieStore for Jar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        let mut jar = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        let entries = jar.entry(host.to_owned()).or_default();
        let now = Instant::now();
        entries.retain(|existing| !existing.is_expired(now));

        for header in cookie_headers {
            let Some((cookie, deleted)) = header
                .to_str()
                .ok()
                .and_then(|header| Cookie::parse(header, url))
            else {
                continue;
            };
            entries.retain(|existing| existing.name != cookie.name || existing.path != cookie.path);
            if !deleted {
                tracing::trace!(host, name = %cookie.name, "cookie stored");
                entries.push(cookie);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let jar = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let header = jar
            .get(host)?
            .iter()
            .filter(|cookie| cookie.matches(url, now))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("url")
    }

    #[test]
    fn stores_and_returns_cookies() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("session=abc; Path=/; HttpOnly", &origin);
        jar.add_cookie_str("theme=dark", &origin);

        let header = jar.cookies(&url("https://example.com/account")).expect("cookies");
        assert_eq!(header, "session=abc; theme=dark");
    }

    #[test]
    fn cookies_are_host_only() {
        let jar = Jar::new();
        jar.add_cookie_str("session=abc", &url("https://example.com/"));
        assert!(jar.cookies(&url("https://other.example.com/")).is_none());
    }

    #[test]
    fn replaces_cookie_with_same_name() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("session=old", &origin);
        jar.add_cookie_str("session=new", &origin);
        assert_eq!(jar.cookies(&origin).expect("cookies"), "session=new");
    }

    #[test]
    fn max_age_zero_deletes() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("session=abc", &origin);
        jar.add_cookie_str("session=; Max-Age=0", &origin);
        assert!(jar.cookies(&origin).is_none());
    }

    #[test]
    fn past_expires_deletes() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("session=abc", &origin);
        jar.add_cookie_str("theme=dark", &origin);
        jar.add_cookie_str("session=; Expires=Thu, 01 Jan 1970 00:00:00 GMT", &origin);
        assert_eq!(jar.cookies(&origin).expect("cookies"), "theme=dark");
    }

    #[test]
    fn future_expires_keeps_cookie() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("session=abc; Expires=Wed, 21 Oct 2099 07:28:00 GMT", &origin);
        assert_eq!(jar.cookies(&origin).expect("cookies"), "session=abc");
    }

    #[test]
    fn max_age_overrides_expires() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str(
            "session=abc; Max-Age=0; Expires=Wed, 21 Oct 2099 07:28:00 GMT",
            &origin,
        );
        assert!(jar.cookies(&origin).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cookies_are_pruned_on_store() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("token=t; Max-Age=60", &origin);
        jar.add_cookie_str("keep=1", &origin);

        tokio::time::advance(Duration::from_secs(61)).await;
        jar.add_cookie_str("fresh=2", &origin);

        let stored = jar.cookies.read().expect("lock");
        let names: Vec<_> = stored
            .get("example.com")
            .expect("host entry")
            .iter()
            .map(|cookie| cookie.name.as_str())
            .collect();
        assert_eq!(names, ["keep", "fresh"]);
    }

    #[tokio::test(start_paused = true)]
    async fn max_age_expires() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("token=t; Max-Age=60", &origin);
        assert!(jar.cookies(&origin).is_some());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(jar.cookies(&origin).is_none());
    }

    #[test]
    fn secure_cookie_needs_https() {
        let jar = Jar::new();
        jar.add_cookie_str("token=t; Secure", &url("https://example.com/"));
        assert!(jar.cookies(&url("http://example.com/")).is_none());
        assert!(jar.cookies(&url("https://example.com/")).is_some());
    }

    #[test]
    fn path_scoping() {
        let jar = Jar::new();
        jar.add_cookie_str("a=1", &url("https://example.com/api/login"));

        assert!(jar.cookies(&url("https://example.com/api/users")).is_some());
        assert!(jar.cookies(&url("https://example.com/apiary")).is_none());
        assert!(jar.cookies(&url("https://example.com/")).is_none());
    }

    #[test]
    fn clear_empties_jar() {
        let jar = Jar::new();
        let origin = url("https://example.com/");
        jar.add_cookie_str("a=1", &origin);
        jar.clear();
        assert!(jar.cookies(&origin).is_none());
    }
}
