//! Interceptors for the weft HTTP client.
//!
//! Each type here implements [`crate::Interceptor`] and can be registered on
//! the client (runs for every call) or on a single call. Client-level
//! interceptors run first; within a list, the first registered is the
//! outermost frame.
//!
//! # Feature Flags
//!
//! Interceptors with extra dependencies are feature-gated:
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `middleware-basic-auth` | [`BasicAuth`] (`base64`) |
//! | `middleware-retry` | [`Retry`] and [`Backoff`] (`rand` for jitter) |
//! | `middleware-balancer` | [`balancer`] pickers (`rand`, `xxhash-rust`) |
//! | `middleware-full` | All of the above |
//!
//! # Available Interceptors
//!
//! - [`SetHeader`], [`SetHeaders`], [`AddHeader`], [`DelHeader`] - Header rewriting
//! - [`BasicAuth`], [`BearerAuth`], [`CustomToken`], [`ApiKey`] - Credentials
//! - [`PathParams`], [`QueryParams`] - URL rewriting
//! - [`SetBody`] - Request body with matching `Content-Type`
//! - [`Accept`] - `Accept` header with optional reply check
//! - [`Cookies`], [`ClearCookies`] - Per-call `Cookie` header
//! - [`Logging`] - Logs requests and replies using `tracing`
//! - [`Retry`] - Retries with backoff
//! - [`balancer::Balancer`] - Picks one host out of a candidate list
//!
//! # Example
//!
//! ```ignore
//! use weft::Client;
//! use weft::middleware::{Accept, Logging, Retry, SetBody};
//!
//! let client = Client::builder()
//!     .interceptor(Logging::new())
//!     .interceptor(Retry::new(3))
//!     .build();
//!
//! let reply = client
//!     .post("https://api.example.com/users")
//!     .with(Accept::json())
//!     .with(SetBody::json(new_user))
//!     .await?;
//! ```

mod accept;
mod auth;
#[cfg(feature = "middleware-balancer")]
pub mod balancer;
mod body;
mod cookie;
mod header;
mod logging;
#[cfg(feature = "middleware-retry")]
mod retry;
mod url;

pub use accept::Accept;
#[cfg(feature = "middleware-basic-auth")]
pub use auth::BasicAuth;
pub use auth::{ApiKey, BearerAuth, CustomToken};
pub use body::SetBody;
pub use self::cookie::{ClearCookies, Cookies};
pub use header::{AddHeader, DelHeader, SetHeader, SetHeaders};
pub use logging::{LogLevel, Logging};
#[cfg(feature = "middleware-retry")]
pub use retry::{
    ATTEMPT_HEADER, Backoff, DEFAULT_RETRYABLE_STATUS, Retry, RetryConfig, RetryOnError,
    RetryOnStatus, default_retry_on_error, default_retry_on_status, jitter_up,
};
pub use self::url::{PathParams, QueryParams};
