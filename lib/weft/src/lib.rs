//! HTTP client built around a composable interceptor chain.
//!
//! Every call flows through an ordered list of [`Interceptor`]s wrapped
//! around a terminal round trip: client-level interceptors first, then the
//! ones attached to the call. Each frame may rewrite the request, delegate
//! to [`Next`] at most once per attempt (or short-circuit without calling
//! it) and inspect or replace the reply. Only a retry loop calls [`Next`]
//! again, once for each new attempt.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use weft::Client;
//! use weft::middleware::{BearerAuth, Retry, SetHeader};
//!
//! let client = Client::builder()
//!     .interceptor(SetHeader::new("user-agent", "weft/0.1")?)
//!     .interceptor(BearerAuth::new("my-token")?)
//!     .build();
//!
//! let reply = client
//!     .get("https://api.example.com/users/42")
//!     .with(Retry::new(3))
//!     .timeout(Duration::from_secs(5))
//!     .await?;
//!
//! let user: User = reply.json()?;
//! ```

mod chain;
mod client;
mod config;
mod connector;
mod cookie;
mod interceptor;
pub mod middleware;
pub mod prelude;
mod redirect;
mod transport;

pub use chain::{Chain, Composed};
pub use client::{Call, CallOptions, Client, ClientBuilder, RoundTrip};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use self::cookie::{CookieStore, Jar};
pub use interceptor::{BoxFuture, Doer, Interceptor, Next};
pub use redirect::{Action, Attempt, DEFAULT_MAX_REDIRECTS, RedirectPolicy};
pub use transport::{BoxedService, HyperTransport, ServiceTransport, Transport};

// Re-export tower for transport composition
pub use tower;

// Re-export core types
pub use weft_core::{
    Body, BodyStream, CancellationToken, ContentType, Context, Error, Method, Payload, Reply,
    Request, RequestBuilder, RequestHead, Response, Result, Structured, from_json, split_hosts,
    to_form, to_json, to_query_string,
};

// Re-export http types for status codes and headers
pub use weft_core::{HeaderMap, StatusCode, header};

// Re-export url for request rewriting
pub use url;
