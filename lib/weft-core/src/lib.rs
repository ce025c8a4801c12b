//! Core value types for the weft interceptor-chain HTTP client.
//!
//! This crate provides the types every interceptor works with:
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`RequestBuilder`] - mutable outbound request
//! - [`Reply`] and [`Response`] - immutable inbound reply
//! - [`Context`] - deadline and cancellation for one call
//! - [`Body`] and [`Payload`] - request bodies and their sources
//! - [`Error`] and [`Result`] - Error handling
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)
//! - [`header`] - HTTP header names (re-exported from `http` crate)

mod body;
mod context;
mod error;
mod method;
pub mod prelude;
mod reply;
mod request;
mod response;

pub use body::{
    Body, BodyStream, ContentType, Payload, Structured, from_json, to_form, to_json,
    to_query_string,
};
pub use context::Context;
pub use error::{Error, Result};
pub use method::Method;
pub use reply::Reply;
pub use request::{Request, RequestBuilder, RequestHead, split_hosts};
pub use response::Response;

// Re-export http crate types for status codes and headers
pub use http::{HeaderMap, StatusCode, header};
pub use tokio_util::sync::CancellationToken;
