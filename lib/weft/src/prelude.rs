//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits
//! for easy glob importing:
//!
//! ```ignore
//! use weft::prelude::*;
//! ```

pub use crate::{
    BoxFuture, Call, CallOptions, Client, ClientConfig, ContentType, Context, Doer, Error,
    Interceptor, Method, Next, Payload, RedirectPolicy, Reply, Request, RequestBuilder, Response,
    Result, StatusCode, Transport, from_json, header, to_form, to_json,
};
pub use serde::{Deserialize, Serialize};
