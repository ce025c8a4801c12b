//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use weft_core::prelude::*;
//! ```

pub use crate::{
    Body, ContentType, Context, Error, Method, Payload, Reply, Request, RequestBuilder,
    RequestHead, Response, Result, from_json, to_form, to_json,
};
