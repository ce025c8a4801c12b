//! Host pickers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use http::HeaderMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;
use url::Url;

use crate::{Context, Error, Result, split_hosts};

/// What a picker sees of the request.
#[derive(Debug, Clone, Copy)]
pub struct PickInfo<'a> {
    host_field: &'a str,
    url: &'a Url,
    headers: &'a HeaderMap,
    context: &'a Context,
}

impl<'a> PickInfo<'a> {
    /// Describe a request to a picker.
    #[must_use]
    pub const fn new(
        host_field: &'a str,
        url: &'a Url,
        headers: &'a HeaderMap,
        context: &'a Context,
    ) -> Self {
        Self {
            host_field,
            url,
            headers,
            context,
        }
    }

    /// The raw comma-separated candidate list.
    #[must_use]
    pub const fn host_field(&self) -> &'a str {
        self.host_field
    }

    /// The request URL.
    #[must_use]
    pub const fn url(&self) -> &'a Url {
        self.url
    }

    /// The request headers.
    #[must_use]
    pub const fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// The call context.
    #[must_use]
    pub const fn context(&self) -> &'a Context {
        self.context
    }

    /// The candidates, trimmed and without empty tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHostList`] when nothing is left.
    pub fn hosts(&self) -> Result<Vec<&'a str>> {
        let hosts: Vec<_> = split_hosts(self.host_field).collect();
        if hosts.is_empty() {
            return Err(Error::EmptyHostList);
        }
        Ok(hosts)
    }
}

/// Chooses one host out of a candidate list.
pub trait Picker: Send + Sync + 'static {
    /// Pick a `host[:port]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHostList`] when there is no candidate.
    fn pick(&self, info: &PickInfo<'_>) -> Result<String>;
}

fn host_at(hosts: &[&str], index: usize) -> Result<String> {
    hosts
        .get(index)
        .map(|host| (*host).to_owned())
        .ok_or(Error::EmptyHostList)
}

/// Always the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPicker;

impl Picker for FirstPicker {
    fn pick(&self, info: &PickInfo<'_>) -> Result<String> {
        let hosts = info.hosts()?;
        host_at(&hosts, 0)
    }
}

/// A uniformly random candidate.
#[derive(Debug)]
pub struct RandomPicker {
    rng: Mutex<StdRng>,
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPicker {
    /// Seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Seeded for reproducible sequences.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Picker for RandomPicker {
    fn pick(&self, info: &PickInfo<'_>) -> Result<String> {
        let hosts = info.hosts()?;
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..hosts.len());
        trace!(index, candidates = hosts.len(), "random pick");
        host_at(&hosts, index)
    }
}

/// Cycles through the candidates.
///
/// Each distinct candidate list keeps its own cursor, shared by every call
/// that goes through this picker.
#[derive(Debug, Default)]
pub struct RoundRobinPicker {
    cursors: Mutex<HashMap<String, usize>>,
}

impl RoundRobinPicker {
    /// Start every list at its first candidate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Picker for RoundRobinPicker {
    fn pick(&self, info: &PickInfo<'_>) -> Result<String> {
        let hosts = info.hosts()?;
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        let cursor = cursors.entry(info.host_field().to_owned()).or_insert(0);
        let index = *cursor % hosts.len();
        *cursor = (index + 1) % hosts.len();
        trace!(index, candidates = hosts.len(), "round-robin pick");
        host_at(&hosts, index)
    }
}

/// Where [`HashPicker`] reads its routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocation {
    /// A request header.
    Header(String),
    /// A query parameter.
    Query(String),
}

/// Hashes a routing key to a candidate, so equal keys land on the same
/// host.
///
/// A missing key hashes as the empty string.
#[derive(Debug, Clone)]
pub struct HashPicker {
    key: KeyLocation,
}

impl HashPicker {
    /// Route on the given key.
    #[must_use]
    pub const fn new(key: KeyLocation) -> Self {
        Self { key }
    }

    /// Route on a header value.
    #[must_use]
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(KeyLocation::Header(name.into()))
    }

    /// Route on a query parameter.
    #[must_use]
    pub fn query(name: impl Into<String>) -> Self {
        Self::new(KeyLocation::Query(name.into()))
    }

    fn routing_key(&self, info: &PickInfo<'_>) -> String {
        match &self.key {
            KeyLocation::Header(name) => info
                .headers()
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned(),
            KeyLocation::Query(name) => info
                .url()
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default(),
        }
    }
}

impl Picker for HashPicker {
    fn pick(&self, info: &PickInfo<'_>) -> Result<String> {
        let hosts = info.hosts()?;
        let key = self.routing_key(info);
        let hash = xxhash_rust::xxh64::xxh64(key.as_bytes(), 0);
        let index = usize::try_from(hash % hosts.len() as u64).unwrap_or_default();
        trace!(index, candidates = hosts.len(), "hash pick");
        host_at(&hosts, index)
    }
}
