//! In-memory fetcher for testing and embedding.
//!
//! `MemFetcher` serves canned responses keyed by URL and records every
//! URL it was asked for, so tests can assert on what the loader fetched.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::FetchError;
use crate::traits::{FetchFuture, Fetcher};
use crate::types::{FetchRequest, FetchResponse};

/// Canned-response fetcher backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemFetcher {
    responses: BTreeMap<String, FetchResponse>,
    requested: Mutex<Vec<String>>,
}

impl MemFetcher {
    /// Create an empty fetcher. Every fetch fails with `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn insert(&mut self, url: impl Into<String>, body: Vec<u8>) {
        let url = url.into();
        self.responses
            .insert(url.clone(), FetchResponse::ok(url, body));
    }

    /// Serve an arbitrary response at its own URL.
    pub fn insert_response(&mut self, response: FetchResponse) {
        self.responses.insert(response.url.clone(), response);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.insert(url, body);
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of canned responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if no responses are registered.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl Fetcher for MemFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(request.url.clone());
        }
        let result = self
            .responses
            .get(&request.url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(request.url.clone()));
        Box::pin(async move { result })
    }
}
