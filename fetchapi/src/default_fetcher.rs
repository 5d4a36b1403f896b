//! Scheme-dispatching fetcher used by default loaders.

use crate::error::FetchError;
use crate::fs_fetcher::FsFetcher;
use crate::http_fetcher::HttpFetcher;
use crate::traits::{FetchFuture, Fetcher};
use crate::types::FetchRequest;

/// Sends `http(s)://` URLs to an [`HttpFetcher`] and everything else
/// (paths, `file://` URLs, unknown schemes) to an [`FsFetcher`].
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    fs: FsFetcher,
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self::from_parts(FsFetcher::new(), HttpFetcher::new()?))
    }

    pub fn from_parts(fs: FsFetcher, http: HttpFetcher) -> Self {
        Self { fs, http }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        if HttpFetcher::handles(request) {
            self.http.fetch(request)
        } else {
            self.fs.fetch(request)
        }
    }
}
