//! The fetch seam between the loader and the outside world.

use std::future::Future;
use std::pin::Pin;

use crate::error::FetchError;
use crate::types::{FetchRequest, FetchResponse};

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>>;

/// Source of module payloads for fetchable inputs (URLs, paths, requests).
///
/// Implementations report transport failures as `Err`. A response with a
/// non-success status is returned as `Ok`; the loader decides what to do
/// with it. Fetches are not retried by the caller.
pub trait Fetcher: Send + Sync {
    /// Obtain the resource described by `request`.
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a>;
}
