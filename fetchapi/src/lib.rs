//! `bindbridge-fetchapi` — payload acquisition for the bindbridge loader.
//!
//! The loader never touches the network or filesystem itself. Every
//! fetchable source is handed to a [`Fetcher`], which turns a
//! [`FetchRequest`] into a [`FetchResponse`]. This crate provides:
//!
//! - `Fetcher` trait — the asynchronous fetch seam
//! - `FetchRequest` / `FetchResponse` — request-like and response-like values
//! - `FsFetcher` — filesystem paths and `file://` URLs
//! - `HttpFetcher` — `http://` and `https://` URLs
//! - `DefaultFetcher` — dispatches to one of the two by scheme
//! - `MemFetcher` — in-memory responses for tests and embedding
//! - `FetchError` — why a payload could not be obtained

pub mod error;
pub mod types;
pub mod traits;
pub mod fs_fetcher;
pub mod http_fetcher;
pub mod default_fetcher;
pub mod mem_fetcher;

// Re-export commonly used types at the crate root.
pub use error::FetchError;
pub use types::{FetchRequest, FetchResponse, WASM_CONTENT_TYPE};
pub use traits::{FetchFuture, Fetcher};
pub use fs_fetcher::FsFetcher;
pub use http_fetcher::HttpFetcher;
pub use default_fetcher::DefaultFetcher;
pub use mem_fetcher::MemFetcher;

// Callers configuring an `HttpFetcher` client need the same reqwest version.
pub use reqwest;
