//! Filesystem fetcher.
//!
//! Handles path requests, bare paths and `file://` URLs. Relative paths
//! resolve against the fetcher's root directory, so a loader configured
//! with a relative default location behaves the same regardless of the
//! process cwd.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::traits::{FetchFuture, Fetcher};
use crate::types::{FetchRequest, FetchResponse};

/// Reads module payloads from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsFetcher {
    root: Option<PathBuf>,
}

impl FsFetcher {
    /// Fetcher resolving relative paths against the current directory.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Fetcher resolving relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Map a request to the path it names.
    pub fn resolve(&self, request: &FetchRequest) -> Result<PathBuf, FetchError> {
        if let Some(path) = &request.path {
            return Ok(self.anchor(path));
        }
        match request.scheme() {
            None => Ok(self.anchor(Path::new(&request.url))),
            Some("file") => file_url_to_path(&request.url),
            Some(scheme) => Err(FetchError::UnsupportedScheme {
                scheme: scheme.to_string(),
                url: request.url.clone(),
            }),
        }
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Fetcher for FsFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            let path = self.resolve(request)?;
            debug!(path = %path.display(), "reading module payload");
            let body = tokio::fs::read(&path)
                .await
                .map_err(|e| FetchError::from_io(path.display().to_string(), e))?;
            // Local files carry no media type; the loader treats that as a plain byte source.
            Ok(FetchResponse {
                url: request.url.clone(),
                status: 200,
                content_type: None,
                body,
            })
        })
    }
}

/// Decode a `file://` URL. The host must be empty or `localhost`.
fn file_url_to_path(raw: &str) -> Result<PathBuf, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    url.to_file_path().map_err(|()| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: "file URL host must be empty or localhost".to_string(),
    })
}
