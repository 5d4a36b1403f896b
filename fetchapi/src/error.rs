//! Fetch error types.

/// Why a module payload could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Nothing exists at the requested location.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The location exists but reading it failed.
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The response carried a non-success status.
    #[error("fetching {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The fetcher cannot handle this URL scheme.
    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },

    /// The URL could not be parsed or does not name a local file.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A deferred source was rejected before producing a value.
    #[error("deferred source rejected: {0}")]
    Rejected(String),
}

impl FetchError {
    /// Classify an I/O error for `location`, folding `NotFound` into its own variant.
    pub fn from_io(location: impl Into<String>, source: std::io::Error) -> Self {
        let location = location.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(location)
        } else {
            Self::Io { location, source }
        }
    }
}
