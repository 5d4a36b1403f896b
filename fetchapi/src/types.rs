//! Request-like and response-like values exchanged with a [`Fetcher`](crate::Fetcher).

use std::path::PathBuf;

/// The media type a well-behaved server sends for WebAssembly binaries.
pub const WASM_CONTENT_TYPE: &str = "application/wasm";

/// A request for a module payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// URL or filesystem path of the resource.
    pub url: String,
    /// Exact filesystem path, for requests built from a path rather than a
    /// URL. Takes precedence over `url`, which then only names the request.
    pub path: Option<PathBuf>,
    /// Extra request headers, in insertion order.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// A plain GET-style request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
            headers: Vec::new(),
        }
    }

    /// A request for a local file. The path is kept as-is, so names that
    /// are not valid UTF-8 still resolve.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            url: path.display().to_string(),
            path: Some(path),
            headers: Vec::new(),
        }
    }

    /// Add a header to the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The URL scheme (`file`, `https`, ...) or `None` for a bare path or a
    /// request built with [`file`](Self::file).
    ///
    /// Single-letter schemes are treated as Windows drive letters, not schemes.
    pub fn scheme(&self) -> Option<&str> {
        if self.path.is_some() {
            return None;
        }
        let (scheme, _) = self.url.split_once("://")?;
        let valid = scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(scheme)
    }
}

/// A response carrying a module payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// The URL the body was obtained from.
    pub url: String,
    /// HTTP-style status code. Local sources report 200.
    pub status: u16,
    /// Declared media type, if the source reported one.
    pub content_type: Option<String>,
    /// The payload.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A successful response with a `application/wasm` body.
    pub fn ok(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some(WASM_CONTENT_TYPE.to_string()),
            body,
        }
    }

    /// A response with the given status and an empty body.
    pub fn with_status(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the declared media type is exactly `application/wasm`
    /// (parameters such as `; charset=` are ignored).
    pub fn is_wasm_content_type(&self) -> bool {
        match &self.content_type {
            Some(ct) => ct
                .split(';')
                .next()
                .map(|mime| mime.trim().eq_ignore_ascii_case(WASM_CONTENT_TYPE))
                .unwrap_or(false),
            None => false,
        }
    }
}
