//! Accepted load sources and their resolution to a compilable payload.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use bindbridge_fetchapi::{FetchError, FetchRequest, FetchResponse, Fetcher};
use tracing::{debug, warn};
use wasmtime::Module;

use crate::error::BridgeError;

/// A source that resolves to another [`InitInput`] later.
pub type DeferredInput = Pin<Box<dyn Future<Output = Result<InitInput, FetchError>> + Send>>;

/// Everything `load` accepts.
pub enum InitInput {
    /// URL handed to the fetcher.
    Url(String),
    /// Filesystem path handed to the fetcher.
    Path(PathBuf),
    /// Request-like value handed to the fetcher.
    Request(FetchRequest),
    /// Already-fetched response; only its status and body are used.
    Response(FetchResponse),
    /// Raw module bytes (binary, or text format).
    Bytes(Vec<u8>),
    /// A module compiled by the loader's engine.
    Module(Module),
    /// A value that resolves to one of the above.
    Deferred(DeferredInput),
}

impl InitInput {
    /// Wrap a future producing an input.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = Result<InitInput, FetchError>> + Send + 'static,
    {
        Self::Deferred(Box::pin(fut))
    }

    /// True for inputs that go through the fetcher.
    pub fn is_fetchable(&self) -> bool {
        matches!(self, Self::Url(_) | Self::Path(_) | Self::Request(_))
    }
}

impl fmt::Debug for InitInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Request(req) => f.debug_tuple("Request").field(&req.url).finish(),
            Self::Response(resp) => f
                .debug_struct("Response")
                .field("url", &resp.url)
                .field("status", &resp.status)
                .finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Module(_) => f.write_str("Module(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<Vec<u8>> for InitInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for InitInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for InitInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<FetchRequest> for InitInput {
    fn from(req: FetchRequest) -> Self {
        Self::Request(req)
    }
}

impl From<FetchResponse> for InitInput {
    fn from(resp: FetchResponse) -> Self {
        Self::Response(resp)
    }
}

impl From<Module> for InitInput {
    fn from(module: Module) -> Self {
        Self::Module(module)
    }
}

/// What a resolved input hands to the compile step.
pub enum Payload {
    Bytes(Vec<u8>),
    Module(Module),
}

/// Await deferred values and fetch fetchable ones until only bytes or a module remain.
pub async fn resolve_payload(
    input: InitInput,
    fetcher: &dyn Fetcher,
) -> Result<Payload, BridgeError> {
    let mut input = input;
    loop {
        input = match input {
            InitInput::Deferred(fut) => {
                debug!("awaiting deferred source");
                fut.await?
            }
            InitInput::Url(url) => InitInput::Request(FetchRequest::get(url)),
            InitInput::Path(path) => InitInput::Request(FetchRequest::file(path)),
            InitInput::Request(req) => {
                debug!(url = %req.url, "fetching module");
                InitInput::Response(fetcher.fetch(&req).await?)
            }
            InitInput::Response(resp) => return response_body(resp).map(Payload::Bytes),
            InitInput::Bytes(bytes) => return Ok(Payload::Bytes(bytes)),
            InitInput::Module(module) => return Ok(Payload::Module(module)),
        };
    }
}

/// Accept a response body if the status is a success.
///
/// A declared media type other than `application/wasm` only rates a warning;
/// the body is still compiled from bytes.
fn response_body(resp: FetchResponse) -> Result<Vec<u8>, BridgeError> {
    if !resp.is_success() {
        return Err(FetchError::Status {
            url: resp.url,
            status: resp.status,
        }
        .into());
    }
    if resp.content_type.is_some() && !resp.is_wasm_content_type() {
        warn!(
            url = %resp.url,
            content_type = resp.content_type.as_deref().unwrap_or_default(),
            "module served with unexpected media type; compiling from bytes"
        );
    }
    Ok(resp.body)
}
