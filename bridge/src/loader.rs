//! Loader — Wasmtime engine, payload resolution, compilation, and instantiation.
//!
//! Loading is a two-phase protocol. [`Loader::request`] returns a
//! [`PendingLoad`] immediately without doing any work; awaiting it fetches
//! the payload (if the source is fetchable), compiles, validates,
//! instantiates, and runs the start routine. Dropping a `PendingLoad`
//! abandons the load. Nothing is retried and no timeout is imposed.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bindbridge_fetchapi::{DefaultFetcher, Fetcher};
use tracing::{debug, info};
use wasmtime::{Config, Engine, Module};

use crate::cache::ModuleCache;
use crate::config::LoaderConfig;
use crate::error::BridgeError;
use crate::handle::ModuleHandle;
use crate::source::{resolve_payload, InitInput, Payload};
use crate::validation::validate_module;

/// Produces [`ModuleHandle`]s from any accepted [`InitInput`].
///
/// Cheap to clone; clones share the engine, fetcher, and module cache.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    engine: Engine,
    config: LoaderConfig,
    fetcher: Arc<dyn Fetcher>,
    cache: Mutex<ModuleCache>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.config)
            .field("cached_modules", &self.cached_modules())
            .finish()
    }
}

impl Loader {
    /// Create a loader that reads paths and `file://` URLs from disk and
    /// fetches `http(s)://` URLs over the network.
    pub fn new(config: LoaderConfig) -> Result<Self, BridgeError> {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::new()?))
    }

    /// Create a loader with a custom fetcher.
    pub fn with_fetcher(
        config: LoaderConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, BridgeError> {
        let engine = create_engine(&config)?;
        let cache = ModuleCache::new(config.max_cached_modules);
        Ok(Self {
            inner: Arc::new(LoaderInner {
                engine,
                config,
                fetcher,
                cache: Mutex::new(cache),
            }),
        })
    }

    /// The engine modules must be compiled with to be accepted as `InitInput::Module`.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Compile `bytes` with this loader's engine. Bypasses the module cache.
    pub fn compile(&self, bytes: &[u8]) -> Result<Module, BridgeError> {
        Module::new(&self.inner.engine, bytes).map_err(BridgeError::Compile)
    }

    /// Number of compiled modules held in the cache.
    pub fn cached_modules(&self) -> usize {
        self.inner.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Drop every cached module. Live handles are unaffected.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.inner.cache.lock() {
            cache.clear();
        }
    }

    /// Start a load. No work happens until the returned future is polled.
    ///
    /// `None` loads from [`LoaderConfig::default_location`].
    pub fn request(&self, source: Option<InitInput>) -> PendingLoad {
        let inner = Arc::clone(&self.inner);
        let source = source.unwrap_or_else(|| {
            debug!(location = %inner.config.default_location, "no source given; using default location");
            InitInput::Url(inner.config.default_location.clone())
        });
        PendingLoad {
            fut: Box::pin(async move { inner.load(source).await }),
        }
    }

    /// Load and instantiate a unit.
    pub async fn load(&self, source: Option<InitInput>) -> Result<ModuleHandle, BridgeError> {
        self.request(source).await
    }
}

impl LoaderInner {
    async fn load(&self, source: InitInput) -> Result<ModuleHandle, BridgeError> {
        info!(source = ?source, "loading module");
        let (module, uncached) = match resolve_payload(source, self.fetcher.as_ref()).await? {
            Payload::Bytes(bytes) => self.compile(&bytes)?,
            Payload::Module(module) => {
                if !Engine::same(module.engine(), &self.engine) {
                    return Err(BridgeError::Instantiation(
                        "module was compiled by a different engine".into(),
                    ));
                }
                (module, None)
            }
        };
        validate_module(&module)?;
        if let Some(digest) = uncached {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(digest, module.clone());
            }
        }
        let handle = ModuleHandle::instantiate(&self.engine, &module, &self.config)?;
        info!(exports = handle.exports().len(), "module ready");
        Ok(handle)
    }

    /// Compile `bytes`, or reuse a cached module for the same payload.
    ///
    /// A freshly compiled module comes back with its digest so the caller
    /// can cache it once it has passed validation.
    fn compile(&self, bytes: &[u8]) -> Result<(Module, Option<blake3::Hash>), BridgeError> {
        if self.config.max_cached_modules == 0 {
            let module = Module::new(&self.engine, bytes).map_err(BridgeError::Compile)?;
            return Ok((module, None));
        }

        let digest = blake3::hash(bytes);
        let cached = self.cache.lock().ok().and_then(|cache| cache.get(&digest));
        if let Some(module) = cached {
            debug!(digest = %digest.to_hex(), "module cache hit");
            return Ok((module, None));
        }

        debug!(digest = %digest.to_hex(), len = bytes.len(), "compiling module");
        let module = Module::new(&self.engine, bytes).map_err(BridgeError::Compile)?;
        Ok((module, Some(digest)))
    }
}

/// A load in flight. Resolves once, to a handle or an error.
#[must_use = "a PendingLoad does nothing unless awaited"]
pub struct PendingLoad {
    fut: Pin<Box<dyn Future<Output = Result<ModuleHandle, BridgeError>> + Send>>,
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingLoad(..)")
    }
}

impl Future for PendingLoad {
    type Output = Result<ModuleHandle, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.fut.as_mut().poll(cx)
    }
}

/// Load a unit with a default filesystem loader.
///
/// `None` loads `package_bg.wasm` from the current directory.
pub async fn init(source: Option<InitInput>) -> Result<ModuleHandle, BridgeError> {
    Loader::new(LoaderConfig::default())?.load(source).await
}

/// Create a Wasmtime engine for the given configuration.
fn create_engine(config: &LoaderConfig) -> Result<Engine, BridgeError> {
    let mut wasm_config = Config::new();

    // Fuel metering only when a budget is configured
    wasm_config.consume_fuel(config.fuel_limit.is_some());

    Engine::new(&wasm_config).map_err(BridgeError::Compile)
}
