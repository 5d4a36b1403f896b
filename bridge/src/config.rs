//! Loader configuration.

use serde::Deserialize;

use crate::error::BridgeError;

/// Artifact name the binding generator emits next to its glue code.
pub const DEFAULT_LOCATION: &str = "package_bg.wasm";

/// Configuration for a [`Loader`](crate::Loader).
///
/// Controls where an omitted source is fetched from and the resource limits
/// applied to every handle the loader produces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Location fetched when `load` is called without a source.
    pub default_location: String,

    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel granted to each exported call, including the start routine.
    /// `None` disables fuel metering.
    pub fuel_limit: Option<u64>,

    /// How many compiled modules to keep for byte-identical payloads.
    /// Oldest entries are evicted first; `0` disables the cache.
    pub max_cached_modules: usize,

    /// Run `__wbindgen_start` after instantiation when the unit exports it.
    pub run_start: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_location: DEFAULT_LOCATION.to_string(),
            max_memory_pages: 256,       // 16 MiB
            fuel_limit: None,
            max_cached_modules: 64,
            run_start: true,
        }
    }
}

impl LoaderConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(json)
            .map_err(|e| BridgeError::InvalidConfig(e.to_string()))
    }

    /// Memory limit in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_pages as usize) * crate::memory::PAGE_SIZE
    }
}
