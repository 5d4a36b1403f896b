//! `bindbridge` — Wasmtime-based loader and bridge for binding-generator output.
//!
//! This crate loads a compiled WebAssembly unit laid out the way
//! wasm-bindgen lays out its modules (a `render` entry point, allocator
//! hooks, closure trampolines, an exception slot, a start routine) and
//! exposes it through a [`ModuleHandle`]. It provides:
//!
//! - **Loading:** URLs, paths, requests, responses, bytes, precompiled
//!   modules, or a deferred value resolving to any of them
//! - **Validation:** required exports checked, imports rejected, before
//!   anything is instantiated
//! - **Isolation:** one Wasmtime store per handle; memories never alias
//! - **Marshaling:** bounds-checked memory access, allocator-backed
//!   buffers, arity-checked trampolines, checked indirect calls
//! - **Trap handling:** traps surface as errors and poison the handle
//!
//! The primary entry points are [`init`] and [`Loader::load`].

pub mod error;
pub mod config;
pub mod cache;
pub mod memory;
pub mod host_state;
pub mod validation;
pub mod table;
pub mod exports;
pub mod source;
pub mod handle;
pub mod loader;

pub use error::{BridgeError, ErrorKind};
pub use config::LoaderConfig;
pub use memory::GuestSlice;
pub use table::{ClosureContext, Invocable, InvocableId};
pub use source::InitInput;
pub use handle::{HandleState, ModuleHandle};
pub use loader::{init, Loader, PendingLoad};

pub use bindbridge_fetchapi as fetch;
