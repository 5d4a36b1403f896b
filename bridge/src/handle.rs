//! The module handle — one instantiated unit and its marshaling surface.
//!
//! A `ModuleHandle` owns its Wasmtime `Store`, so linear memory is never
//! shared between handles. Every method takes `&mut self` (or `&self` for
//! pure reads), which makes the handle non-reentrant by construction: no
//! second call can start while one is running.
//!
//! Any trap poisons the handle. Later exported calls fail with
//! [`BridgeError::Poisoned`] without entering the unit. Host-side access
//! errors (bad offsets, unknown exports, wrong arity) leave it usable.

use std::fmt;

use tracing::{debug, warn};
use wasmtime::{Engine, Instance, Module, Store, Trap, Val};

use crate::config::LoaderConfig;
use crate::error::BridgeError;
use crate::exports::{collect_dispatch, BridgeExports};
use crate::host_state::BridgeState;
use crate::memory::{self, ptr_from_abi, ptr_to_abi, GuestSlice};
use crate::table::{call_with_i32s, ClosureContext, IndirectTable, InvocableId, InvocableTable};
use crate::validation::{
    EXN_STORE_EXPORT, FREE_EXPORT, MALLOC_EXPORT, REALLOC_EXPORT, RENDER_EXPORT, START_EXPORT,
};

/// Lifecycle of a handle after instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    /// Exported calls may be issued.
    Ready,
    /// A trap occurred; the handle must be discarded.
    Poisoned(String),
}

/// One instantiated unit.
pub struct ModuleHandle {
    store: Store<BridgeState>,
    instance: Instance,
    exports: BridgeExports,
    invocables: InvocableTable,
    table: Option<IndirectTable>,
    export_names: Vec<String>,
    fuel_limit: Option<u64>,
    state: HandleState,
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("state", &self.state)
            .field("exports", &self.export_names.len())
            .field("trampolines", &self.invocables.len())
            .field("table", &self.table.as_ref().map(|t| t.name()))
            .finish()
    }
}

impl ModuleHandle {
    /// Instantiate an already validated module with no imports and run its
    /// start routine.
    pub(crate) fn instantiate(
        engine: &Engine,
        module: &Module,
        config: &LoaderConfig,
    ) -> Result<Self, BridgeError> {
        let mut store = Store::new(engine, BridgeState::new(config));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = config.fuel_limit {
            store.set_fuel(fuel).map_err(BridgeError::Compile)?;
        }

        let instance = Instance::new(&mut store, module, &[]).map_err(|e| {
            // A wasm-level start section runs inside Instance::new.
            if e.downcast_ref::<Trap>().is_some() {
                classify_trap("<start section>", e)
            } else {
                BridgeError::Instantiation(format!("{:#}", e))
            }
        })?;

        let exports = BridgeExports::resolve(&mut store, &instance)?;
        let (invocables, table) = collect_dispatch(&mut store, &instance);
        let export_names = module.exports().map(|e| e.name().to_string()).collect();

        let mut handle = Self {
            store,
            instance,
            exports,
            invocables,
            table,
            export_names,
            fuel_limit: config.fuel_limit,
            state: HandleState::Ready,
        };

        if config.run_start {
            if let Some(start) = handle.exports.start.clone() {
                debug!("running start routine");
                handle.guarded(START_EXPORT, |store| start.call(store, ()))?;
            }
        }
        Ok(handle)
    }

    // ── Lifecycle ──

    pub fn state(&self) -> &HandleState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandleState::Ready
    }

    /// Names of every export of the unit, in module order.
    pub fn exports(&self) -> &[String] {
        &self.export_names
    }

    // ── Entry points ──

    /// Call the unit's `render` entry point.
    pub fn render(&mut self) -> Result<(), BridgeError> {
        let render = self.exports.render.clone();
        self.guarded(RENDER_EXPORT, |store| render.call(store, ()))
    }

    /// Call any other `() -> ()` export by name.
    pub fn call_void(&mut self, name: &str) -> Result<(), BridgeError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| BridgeError::UnknownExport(name.to_string()))?;
        let ty = func.ty(&self.store);
        if ty.params().len() != 0 {
            return Err(BridgeError::ArityMismatch {
                name: name.to_string(),
                expected: ty.params().len(),
                got: 0,
            });
        }
        let typed = func
            .typed::<(), ()>(&self.store)
            .map_err(|_| BridgeError::SignatureMismatch {
                name: name.to_string(),
                expected: "() -> ()",
                params: ty.params().len(),
                results: ty.results().len(),
            })?;
        self.guarded(name, |store| typed.call(store, ()))
    }

    // ── Linear memory ──

    /// Current linear memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.exports.memory.data_size(&self.store)
    }

    /// Current linear memory size in pages.
    pub fn memory_pages(&self) -> u64 {
        self.exports.memory.size(&self.store)
    }

    pub fn read_bytes(&self, ptr: u32, len: usize) -> Result<Vec<u8>, BridgeError> {
        let data = self.exports.memory.data(&self.store);
        Ok(memory::read_bytes(data, ptr, len)?)
    }

    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), BridgeError> {
        let data = self.exports.memory.data_mut(&mut self.store);
        Ok(memory::write_bytes(data, ptr, bytes)?)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, BridgeError> {
        let data = self.exports.memory.data(&self.store);
        Ok(memory::read_u32(data, ptr)?)
    }

    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), BridgeError> {
        let data = self.exports.memory.data_mut(&mut self.store);
        Ok(memory::write_u32(data, ptr, value)?)
    }

    /// Read a UTF-8 string the unit placed at `slice`.
    pub fn read_str(&self, slice: GuestSlice) -> Result<String, BridgeError> {
        let bytes = self.read_bytes(slice.ptr, slice.len as usize)?;
        String::from_utf8(bytes).map_err(|_| BridgeError::InvalidUtf8 {
            ptr: slice.ptr,
            len: slice.len,
        })
    }

    // ── Allocator ──

    /// Allocate `len` bytes with the unit's allocator.
    pub fn alloc(&mut self, len: u32) -> Result<GuestSlice, BridgeError> {
        let malloc = self.exports.malloc.clone();
        let ptr = self.guarded(MALLOC_EXPORT, |store| malloc.call(store, ptr_to_abi(len)))?;
        Ok(GuestSlice::new(ptr_from_abi(ptr), len))
    }

    /// Resize an allocation. The returned slice may have moved.
    pub fn realloc(&mut self, slice: GuestSlice, new_len: u32) -> Result<GuestSlice, BridgeError> {
        let realloc = self.exports.realloc.clone();
        let args = (ptr_to_abi(slice.ptr), ptr_to_abi(slice.len), ptr_to_abi(new_len));
        let ptr = self.guarded(REALLOC_EXPORT, |store| realloc.call(store, args))?;
        Ok(GuestSlice::new(ptr_from_abi(ptr), new_len))
    }

    /// Return an allocation to the unit's allocator.
    pub fn free(&mut self, slice: GuestSlice) -> Result<(), BridgeError> {
        let free = self.exports.free.clone();
        let args = (ptr_to_abi(slice.ptr), ptr_to_abi(slice.len));
        self.guarded(FREE_EXPORT, |store| free.call(store, args))
    }

    /// Copy `bytes` into a fresh allocation.
    pub fn pass_bytes(&mut self, bytes: &[u8]) -> Result<GuestSlice, BridgeError> {
        let len = u32::try_from(bytes.len()).map_err(|_| memory::OutOfBounds {
            ptr: 0,
            len: bytes.len(),
            mem_size: self.memory_size(),
        })?;
        let slice = self.alloc(len)?;
        self.write_bytes(slice.ptr, bytes)?;
        Ok(slice)
    }

    /// Copy a string into a fresh allocation as UTF-8.
    pub fn pass_str(&mut self, s: &str) -> Result<GuestSlice, BridgeError> {
        self.pass_bytes(s.as_bytes())
    }

    // ── Trampolines ──

    pub fn invocables(&self) -> &InvocableTable {
        &self.invocables
    }

    pub fn invocable(&self, name: &str) -> Option<InvocableId> {
        self.invocables.lookup(name)
    }

    /// Run the closure identified by `ctx` through trampoline `id`.
    pub fn invoke_closure(
        &mut self,
        id: InvocableId,
        ctx: ClosureContext,
        args: &[i32],
    ) -> Result<(), BridgeError> {
        let (name, invocable) = self
            .invocables
            .get(id)
            .map(|(n, i)| (n.to_string(), i.clone()))
            .ok_or_else(|| BridgeError::UnknownExport(format!("trampoline #{}", id.0)))?;
        if invocable.arity() != args.len() {
            return Err(BridgeError::ArityMismatch {
                name,
                expected: invocable.arity(),
                got: args.len(),
            });
        }
        self.guarded(&name, |store| invocable.call(store, ctx, args))
    }

    // ── Indirect calls ──

    /// Number of slots in the indirect-call table, if the unit exports one.
    pub fn table_len(&self) -> Option<u64> {
        self.table.as_ref().map(|t| t.len(&self.store))
    }

    /// Call the function in table slot `index` with i32 arguments.
    pub fn call_indirect(&mut self, index: u64, args: &[i32]) -> Result<Vec<Val>, BridgeError> {
        let table = self
            .table
            .clone()
            .ok_or_else(|| BridgeError::UnknownExport("indirect-call table".into()))?;
        self.ensure_ready()?;
        let func = table.resolve_call(&mut self.store, index, args)?;
        let label = format!("{}[{}]", table.name(), index);
        self.guarded(&label, |store| call_with_i32s(store, &func, args))
    }

    // ── Exception slot ──

    /// Store `message` in the host heap and report its index to the unit's
    /// exception slot. Returns the heap index.
    pub fn store_exception(&mut self, message: impl Into<String>) -> Result<u32, BridgeError> {
        self.ensure_ready()?;
        let idx = self.store.data_mut().heap.insert(message.into());
        let exn_store = self.exports.exn_store.clone();
        self.guarded(EXN_STORE_EXPORT, |store| exn_store.call(store, ptr_to_abi(idx)))?;
        Ok(idx)
    }

    /// Remove a host value previously stored with [`store_exception`](Self::store_exception).
    pub fn take_exception(&mut self, idx: u32) -> Result<String, BridgeError> {
        self.store.data_mut().heap.take(idx)
    }

    /// Number of live host values.
    pub fn heap_len(&self) -> usize {
        self.store.data().heap.len()
    }

    // ── Internals ──

    fn ensure_ready(&self) -> Result<(), BridgeError> {
        match &self.state {
            HandleState::Ready => Ok(()),
            HandleState::Poisoned(reason) => Err(BridgeError::Poisoned(reason.clone())),
        }
    }

    /// Enter the unit: refuel, call, and poison the handle on a trap.
    fn guarded<R>(
        &mut self,
        export: &str,
        call: impl FnOnce(&mut Store<BridgeState>) -> anyhow::Result<R>,
    ) -> Result<R, BridgeError> {
        self.ensure_ready()?;
        if let Some(fuel) = self.fuel_limit {
            self.store.set_fuel(fuel).map_err(BridgeError::Compile)?;
        }
        call(&mut self.store).map_err(|e| {
            let err = classify_trap(export, e);
            warn!(export, error = %err, "unit trapped; handle poisoned");
            self.state = HandleState::Poisoned(err.to_string());
            err
        })
    }
}

/// Convert a failed call into the matching trap error.
///
/// Fuel exhaustion → `BridgeError::FuelExhausted`
/// Other traps → `BridgeError::Trapped`
fn classify_trap(export: &str, err: anyhow::Error) -> BridgeError {
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => BridgeError::FuelExhausted {
            export: export.to_string(),
        },
        _ => BridgeError::Trapped {
            export: export.to_string(),
            message: format!("{:#}", err),
        },
    }
}
