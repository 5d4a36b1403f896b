//! Resolution of an instance's exports into typed bridge entry points.

use tracing::{debug, warn};
use wasmtime::{Extern, Instance, Memory, Store, TypedFunc};

use crate::error::BridgeError;
use crate::host_state::BridgeState;
use crate::table::{is_trampoline_name, IndirectTable, Invocable, InvocableTable};
use crate::validation::{
    EXN_STORE_EXPORT, FREE_EXPORT, MALLOC_EXPORT, MEMORY_EXPORT, REALLOC_EXPORT, RENDER_EXPORT,
    START_EXPORT,
};

/// Typed handles to the exports the bridge drives directly.
#[derive(Clone)]
pub struct BridgeExports {
    pub memory: Memory,
    pub render: TypedFunc<(), ()>,
    pub malloc: TypedFunc<i32, i32>,
    pub realloc: TypedFunc<(i32, i32, i32), i32>,
    pub free: TypedFunc<(i32, i32), ()>,
    pub exn_store: TypedFunc<i32, ()>,
    pub start: Option<TypedFunc<(), ()>>,
}

impl BridgeExports {
    /// Look up every bridge export on `instance`.
    ///
    /// The module has already been validated, so a failure here means the
    /// validator and this lookup disagree.
    pub fn resolve(store: &mut Store<BridgeState>, instance: &Instance) -> Result<Self, BridgeError> {
        let memory = instance
            .get_memory(&mut *store, MEMORY_EXPORT)
            .ok_or_else(|| BridgeError::Instantiation(format!("no '{}' export", MEMORY_EXPORT)))?;
        let start = match instance.get_func(&mut *store, START_EXPORT) {
            Some(func) => Some(func.typed(&*store).map_err(typed_err(START_EXPORT))?),
            None => None,
        };
        Ok(Self {
            memory,
            render: typed(store, instance, RENDER_EXPORT)?,
            malloc: typed(store, instance, MALLOC_EXPORT)?,
            realloc: typed(store, instance, REALLOC_EXPORT)?,
            free: typed(store, instance, FREE_EXPORT)?,
            exn_store: typed(store, instance, EXN_STORE_EXPORT)?,
            start,
        })
    }
}

fn typed<P, R>(
    store: &mut Store<BridgeState>,
    instance: &Instance,
    name: &str,
) -> Result<TypedFunc<P, R>, BridgeError>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(typed_err(name))
}

fn typed_err(name: &str) -> impl FnOnce(anyhow::Error) -> BridgeError + '_ {
    move |e| BridgeError::Instantiation(format!("export '{}': {}", name, e))
}

/// Collect trampolines and the first funcref table from `instance`.
pub fn collect_dispatch(
    store: &mut Store<BridgeState>,
    instance: &Instance,
) -> (InvocableTable, Option<IndirectTable>) {
    let exports: Vec<(String, Extern)> = instance
        .exports(&mut *store)
        .map(|e| (e.name().to_string(), e.into_extern()))
        .collect();

    let mut invocables = InvocableTable::new();
    let mut table = None;
    for (name, ext) in exports {
        match ext {
            Extern::Func(func) if is_trampoline_name(&name) => {
                match Invocable::from_func(&*store, &func) {
                    Some(inv) => {
                        debug!(export = %name, arity = inv.arity(), "registered trampoline");
                        invocables.push(name, inv);
                    }
                    None => warn!(export = %name, "export looks like a trampoline but has an unsupported signature"),
                }
            }
            Extern::Table(t) if table.is_none() => {
                debug!(export = %name, "using indirect-call table");
                table = Some(IndirectTable::new(name, t));
            }
            _ => {}
        }
    }
    (invocables, table)
}
