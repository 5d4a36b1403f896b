//! Module validation — bridge ABI compatibility checks.
//!
//! Validates that a compiled module can be driven by the bridge before any
//! instance is created. Checks:
//!
//! 1. `memory` export present
//! 2. Required function exports present with the expected signatures
//! 3. Optional exports, when present, have the expected signatures
//! 4. No imports at all (the bridge provides none)

use wasmtime::{ExternType, FuncType, Module, ValType};

use crate::error::BridgeError;

/// Exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";
/// Opaque entry point.
pub const RENDER_EXPORT: &str = "render";
pub const MALLOC_EXPORT: &str = "__wbindgen_malloc";
pub const REALLOC_EXPORT: &str = "__wbindgen_realloc";
pub const FREE_EXPORT: &str = "__wbindgen_free";
pub const EXN_STORE_EXPORT: &str = "__wbindgen_exn_store";
pub const START_EXPORT: &str = "__wbindgen_start";

/// Expected export: (name, param_count_of_i32, result_count_of_i32).
/// All params and results are i32 in the bridge ABI.
const REQUIRED_EXPORTS: &[(&str, usize, usize)] = &[
    (RENDER_EXPORT, 0, 0),
    (MALLOC_EXPORT, 1, 1),
    (REALLOC_EXPORT, 3, 1),
    (FREE_EXPORT, 2, 0),
    (EXN_STORE_EXPORT, 1, 0),
];

const OPTIONAL_EXPORTS: &[(&str, usize, usize)] = &[(START_EXPORT, 0, 0)];

fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

/// True if `ty` takes exactly `params` i32s and returns exactly `results` i32s.
pub fn has_i32_signature(ty: &FuncType, params: usize, results: usize) -> bool {
    let p: Vec<ValType> = ty.params().collect();
    let r: Vec<ValType> = ty.results().collect();
    p.len() == params && p.iter().all(is_i32) && r.len() == results && r.iter().all(is_i32)
}

/// Validate that a module meets the bridge ABI.
pub fn validate_module(module: &Module) -> Result<(), BridgeError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), BridgeError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == MEMORY_EXPORT && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(BridgeError::Validation(format!(
            "module must export '{}'",
            MEMORY_EXPORT
        )));
    }

    for &(name, params, results) in REQUIRED_EXPORTS {
        let export = module.exports().find(|e| e.name() == name).ok_or_else(|| {
            BridgeError::Validation(format!("missing required export: {}", name))
        })?;
        check_func_export(name, export.ty(), params, results)?;
    }

    for &(name, params, results) in OPTIONAL_EXPORTS {
        if let Some(export) = module.exports().find(|e| e.name() == name) {
            check_func_export(name, export.ty(), params, results)?;
        }
    }

    Ok(())
}

fn check_func_export(
    name: &str,
    ty: ExternType,
    params: usize,
    results: usize,
) -> Result<(), BridgeError> {
    let func_ty = match ty {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(BridgeError::Validation(format!(
                "export '{}' must be a function",
                name
            )))
        }
    };
    if !has_i32_signature(&func_ty, params, results) {
        return Err(BridgeError::Validation(format!(
            "export '{}' has wrong signature: expected {} i32 params and {} i32 results, got {} params and {} results",
            name,
            params,
            results,
            func_ty.params().len(),
            func_ty.results().len()
        )));
    }
    Ok(())
}

/// The bridge instantiates with an empty import list, so any import is fatal.
fn validate_imports(module: &Module) -> Result<(), BridgeError> {
    if let Some(import) = module.imports().next() {
        return Err(BridgeError::Validation(format!(
            "module imports {}::{} but the bridge provides no imports",
            import.module(),
            import.name()
        )));
    }
    Ok(())
}
