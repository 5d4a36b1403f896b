//! Closure trampolines and the indirect-call table.
//!
//! Trampolines are exported functions of the shape
//! `(ctx_a, ctx_b, arg0, .., argN) -> ()` that call back into a closure the
//! unit owns. The pair `(ctx_a, ctx_b)` is the closure's opaque data/vtable
//! pointer pair. Each trampoline is classified by arity once, at
//! instantiation, and stored in an [`InvocableTable`] arena addressed by
//! [`InvocableId`].
//!
//! The exported funcref table is wrapped in an [`IndirectTable`] whose
//! accessors check the index and the slot contents before calling.

use anyhow::anyhow;
use wasmtime::{AsContext, AsContextMut, Func, Table, TypedFunc, Val, ValType};

use crate::error::BridgeError;

/// Highest number of caller-supplied arguments a trampoline may take.
pub const MAX_TRAMPOLINE_ARITY: usize = 3;

/// Opaque context pointer pair identifying one closure inside the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosureContext {
    pub a: i32,
    pub b: i32,
}

impl ClosureContext {
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }
}

/// A trampoline, keyed by how many arguments it forwards to the closure.
#[derive(Clone)]
pub enum Invocable {
    Nullary(TypedFunc<(i32, i32), ()>),
    Unary(TypedFunc<(i32, i32, i32), ()>),
    Binary(TypedFunc<(i32, i32, i32, i32), ()>),
    Ternary(TypedFunc<(i32, i32, i32, i32, i32), ()>),
}

impl std::fmt::Debug for Invocable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invocable(arity {})", self.arity())
    }
}

impl Invocable {
    /// Classify `func` as a trampoline, or `None` if its signature is not
    /// `(i32, i32, i32{0..=3}) -> ()`.
    pub fn from_func(store: impl AsContext, func: &Func) -> Option<Self> {
        let ty = func.ty(&store);
        if ty.results().len() != 0 || !ty.params().all(|p| matches!(p, ValType::I32)) {
            return None;
        }
        let invocable = match ty.params().len() {
            2 => Self::Nullary(func.typed(&store).ok()?),
            3 => Self::Unary(func.typed(&store).ok()?),
            4 => Self::Binary(func.typed(&store).ok()?),
            5 => Self::Ternary(func.typed(&store).ok()?),
            _ => return None,
        };
        Some(invocable)
    }

    /// Number of caller-supplied arguments, not counting the context pair.
    pub fn arity(&self) -> usize {
        match self {
            Self::Nullary(_) => 0,
            Self::Unary(_) => 1,
            Self::Binary(_) => 2,
            Self::Ternary(_) => 3,
        }
    }

    /// Call the trampoline. `args.len()` must equal [`arity`](Self::arity).
    pub fn call(
        &self,
        store: impl AsContextMut,
        ctx: ClosureContext,
        args: &[i32],
    ) -> anyhow::Result<()> {
        let ClosureContext { a, b } = ctx;
        match (self, args) {
            (Self::Nullary(f), []) => f.call(store, (a, b)),
            (Self::Unary(f), &[x]) => f.call(store, (a, b, x)),
            (Self::Binary(f), &[x, y]) => f.call(store, (a, b, x, y)),
            (Self::Ternary(f), &[x, y, z]) => f.call(store, (a, b, x, y, z)),
            _ => Err(anyhow!(
                "trampoline of arity {} called with {} arguments",
                self.arity(),
                args.len()
            )),
        }
    }
}

/// Index of a trampoline in an [`InvocableTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocableId(pub usize);

/// Arena of named trampolines.
#[derive(Debug, Default, Clone)]
pub struct InvocableTable {
    entries: Vec<(String, Invocable)>,
}

impl InvocableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, invocable: Invocable) -> InvocableId {
        self.entries.push((name.into(), invocable));
        InvocableId(self.entries.len() - 1)
    }

    pub fn lookup(&self, name: &str) -> Option<InvocableId> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(InvocableId)
    }

    pub fn get(&self, id: InvocableId) -> Option<(&str, &Invocable)> {
        self.entries.get(id.0).map(|(n, i)| (n.as_str(), i))
    }

    /// Ids of every trampoline taking exactly `arity` arguments.
    pub fn with_arity(&self, arity: usize) -> Vec<InvocableId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, i))| i.arity() == arity)
            .map(|(idx, _)| InvocableId(idx))
            .collect()
    }

    /// Trampoline names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Marker the binding generator puts in `..._describe__invoke__h<hash>` exports.
const DESCRIBE_INVOKE: &str = "__invoke__h";
/// Prefix of `..._closures__invoke<N>_mut__h<hash>` exports.
const CLOSURES_INVOKE: &str = "closures__invoke";

/// True for export names the binding generator gives closure trampolines.
pub fn is_trampoline_name(name: &str) -> bool {
    if name.contains(DESCRIBE_INVOKE) {
        return true;
    }
    name.match_indices(CLOSURES_INVOKE).any(|(at, _)| {
        let rest = &name[at + CLOSURES_INVOKE.len()..];
        let after_digits = rest.trim_start_matches(|c: char| c.is_ascii_digit());
        after_digits.len() < rest.len() && after_digits.starts_with("_mut__h")
    })
}

/// Bounds- and null-checked view over an exported funcref table.
#[derive(Debug, Clone)]
pub struct IndirectTable {
    name: String,
    table: Table,
}

impl IndirectTable {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    /// Export name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots.
    pub fn len(&self, store: impl AsContext) -> u64 {
        self.table.size(store)
    }

    /// The function stored at `index`.
    pub fn get(&self, mut store: impl AsContextMut, index: u64) -> Result<Func, BridgeError> {
        let slot = self
            .table
            .get(&mut store, index)
            .ok_or(BridgeError::BadTableSlot {
                index,
                reason: "index out of range",
            })?;
        match slot.as_func() {
            Some(Some(func)) => Ok(*func),
            Some(None) => Err(BridgeError::BadTableSlot {
                index,
                reason: "slot is null",
            }),
            None => Err(BridgeError::BadTableSlot {
                index,
                reason: "slot does not hold a function",
            }),
        }
    }

    /// Resolve `index` and check it takes exactly `args.len()` i32 parameters.
    pub fn resolve_call(
        &self,
        mut store: impl AsContextMut,
        index: u64,
        args: &[i32],
    ) -> Result<Func, BridgeError> {
        let func = self.get(&mut store, index)?;
        let ty = func.ty(&store);
        if !ty.params().all(|p| matches!(p, ValType::I32)) {
            return Err(BridgeError::BadTableSlot {
                index,
                reason: "function takes non-i32 parameters",
            });
        }
        if ty.params().len() != args.len() {
            return Err(BridgeError::ArityMismatch {
                name: format!("{}[{}]", self.name, index),
                expected: ty.params().len(),
                got: args.len(),
            });
        }
        Ok(func)
    }
}

/// Call `func` with i32 arguments, returning its results.
pub fn call_with_i32s(
    mut store: impl AsContextMut,
    func: &Func,
    args: &[i32],
) -> anyhow::Result<Vec<Val>> {
    let params: Vec<Val> = args.iter().map(|&a| Val::I32(a)).collect();
    let result_count = func.ty(&store).results().len();
    let mut results = vec![Val::I32(0); result_count];
    func.call(&mut store, &params, &mut results)?;
    Ok(results)
}
