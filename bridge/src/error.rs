//! Bridge error types.

use bindbridge_fetchapi::FetchError;

use crate::memory::OutOfBounds;

/// The three failure kinds a caller has to distinguish, plus host-side misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The payload could not be obtained.
    Load,
    /// The payload is not a loadable unit for this host.
    Instantiation,
    /// The unit trapped. The handle must be discarded.
    ExecutionTrap,
    /// The host asked for something the handle cannot do. The handle stays usable.
    Access,
}

/// Top-level error type for the bridge crate.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Fetching the payload failed.
    #[error("load error: {0}")]
    Load(#[from] FetchError),

    /// Loader configuration could not be parsed.
    #[error("invalid loader config: {0}")]
    InvalidConfig(String),

    /// Wasmtime engine or compilation error.
    #[error("compile error: {0}")]
    Compile(#[source] anyhow::Error),

    /// Module does not satisfy the bridge ABI (missing exports, imports present, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Instantiation failed (limits, engine mismatch, ...).
    #[error("instantiation error: {0}")]
    Instantiation(String),

    /// The unit trapped while running `export`.
    #[error("guest trapped in '{export}': {message}")]
    Trapped { export: String, message: String },

    /// Fuel ran out while running `export`.
    #[error("fuel exhausted in '{export}'")]
    FuelExhausted { export: String },

    /// An earlier trap left the handle unusable.
    #[error("handle poisoned by earlier trap: {0}")]
    Poisoned(String),

    /// Host access outside linear memory.
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),

    /// No export or trampoline with this name.
    #[error("unknown export: {0}")]
    UnknownExport(String),

    /// A trampoline was invoked with the wrong number of arguments.
    #[error("'{name}' takes {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// An export exists but does not have the signature the call needs.
    #[error("'{name}' has signature ({params} params) -> ({results} results), expected {expected}")]
    SignatureMismatch {
        name: String,
        expected: &'static str,
        params: usize,
        results: usize,
    },

    /// Indirect-call table slot is out of range or holds no function.
    #[error("table slot {index}: {reason}")]
    BadTableSlot { index: u64, reason: &'static str },

    /// Guest bytes were expected to be UTF-8 and were not.
    #[error("invalid utf-8 at {ptr:#x}+{len}")]
    InvalidUtf8 { ptr: u32, len: u32 },

    /// Host heap index does not refer to a live value.
    #[error("no host value at heap index {0}")]
    BadHeapIndex(u32),
}

impl BridgeError {
    /// Which of the caller-visible failure kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(_) => ErrorKind::Load,
            Self::InvalidConfig(_)
            | Self::Compile(_)
            | Self::Validation(_)
            | Self::Instantiation(_) => {
                ErrorKind::Instantiation
            }
            Self::Trapped { .. } | Self::FuelExhausted { .. } | Self::Poisoned(_) => {
                ErrorKind::ExecutionTrap
            }
            Self::OutOfBounds(_)
            | Self::UnknownExport(_)
            | Self::ArityMismatch { .. }
            | Self::SignatureMismatch { .. }
            | Self::BadTableSlot { .. }
            | Self::InvalidUtf8 { .. }
            | Self::BadHeapIndex(_) => ErrorKind::Access,
        }
    }

    /// True if the error came from a trap inside the unit.
    pub fn is_trap(&self) -> bool {
        self.kind() == ErrorKind::ExecutionTrap
    }
}
