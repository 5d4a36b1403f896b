//! Per-handle mutable state held in the Wasmtime Store.
//!
//! `BridgeState` combines the store limiter and the host-value heap into a
//! single struct that lives inside `Store<BridgeState>` for the lifetime of
//! one `ModuleHandle`.

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use crate::config::LoaderConfig;
use crate::error::BridgeError;

/// First heap index handed out. Lower indices are never valid, so a zeroed
/// slot in guest memory cannot be mistaken for a live value.
pub const HEAP_BASE: u32 = 128;

/// Slab of host values the unit refers to by index.
///
/// The exception slot reports host failures into the unit as a heap index;
/// the host later takes the value back out by that index. Freed slots are
/// reused most-recent-first.
#[derive(Debug, Default)]
pub struct HostHeap {
    slots: Vec<Option<String>>,
    free: Vec<u32>,
}

impl HostHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return its index.
    pub fn insert(&mut self, value: String) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.slots[(idx - HEAP_BASE) as usize] = Some(value);
            return idx;
        }
        self.slots.push(Some(value));
        HEAP_BASE + (self.slots.len() as u32 - 1)
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        self.slot(idx)
            .and_then(|slot| self.slots[slot].as_deref())
    }

    /// Remove and return the value at `idx`.
    pub fn take(&mut self, idx: u32) -> Result<String, BridgeError> {
        let slot = self.slot(idx).ok_or(BridgeError::BadHeapIndex(idx))?;
        let value = self.slots[slot]
            .take()
            .ok_or(BridgeError::BadHeapIndex(idx))?;
        self.free.push(idx);
        Ok(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, idx: u32) -> Option<usize> {
        let slot = idx.checked_sub(HEAP_BASE)? as usize;
        (slot < self.slots.len()).then_some(slot)
    }
}

/// Per-handle mutable state held in the Wasmtime `Store`.
pub struct BridgeState {
    /// Memory and instance limits enforced by the store limiter.
    pub limits: StoreLimits,
    /// Host values referenced from inside the unit.
    pub heap: HostHeap,
}

impl BridgeState {
    /// Create the state for a new handle.
    pub fn new(config: &LoaderConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes())
            .instances(1)
            .build();
        Self {
            limits,
            heap: HostHeap::new(),
        }
    }
}
