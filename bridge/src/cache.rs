//! Compiled-module cache keyed by the BLAKE3 digest of the payload.
//!
//! Bounded by entry count; when full, the oldest entry is evicted. Only
//! modules that passed validation are ever inserted.

use std::collections::{HashMap, VecDeque};

use wasmtime::Module;

/// FIFO-evicting map from payload digest to compiled module.
#[derive(Default)]
pub struct ModuleCache {
    modules: HashMap<blake3::Hash, Module>,
    order: VecDeque<blake3::Hash>,
    capacity: usize,
}

impl ModuleCache {
    /// A cache holding at most `capacity` modules. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            modules: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn get(&self, digest: &blake3::Hash) -> Option<Module> {
        self.modules.get(digest).cloned()
    }

    /// Insert `module`, evicting the oldest entries beyond capacity.
    pub fn insert(&mut self, digest: blake3::Hash, module: Module) {
        if !self.is_enabled() {
            return;
        }
        if self.modules.insert(digest, module).is_none() {
            self.order.push_back(digest);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.modules.remove(&oldest);
            }
        }
    }

    pub fn clear(&mut self) {
        self.modules.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
