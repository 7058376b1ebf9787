// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Allocation ledger.
//!
//! Every block created while materializing a structure instance is recorded
//! here, in creation order. The ledger is consumed exactly once by
//! [`AllocationLedger::free_all`], which hands back the released entries
//! and leaves the ledger empty for reuse.
//!
//! Structure trees and Data Block buffers use separate ledgers
//! ([`Ownership::Structure`] vs [`Ownership::DataBlock`]); they are never
//! merged.

mod heap;

pub use heap::{FreeReport, Heap, Node, NodeId};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ledger handle. Doubles as the arena slot of the recorded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u32);

impl Handle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Who releases the recorded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Released through the ledger tied to a decoded structure tree.
    Structure,
    /// Released by the owning Data Block.
    DataBlock,
}

/// One recorded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub handle: Handle,
    pub type_name: String,
    pub element_count: usize,
    pub ownership: Ownership,
}

/// Hook notified on every record/release. Used to count allocations.
pub trait AllocationObserver: Send + Sync {
    fn on_record(&self, entry: &LedgerEntry);
    fn on_release(&self, entry: &LedgerEntry);
}

/// Ordered record of allocations for one structure tree.
pub struct AllocationLedger {
    entries: Vec<LedgerEntry>,
    ownership: Ownership,
    next: u32,
    observer: Option<Arc<dyn AllocationObserver>>,
}

impl fmt::Debug for AllocationLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationLedger")
            .field("entries", &self.entries.len())
            .field("ownership", &self.ownership)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl AllocationLedger {
    pub fn new(ownership: Ownership) -> Self {
        Self {
            entries: Vec::new(),
            ownership,
            next: 0,
            observer: None,
        }
    }

    pub fn with_observer(ownership: Ownership, observer: Arc<dyn AllocationObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new(ownership)
        }
    }

    /// Record a new block and return its handle.
    pub fn record(&mut self, type_name: &str, element_count: usize) -> Handle {
        let entry = LedgerEntry {
            handle: Handle(self.next),
            type_name: type_name.to_string(),
            element_count,
            ownership: self.ownership,
        };
        self.next += 1;
        if let Some(obs) = &self.observer {
            obs.on_record(&entry);
        }
        let handle = entry.handle;
        self.entries.push(entry);
        handle
    }

    /// Release every recorded block, front to back, and clear the ledger.
    pub fn free_all(&mut self) -> Vec<LedgerEntry> {
        let released: Vec<LedgerEntry> = self.entries.drain(..).collect();
        if let Some(obs) = &self.observer {
            for entry in &released {
                obs.on_release(entry);
            }
        }
        self.next = 0;
        released
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn observer(&self) -> Option<Arc<dyn AllocationObserver>> {
        self.observer.clone()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }
}

/// Allocation-counting observer.
///
/// Live blocks are kept as a multiset so several ledgers may share one
/// observer; releasing a block that is not live counts as a double free.
#[derive(Debug, Default)]
pub struct CountingObserver {
    recorded: AtomicUsize,
    released: AtomicUsize,
    double_frees: AtomicUsize,
    live: Mutex<HashMap<(String, usize, Handle), usize>>,
}

impl CountingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    pub fn double_frees(&self) -> usize {
        self.double_frees.load(Ordering::Relaxed)
    }

    /// Blocks recorded but not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.lock().values().sum()
    }

    fn key(entry: &LedgerEntry) -> (String, usize, Handle) {
        (entry.type_name.clone(), entry.element_count, entry.handle)
    }
}

impl AllocationObserver for CountingObserver {
    fn on_record(&self, entry: &LedgerEntry) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
        *self.live.lock().entry(Self::key(entry)).or_insert(0) += 1;
    }

    fn on_release(&self, entry: &LedgerEntry) {
        self.released.fetch_add(1, Ordering::Relaxed);
        let mut live = self.live.lock();
        let key = Self::key(entry);
        match live.get_mut(&key) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                live.remove(&key);
            }
            None => {
                self.double_frees.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_assigns_sequential_handles() {
        let mut ledger = AllocationLedger::new(Ownership::Structure);
        let a = ledger.record("Sensor", 1);
        let b = ledger.record("double", 16);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(b));
    }

    #[test]
    fn test_free_all_clears_for_reuse() {
        let obs = CountingObserver::new();
        let mut ledger = AllocationLedger::with_observer(Ownership::Structure, obs.clone());
        ledger.record("Sensor", 1);
        ledger.record("int", 3);

        let released = ledger.free_all();
        assert_eq!(released.len(), 2);
        assert!(ledger.is_empty());
        assert_eq!(obs.recorded(), 2);
        assert_eq!(obs.released(), 2);
        assert_eq!(obs.outstanding(), 0);
        assert_eq!(obs.double_frees(), 0);

        // Second pass releases nothing.
        assert!(ledger.free_all().is_empty());
        assert_eq!(ledger.record("Sensor", 1).index(), 0);
    }
}
