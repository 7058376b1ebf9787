// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arena of owned nodes indexed by ledger handles.
//!
//! A pointer field holds a [`NodeId`], never a reference. Nodes are only
//! created through [`Heap::alloc`], which records them in the heap's ledger,
//! and only released by [`Heap::free_all`], which walks that ledger once.

use super::{AllocationLedger, AllocationObserver, Handle, Ownership};
use crate::instance::Value;
use std::sync::Arc;

/// Arena slot of a pointed-to block.
pub type NodeId = Handle;

/// One heap block: `elements.len()` values of `type_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub type_name: String,
    pub elements: Vec<Value>,
}

/// Outcome of releasing a heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeReport {
    /// Blocks released by this call.
    pub released: usize,
    /// Ledger entries whose slot was already empty.
    pub already_free: usize,
}

/// Owner of every block of one structure tree.
#[derive(Debug)]
pub struct Heap {
    nodes: Vec<Option<Node>>,
    ledger: AllocationLedger,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            ledger: AllocationLedger::new(Ownership::Structure),
        }
    }

    pub fn with_observer(observer: Arc<dyn AllocationObserver>) -> Self {
        Self {
            nodes: Vec::new(),
            ledger: AllocationLedger::with_observer(Ownership::Structure, observer),
        }
    }

    /// Allocate a block, recording it in the ledger first.
    pub fn alloc(&mut self, type_name: &str, elements: Vec<Value>) -> NodeId {
        let handle = self.ledger.record(type_name, elements.len());
        debug_assert_eq!(handle.index(), self.nodes.len());
        self.nodes.push(Some(Node {
            type_name: type_name.to_string(),
            elements,
        }));
        handle
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    /// Live blocks.
    pub fn live(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Release every block recorded in the ledger, exactly once.
    pub fn free_all(&mut self) -> FreeReport {
        let mut report = FreeReport::default();
        for entry in self.ledger.free_all() {
            match self.nodes.get_mut(entry.handle.index()).and_then(Option::take) {
                Some(_) => report.released += 1,
                None => report.already_free += 1,
            }
        }
        self.nodes.clear();
        report
    }
}

impl Clone for Heap {
    /// Deep copy into a fresh arena; every copied block is recorded anew.
    fn clone(&self) -> Self {
        let mut ledger = match self.ledger.observer() {
            Some(obs) => AllocationLedger::with_observer(Ownership::Structure, obs),
            None => AllocationLedger::new(Ownership::Structure),
        };
        for entry in self.ledger.entries() {
            ledger.record(&entry.type_name, entry.element_count);
        }
        Self {
            nodes: self.nodes.clone(),
            ledger,
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if !self.ledger.is_empty() {
            self.free_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CountingObserver;

    #[test]
    fn test_alloc_and_free_exactly_once() {
        let obs = CountingObserver::new();
        let mut heap = Heap::with_observer(obs.clone());
        let a = heap.alloc("double", vec![Value::Double(1.0), Value::Double(2.0)]);
        let b = heap.alloc("int", vec![Value::Int(7)]);
        assert_eq!(heap.get(a).unwrap().elements.len(), 2);
        assert_eq!(heap.get(b).unwrap().type_name, "int");

        let report = heap.free_all();
        assert_eq!(report.released, 2);
        assert_eq!(report.already_free, 0);
        assert!(heap.get(a).is_none());

        let again = heap.free_all();
        assert_eq!(again, FreeReport::default());
        assert_eq!(obs.double_frees(), 0);
        assert_eq!(obs.outstanding(), 0);
    }

    #[test]
    fn test_drop_releases_blocks() {
        let obs = CountingObserver::new();
        {
            let mut heap = Heap::with_observer(obs.clone());
            heap.alloc("char", vec![Value::Char(1)]);
        }
        assert_eq!(obs.recorded(), 1);
        assert_eq!(obs.released(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let obs = CountingObserver::new();
        let mut heap = Heap::with_observer(obs.clone());
        let id = heap.alloc("int", vec![Value::Int(1)]);
        let mut copy = heap.clone();
        copy.get_mut(id).unwrap().elements[0] = Value::Int(2);
        assert_eq!(heap.get(id).unwrap().elements[0], Value::Int(1));

        heap.free_all();
        copy.free_all();
        assert_eq!(obs.recorded(), 2);
        assert_eq!(obs.released(), 2);
        assert_eq!(obs.double_frees(), 0);
    }
}
