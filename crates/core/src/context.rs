//! Shared Result Store
//!
//! Per-plan key/value store through which completed tasks hand their
//! payloads to dependents. Entries are keyed by producer task id.
//!
//! The execution engine is the only writer and publishes between batches;
//! batch members only ever see `&ResultStore`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::path;

/// Producer-keyed store of task payloads.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: BTreeMap<String, Value>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the payload published by `producer`, replacing any earlier one.
    pub fn publish(&mut self, producer: impl Into<String>, payload: Value) {
        self.entries.insert(producer.into(), payload);
    }

    pub fn get(&self, producer: &str) -> Option<&Value> {
        self.entries.get(producer)
    }

    /// Dot-path lookup inside a producer's payload.
    pub fn lookup(&self, producer: &str, path: &str) -> Option<&Value> {
        self.entries
            .get(producer)
            .and_then(|payload| path::lookup(payload, path))
    }

    pub fn contains(&self, producer: &str) -> bool {
        self.entries.contains_key(producer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries.clone()
    }
}
