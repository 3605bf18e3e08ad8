// src/registry/mod.rs

//! Process registry: the single source of truth for lifecycle queries.
//!
//! Maps OS pid → [`ProcessRecord`]. Readers and writers may come from any
//! task; callers never lock anything themselves.

pub mod record;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::Pid;

pub use record::{Completer, CompletionSignal, ExitOutcome, ProcessRecord, completion_channel};

/// Concurrency-safe table of supervised processes.
#[derive(Debug, Default)]
pub struct Registry {
    processes: RwLock<HashMap<Pid, Arc<ProcessRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the record for `pid`.
    pub fn store(&self, pid: Pid, record: Arc<ProcessRecord>) {
        self.processes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, record);
    }

    pub fn load(&self, pid: Pid) -> Option<Arc<ProcessRecord>> {
        self.processes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .cloned()
    }

    /// Visit every record while holding the read lock.
    ///
    /// `f` must not call back into the registry's write operations.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ProcessRecord>),
    {
        let guard = self.processes.read().unwrap_or_else(PoisonError::into_inner);
        for record in guard.values() {
            f(record);
        }
    }

    /// Clone out every record so the caller can await between entries.
    pub fn snapshot(&self) -> Vec<Arc<ProcessRecord>> {
        let mut out = Vec::new();
        self.range(|record| out.push(Arc::clone(record)));
        out
    }

    pub fn remove(&self, pid: Pid) -> Option<Arc<ProcessRecord>> {
        self.processes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid)
    }

    /// Remove `expected` only if it is still the record stored under its pid.
    ///
    /// A pid the OS has reused since `expected` was loaded maps to a newer
    /// record, which stays put.
    pub fn remove_if_current(&self, expected: &Arc<ProcessRecord>) -> Option<Arc<ProcessRecord>> {
        let pid = expected.pid();
        let mut guard = self.processes.write().unwrap_or_else(PoisonError::into_inner);
        let is_current = guard
            .get(&pid)
            .is_some_and(|current| Arc::ptr_eq(current, expected));
        if is_current { guard.remove(&pid) } else { None }
    }

    pub fn len(&self) -> usize {
        self.processes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
