//! Per-table schema locks.
//!
//! Structural changes to the same physical table must not interleave, while
//! changes to different tables may run fully in parallel. [`SchemaLocks`]
//! hands out one mutex per table id and holds it for the duration of a
//! closure.
//!
//! [`SchemaLocks::global`] is the process-wide registry. Table ids are not
//! qualified by database, so tables with the same id in different databases
//! share a lock; that only costs parallelism.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

static GLOBAL: Lazy<Arc<SchemaLocks>> = Lazy::new(|| Arc::new(SchemaLocks::new()));

/// A registry of per-table exclusive locks.
///
/// Share one instance (behind an `Arc`) between every worker that can alter
/// the same set of tables.
#[derive(Debug, Default)]
pub struct SchemaLocks {
    tables: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SchemaLocks {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide lock registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    fn lock_for(&self, table_id: i64) -> Arc<Mutex<()>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tables.entry(table_id).or_default())
    }

    /// Runs `f` while holding the exclusive lock of `table_id`.
    ///
    /// The lock is released when `f` returns, whether it succeeded, failed, or
    /// panicked. A lock poisoned by an earlier panic is still acquired: the
    /// protected state lives in the database, which the failed transaction
    /// already rolled back.
    pub fn with_table_lock<T>(&self, table_id: i64, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(table_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(table_id, "acquired schema lock");
        f()
    }

    /// Returns the number of tables a lock has been created for.
    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no table lock has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
