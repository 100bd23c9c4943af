//! Transaction support.
//!
//! [`atomic`] runs a closure inside a transaction. The outermost block opens
//! a real transaction with the backend's
//! [`begin_transaction_sql`](DbExecutor::begin_transaction_sql) and ends it
//! with `COMMIT` or `ROLLBACK`. Blocks nested inside it use uniquely named
//! savepoints.
//!
//! Backends that take the write lock up front in their begin statement
//! (`BEGIN IMMEDIATE` on SQLite) never have to upgrade a read lock halfway
//! through a block, so concurrent writers queue on the busy handler instead
//! of failing.
//!
//! # Examples
//!
//! ```ignore
//! use gridbase_db::transactions::atomic;
//!
//! let id = atomic(db, |db| {
//!     db.execute_sql("INSERT INTO database_table (name) VALUES (?)", &["Projects".into()])?;
//!     db.query_one("SELECT last_insert_rowid() AS id", &[])?.get::<i64>("id")
//! })?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use gridbase_core::GridbaseResult;

use crate::executor::DbExecutor;

/// Counter for generating unique savepoint names.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A named savepoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    /// The unique name of this savepoint.
    pub name: String,
}

impl Savepoint {
    /// Creates a new savepoint with an auto-generated unique name.
    pub fn new() -> Self {
        let id = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("sp_{id}"),
        }
    }

    /// Creates a new savepoint with a custom name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// `SAVEPOINT <name>`
    pub fn create_sql(&self) -> String {
        format!("SAVEPOINT {}", self.name)
    }

    /// `RELEASE SAVEPOINT <name>`
    pub fn release_sql(&self) -> String {
        format!("RELEASE SAVEPOINT {}", self.name)
    }

    /// `ROLLBACK TO SAVEPOINT <name>`
    pub fn rollback_sql(&self) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.name)
    }
}

impl Default for Savepoint {
    fn default() -> Self {
        Self::new()
    }
}

/// How an [`atomic`] block was opened.
enum Scope {
    /// The outermost block owns the transaction.
    Transaction,
    /// A nested block inside an enclosing transaction.
    Savepoint(Savepoint),
}

/// An open transaction or savepoint on a connection.
///
/// Dropping the guard without calling [`commit`](TransactionGuard::commit)
/// rolls it back, which also covers panics inside the closure passed to
/// [`atomic`].
struct TransactionGuard<'a> {
    db: &'a dyn DbExecutor,
    scope: Scope,
    finished: bool,
}

impl<'a> TransactionGuard<'a> {
    fn begin(db: &'a dyn DbExecutor) -> GridbaseResult<Self> {
        let scope = if db.in_transaction() {
            let savepoint = Savepoint::new();
            db.execute_sql(&savepoint.create_sql(), &[])?;
            Scope::Savepoint(savepoint)
        } else {
            db.execute_sql(db.begin_transaction_sql(), &[])?;
            Scope::Transaction
        };
        Ok(Self {
            db,
            scope,
            finished: false,
        })
    }

    fn commit(mut self) -> GridbaseResult<()> {
        self.finished = true;
        let committed = match &self.scope {
            Scope::Transaction => self.db.execute_sql("COMMIT", &[]),
            Scope::Savepoint(savepoint) => self.db.execute_sql(&savepoint.release_sql(), &[]),
        };
        if committed.is_err() {
            self.rollback_quietly();
        }
        committed.map(|_| ())
    }

    fn rollback_quietly(&self) {
        match &self.scope {
            Scope::Transaction => {
                // Some engine errors already ended the transaction.
                if !self.db.in_transaction() {
                    return;
                }
                if let Err(e) = self.db.execute_sql("ROLLBACK", &[]) {
                    tracing::error!(error = %e, "rollback failed");
                }
            }
            Scope::Savepoint(savepoint) => {
                // ROLLBACK TO keeps the savepoint on the stack; RELEASE pops it.
                if let Err(e) = self.db.execute_sql(&savepoint.rollback_sql(), &[]) {
                    tracing::error!(savepoint = %savepoint.name, error = %e, "rollback failed");
                    return;
                }
                if let Err(e) = self.db.execute_sql(&savepoint.release_sql(), &[]) {
                    tracing::error!(savepoint = %savepoint.name, error = %e, "release after rollback failed");
                }
            }
        }
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.rollback_quietly();
        }
    }
}

/// Executes a closure within a database transaction.
///
/// If the closure returns `Ok`, the block commits (or releases its savepoint
/// when nested). If it returns `Err`, every statement issued inside the
/// closure is rolled back and the original error is returned.
pub fn atomic<T, F>(db: &dyn DbExecutor, f: F) -> GridbaseResult<T>
where
    F: FnOnce(&dyn DbExecutor) -> GridbaseResult<T>,
{
    let guard = TransactionGuard::begin(db)?;
    match f(db) {
        Ok(result) => {
            guard.commit()?;
            Ok(result)
        }
        // The guard rolls back on drop.
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingExecutor;
    use gridbase_core::GridbaseError;

    #[test]
    fn test_savepoint_unique_names() {
        let a = Savepoint::new();
        let b = Savepoint::new();
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("sp_"));
    }

    #[test]
    fn test_savepoint_sql() {
        let sp = Savepoint::with_name("outer");
        assert_eq!(sp.create_sql(), "SAVEPOINT outer");
        assert_eq!(sp.release_sql(), "RELEASE SAVEPOINT outer");
        assert_eq!(sp.rollback_sql(), "ROLLBACK TO SAVEPOINT outer");
    }

    #[test]
    fn test_atomic_commit() {
        let db = RecordingExecutor::default();
        let value = atomic(&db, |db| {
            db.execute_sql("UPDATE t SET a = 1", &[])?;
            Ok(5)
        })
        .unwrap();
        assert_eq!(value, 5);
        assert_eq!(db.statements(), vec!["BEGIN", "UPDATE t SET a = 1", "COMMIT"]);
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_atomic_rollback_on_error() {
        let db = RecordingExecutor::default();
        let result: GridbaseResult<()> = atomic(&db, |db| {
            db.execute_sql("UPDATE t SET a = 1", &[])?;
            Err(GridbaseError::DatabaseError("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.statements(), vec!["BEGIN", "UPDATE t SET a = 1", "ROLLBACK"]);
    }

    #[test]
    fn test_atomic_nested() {
        let db = RecordingExecutor::default();
        atomic(&db, |db| {
            let inner: GridbaseResult<()> =
                atomic(db, |_| Err(GridbaseError::DataError("bad value".into())));
            assert!(inner.unwrap_err().is_data_error());
            Ok(())
        })
        .unwrap();

        let statements = db.statements();
        // BEGIN, inner SAVEPOINT, inner ROLLBACK TO, inner RELEASE, COMMIT
        assert_eq!(statements.len(), 5);
        assert_eq!(statements[0], "BEGIN");
        assert!(statements[1].starts_with("SAVEPOINT sp_"));
        assert!(statements[2].starts_with("ROLLBACK TO SAVEPOINT sp_"));
        assert!(statements[3].starts_with("RELEASE SAVEPOINT sp_"));
        assert_eq!(statements[4], "COMMIT");
    }

    #[test]
    fn test_atomic_commit_failure_rolls_back() {
        let db = RecordingExecutor::failing_on("COMMIT");
        let result = atomic(&db, |_| Ok(()));
        assert!(result.is_err());
        assert_eq!(db.statements(), vec!["BEGIN", "COMMIT", "ROLLBACK"]);
    }

    #[test]
    fn test_atomic_begin_failure() {
        let db = RecordingExecutor::failing_on("BEGIN");
        let result = atomic(&db, |_| Ok(()));
        assert!(result.is_err());
        assert_eq!(db.statements(), vec!["BEGIN"]);
    }
}
