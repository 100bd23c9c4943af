//! Database executor trait.
//!
//! [`DbExecutor`] is the minimal synchronous interface the field engine needs
//! from a relational backend. It is implemented by `SqliteBackend` in the
//! `gridbase-db-backends` crate. Every call blocks the calling worker thread
//! until the backend answers.
//!
//! Backends must report engine-level cast failures as
//! [`GridbaseError::DataError`] so that the lenient alteration fallback can
//! tell them apart from other failures.

use gridbase_core::{GridbaseError, GridbaseResult};

use crate::row::Row;
use crate::value::Value;

/// Name of the strict cast SQL function every backend must provide.
///
/// `gridbase_cast(value, target)` returns `value` converted to `target` (see
/// [`CastTarget`](crate::cast::CastTarget)) and fails the statement with a
/// data error when the value cannot be converted.
pub const CAST_FUNCTION: &str = "gridbase_cast";

/// Name of the lenient cast SQL function every backend must provide.
///
/// `gridbase_try_cast(value, target)` returns the converted value, or the
/// target's empty representation when the value cannot be converted.
pub const TRY_CAST_FUNCTION: &str = "gridbase_try_cast";

/// Minimal synchronous database executor trait.
///
/// A single executor wraps a single connection. Statements issued through it
/// share that connection's transaction state, so a nested
/// [`atomic`](crate::transactions::atomic) block sees the writes of the
/// enclosing one.
pub trait DbExecutor: Send + Sync {
    /// Returns the vendor name (e.g. "sqlite").
    fn vendor(&self) -> &str;

    /// Returns `true` while the connection has an open transaction.
    fn in_transaction(&self) -> bool;

    /// The statement that opens an outermost transaction.
    ///
    /// Backends whose plain `BEGIN` defers the write lock should return a
    /// form that takes it immediately.
    fn begin_transaction_sql(&self) -> &'static str {
        "BEGIN"
    }

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    fn execute_sql(&self, sql: &str, params: &[Value]) -> GridbaseResult<u64>;

    /// Runs several parameterless statements in order, stopping at the first error.
    fn execute_batch(&self, statements: &[String]) -> GridbaseResult<()> {
        for sql in statements {
            self.execute_sql(sql, &[])?;
        }
        Ok(())
    }

    /// Runs a SQL query and returns all result rows.
    fn query(&self, sql: &str, params: &[Value]) -> GridbaseResult<Vec<Row>>;

    /// Runs a SQL query and returns exactly one row.
    fn query_one(&self, sql: &str, params: &[Value]) -> GridbaseResult<Row> {
        let mut rows = self.query(sql, params)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(GridbaseError::DatabaseError("No rows returned".to_string())),
            n => Err(GridbaseError::DatabaseError(format!(
                "Expected 1 row, got {n}"
            ))),
        }
    }

    /// Executes an INSERT and returns the id of the inserted row.
    fn insert_returning_id(&self, sql: &str, params: &[Value]) -> GridbaseResult<i64>;
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingExecutor;
    use super::*;

    #[test]
    fn test_execute_batch_stops_at_first_error() {
        let db = RecordingExecutor::failing_on("second");
        let result = db.execute_batch(&[
            "first".to_string(),
            "second".to_string(),
            "third".to_string(),
        ]);
        assert!(result.unwrap_err().is_data_error());
        assert_eq!(db.statements(), vec!["first", "second"]);
    }

    #[test]
    fn test_query_one_default() {
        let db = RecordingExecutor::default();
        let row = db.query_one("SELECT 1 AS n", &[]).unwrap();
        assert_eq!(row.get::<i64>("n").unwrap(), 1);
    }
}
