//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements
//! [`DbExecutor`] over a single `rusqlite` connection.
//!
//! Features:
//! - WAL mode enabled for file-based databases
//! - In-memory database support via `:memory:` path (great for testing)
//! - The `gridbase_cast` / `gridbase_try_cast` scalar functions used by
//!   column alterations, registered on every connection
//! - Engine errors classified into data, integrity, operational, and
//!   programming errors

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gridbase_core::settings::{DatabaseSettings, SQLITE_ENGINE};
use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::cast::{CastTarget, CAST_ERROR_PREFIX};
use gridbase_db::executor::{CAST_FUNCTION, TRY_CAST_FUNCTION};
use gridbase_db::{DbExecutor, Row, Value};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::ErrorCode;

/// How long a connection waits for another connection's write lock before
/// failing with `database is locked`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// A SQLite database backend.
///
/// One backend wraps one connection. The connection is guarded by a mutex so
/// the backend can be shared, but every [`atomic`](gridbase_db::atomic)
/// block runs on that single connection: give each worker thread its own
/// backend when workers alter tables concurrently.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection.
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteBackend {
    /// Opens a new SQLite database at the given path.
    ///
    /// If the path is `:memory:`, a private in-memory database is created.
    /// WAL journal mode is enabled for file-based databases, and writers
    /// wait up to [`DEFAULT_BUSY_TIMEOUT`] for each other.
    pub fn open(path: impl Into<PathBuf>) -> GridbaseResult<Self> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| GridbaseError::OperationalError(format!("SQLite open failed: {e}")))?;

        let pragmas = if in_memory {
            "PRAGMA foreign_keys=ON;"
        } else {
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"
        };
        conn.execute_batch(pragmas).map_err(|e| {
            GridbaseError::OperationalError(format!("Failed to set pragmas: {e}"))
        })?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT).map_err(classify_error)?;

        register_cast_functions(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    pub fn memory() -> GridbaseResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database described by `settings`.
    ///
    /// Fails with a configuration error when the engine is not
    /// [`SQLITE_ENGINE`].
    pub fn from_settings(settings: &DatabaseSettings) -> GridbaseResult<Self> {
        if settings.engine != SQLITE_ENGINE {
            return Err(GridbaseError::ConfigurationError(format!(
                "Unsupported database engine '{}'",
                settings.engine
            )));
        }
        let backend = Self::open(&settings.name)?;
        if let Some(ms) = settings.busy_timeout_ms() {
            backend
                .connection()
                .busy_timeout(Duration::from_millis(ms))
                .map_err(classify_error)?;
        }
        Ok(backend)
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn connection(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `Value`s to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> GridbaseResult<()> {
        for (i, param) in params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, to_sql_value(param))
                .map_err(|e| GridbaseError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to our generic `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| {
                sqlite_row
                    .get_ref(i)
                    .map_or(Value::Null, from_value_ref)
            })
            .collect();
        Row::new(column_names.to_vec(), values)
    }
}

impl DbExecutor for SqliteBackend {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    fn in_transaction(&self) -> bool {
        !self.connection().is_autocommit()
    }

    fn begin_transaction_sql(&self) -> &'static str {
        // A deferred transaction that reads first cannot wait for the write
        // lock later: SQLite fails the upgrade with SQLITE_BUSY at once.
        "BEGIN IMMEDIATE"
    }

    fn execute_sql(&self, sql: &str, params: &[Value]) -> GridbaseResult<u64> {
        let conn = self.connection();
        let mut stmt = conn.prepare(sql).map_err(classify_error)?;
        Self::bind_params(&mut stmt, params)?;
        let count = stmt.raw_execute().map_err(classify_error)?;
        tracing::trace!(sql, rows = count, "executed");
        Ok(count as u64)
    }

    fn query(&self, sql: &str, params: &[Value]) -> GridbaseResult<Vec<Row>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(sql).map_err(classify_error)?;

        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        Self::bind_params(&mut stmt, params)?;

        let mut raw_rows = stmt.raw_query();
        let mut rows = Vec::new();
        while let Some(row) = raw_rows.next().map_err(classify_error)? {
            rows.push(Self::convert_row(row, &column_names));
        }
        Ok(rows)
    }

    fn insert_returning_id(&self, sql: &str, params: &[Value]) -> GridbaseResult<i64> {
        let conn = self.connection();
        let mut stmt = conn.prepare(sql).map_err(classify_error)?;
        Self::bind_params(&mut stmt, params)?;
        stmt.raw_execute().map_err(classify_error)?;
        Ok(conn.last_insert_rowid())
    }
}

// ── Cast functions ─────────────────────────────────────────────────────

/// Installs [`CAST_FUNCTION`] and [`TRY_CAST_FUNCTION`] on a connection.
fn register_cast_functions(conn: &rusqlite::Connection) -> GridbaseResult<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(CAST_FUNCTION, 2, flags, |ctx| {
        let (target, value) = cast_arguments(ctx)?;
        target
            .cast(&value)
            .map(|v| to_sql_value(&v))
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
    })
    .map_err(|e| GridbaseError::OperationalError(format!("Failed to register {CAST_FUNCTION}: {e}")))?;

    conn.create_scalar_function(TRY_CAST_FUNCTION, 2, flags, |ctx| {
        let (target, value) = cast_arguments(ctx)?;
        Ok(to_sql_value(&target.try_cast(&value)))
    })
    .map_err(|e| {
        GridbaseError::OperationalError(format!("Failed to register {TRY_CAST_FUNCTION}: {e}"))
    })?;

    Ok(())
}

fn cast_arguments(ctx: &Context<'_>) -> rusqlite::Result<(CastTarget, Value)> {
    let target_name: String = ctx.get(1)?;
    let target = CastTarget::from_str(&target_name)
        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
    Ok((target, from_value_ref(ctx.get_raw(0))))
}

// ── Conversions ────────────────────────────────────────────────────────

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int(i) => Sql::Integer(*i),
        Value::Float(f) => Sql::Real(*f),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Date(_) | Value::DateTime(_) | Value::Json(_) => Sql::Text(value.to_string()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(b) => Value::String(String::from_utf8_lossy(b).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Maps a `rusqlite` error onto the gridbase error taxonomy.
///
/// Cast failures raised by [`CAST_FUNCTION`] and type mismatches become
/// [`GridbaseError::DataError`]; the lenient alteration fallback relies on
/// that distinction.
pub fn classify_error(err: rusqlite::Error) -> GridbaseError {
    let message = err.to_string();
    if message.contains(CAST_ERROR_PREFIX) {
        return GridbaseError::DataError(message);
    }
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => classify_code(failure.code, message),
        // Syntax errors and unknown columns reported while preparing.
        rusqlite::Error::SqlInputError { error, .. } => classify_code(error.code, message),
        rusqlite::Error::InvalidColumnName(_) | rusqlite::Error::InvalidParameterName(_) => {
            GridbaseError::ProgrammingError(message)
        }
        rusqlite::Error::UserFunctionError(_) => GridbaseError::DataError(message),
        _ => GridbaseError::DatabaseError(message),
    }
}

fn classify_code(code: ErrorCode, message: String) -> GridbaseError {
    match code {
        ErrorCode::TypeMismatch => GridbaseError::DataError(message),
        ErrorCode::ConstraintViolation => GridbaseError::IntegrityError(message),
        ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::CannotOpen
        | ErrorCode::ReadOnly
        | ErrorCode::DiskFull
        | ErrorCode::SystemIoFailure
        | ErrorCode::OperationInterrupted => GridbaseError::OperationalError(message),
        _ => GridbaseError::ProgrammingError(message),
    }
}
