//! # gridbase-db-backends
//!
//! Relational backend implementations for gridbase. Each backend implements
//! [`DbExecutor`](gridbase_db::DbExecutor), provides the cast SQL functions
//! used by column alterations, and reports engine type/data errors distinctly
//! from other failures.
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`, enabled by default)

#![allow(clippy::doc_markdown)]

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

/// Opens a connection to the database holding the user tables, as configured
/// by `settings.user_table_database`.
#[cfg(feature = "sqlite")]
pub fn connect(
    settings: &gridbase_core::Settings,
) -> gridbase_core::GridbaseResult<SqliteBackend> {
    SqliteBackend::from_settings(settings.user_tables()?)
}
