//! # gridbase-db
//!
//! Database layer for gridbase. Provides the backend-agnostic [`Value`] and
//! [`Row`] types, the synchronous [`DbExecutor`] trait that backends
//! implement, savepoint-based [`atomic`] transactions, DDL generation through
//! [`SchemaEditor`], per-value casts used while altering columns, and
//! per-table [`SchemaLocks`].
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`] enum
//! - [`row`] - Query result rows and [`FromValue`] conversions
//! - [`executor`] - The [`DbExecutor`] trait
//! - [`transactions`] - [`atomic`] blocks and savepoints
//! - [`schema_editor`] - Column definitions and DDL generation
//! - [`cast`] - Strict and lenient value casts
//! - [`locks`] - Per-table schema locks

// These clippy lints are intentionally allowed for the database crate:
// - cast_precision_loss / cast_possible_truncation: i64 <-> f64 casts are range checked
// - needless_pass_by_value: builder methods take ownership by design of the API
// - return_self_not_must_use: builder pattern methods are self-documenting
// - missing_const_for_fn: several accessors may grow non-const bodies
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]

pub mod cast;
pub mod executor;
pub mod locks;
pub mod row;
pub mod schema_editor;
pub mod transactions;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use cast::{CastError, CastTarget};
pub use executor::{DbExecutor, CAST_FUNCTION, TRY_CAST_FUNCTION};
pub use locks::SchemaLocks;
pub use row::{FromValue, Row};
pub use schema_editor::{ColumnDef, ColumnType, SchemaEditor, SqliteSchemaEditor};
pub use transactions::{atomic, Savepoint};
pub use value::Value;
