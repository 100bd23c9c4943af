//! # gridbase
//!
//! Typed user tables whose field types can change in place.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient access.
//! You can depend on `gridbase` to get the whole engine, or depend on
//! individual crates for finer-grained control.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use gridbase::db::{SqliteSchemaEditor, Value};
//! use gridbase::db_backends::SqliteBackend;
//! use gridbase::fields::{
//!     install, ConverterRegistry, FieldHandler, FieldTypeRegistry, FieldUpdate, NewField,
//!     StaticGroups, TableStore, User, ViewHandler,
//! };
//!
//! let db = SqliteBackend::memory().unwrap();
//! install(&db).unwrap();
//!
//! let user = User::new(1, "alice");
//! let groups = Arc::new(StaticGroups::new());
//! groups.add_user(1, &user);
//! let registry = Arc::new(FieldTypeRegistry::with_builtin_types());
//! let handler = FieldHandler::new(
//!     Arc::clone(&registry),
//!     Arc::new(ConverterRegistry::with_builtin_converters()),
//!     groups,
//!     Arc::new(ViewHandler::new(Arc::clone(&registry))),
//! );
//!
//! let table = TableStore::create(&db, &SqliteSchemaEditor, "Inventory", 1).unwrap();
//! let field = handler
//!     .create_field(&db, &user, &table, &NewField::new("text", "Stock"))
//!     .unwrap();
//! let model = table.get_model(std::slice::from_ref(&field), &registry).unwrap();
//! model.insert_row(&db, &[(&field, Value::from("12"))]).unwrap();
//!
//! let field = handler
//!     .update_field(&db, &user, &field, &FieldUpdate::new().type_name("number"))
//!     .unwrap();
//! let cells = model.column_values(&db, &field).unwrap();
//! assert_eq!(cells[0].1, Value::Int(12));
//! ```

/// Error types, settings, and logging.
pub use gridbase_core as core;

/// Values, the executor trait, transactions, DDL generation, and casts.
pub use gridbase_db as db;

/// Database backends: `SQLite`.
pub use gridbase_db_backends as db_backends;

/// Field types, converters, and the field handler.
pub use gridbase_fields as fields;

/// Commonly used types in one import.
pub mod prelude {
    pub use gridbase_core::{GridbaseError, GridbaseResult, Settings, ValidationError};
    pub use gridbase_db::{atomic, DbExecutor, SchemaEditor, Value};
    pub use gridbase_fields::{
        Field, FieldHandler, FieldType, FieldTypeRegistry, FieldUpdate, NewField, Table, User,
    };
}

/// Third-party crates re-exported for user convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;
