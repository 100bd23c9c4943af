//! # gridbase-fields
//!
//! The field type migration engine. Fields are typed columns of user tables;
//! this crate creates them, changes their type in place while converting the
//! stored cells, and deletes them, keeping metadata, physical columns and view
//! filters consistent.
//!
//! ## Module Overview
//!
//! - [`models`] - Tables, fields, and the physical model derived from them
//! - [`registry`] - The [`FieldType`] trait and [`FieldTypeRegistry`]
//! - [`field_types`] - Built-in field types
//! - [`store`] - Table and field metadata persistence
//! - [`converters`] - Data-aware converters and the [`ConverterRegistry`]
//! - [`lenient`] - The null-on-failure cast fallback
//! - [`synchronizer`] - Add, alter and remove physical columns
//! - [`handler`] - The [`FieldHandler`] orchestrating all of the above
//! - [`views`] - View filters and sorts that depend on fields
//! - [`auth`] - Group membership checks
//! - [`install`] - Metadata table creation
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use gridbase_fields::auth::{StaticGroups, User};
//! use gridbase_fields::converters::ConverterRegistry;
//! use gridbase_fields::handler::FieldHandler;
//! use gridbase_fields::registry::FieldTypeRegistry;
//! use gridbase_fields::views::NoDependents;
//!
//! let groups = Arc::new(StaticGroups::new());
//! groups.add_user(1, &User::new(1, "alice"));
//!
//! let handler = FieldHandler::new(
//!     Arc::new(FieldTypeRegistry::with_builtin_types()),
//!     Arc::new(ConverterRegistry::with_builtin_converters()),
//!     groups,
//!     Arc::new(NoDependents),
//! );
//! assert!(handler.registry().get("single_select").is_ok());
//! ```

// These clippy lints are intentionally allowed for the fields crate:
// - return_self_not_must_use: builder pattern methods are self-documenting
// - missing_const_for_fn: field type methods are trait implementations in spirit
// - significant_drop_tightening: span guards are held for the whole operation
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::significant_drop_tightening)]

pub mod auth;
pub mod converters;
pub mod field_types;
pub mod handler;
pub mod install;
pub mod lenient;
pub mod models;
pub mod registry;
pub mod store;
pub mod synchronizer;
pub mod views;

// Re-export the most commonly used types at the crate root.
pub use auth::{GroupMembership, StaticGroups, User};
pub use converters::{ConverterRegistry, FieldConverter};
pub use handler::{FieldHandler, FieldUpdate, NewField};
pub use install::install;
pub use models::{Attributes, Field, PhysicalModel, Table};
pub use registry::{FieldChange, FieldType, FieldTypeRegistry};
pub use store::{FieldStore, TableStore};
pub use synchronizer::{AlterOutcome, AlterStrategy, SchemaSynchronizer};
pub use views::{FieldDependents, NoDependents, ViewHandler};
