//! # gridbase-core
//!
//! Error types, settings, and logging shared by every gridbase crate.
//! This crate has no gridbase dependencies and provides the foundation for all
//! other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types, error kinds, and result aliases
//! - [`settings`] - Engine settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorKind, GridbaseError, GridbaseResult, ValidationError};
pub use settings::{DatabaseSettings, Settings, SETTINGS};
