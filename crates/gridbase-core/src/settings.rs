//! Settings for gridbase.
//!
//! This module provides the [`Settings`] struct, which holds engine
//! configuration, and [`LazySettings`], a globally-accessible, lazily
//! initialized settings instance.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{GridbaseError, GridbaseResult};

/// The engine identifier of the bundled `SQLite` backend.
pub const SQLITE_ENGINE: &str = "gridbase.db.backends.sqlite3";

/// Database connection configuration.
///
/// Missing keys fall back to their defaults, so a partial `[databases.<alias>]`
/// table is enough to declare a new alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// The database engine (e.g. `gridbase.db.backends.sqlite3`).
    pub engine: String,
    /// The database file path, or `:memory:` for a private in-memory database.
    pub name: String,
    /// Additional engine-specific options (e.g. `busy_timeout_ms`).
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: SQLITE_ENGINE.to_string(),
            name: "gridbase.sqlite3".to_string(),
            options: HashMap::new(),
        }
    }
}

impl DatabaseSettings {
    /// Settings for a private in-memory `SQLite` database.
    pub fn memory() -> Self {
        Self {
            name: ":memory:".to_string(),
            ..Self::default()
        }
    }

    /// Returns the `SQLite` busy timeout in milliseconds, if configured.
    pub fn busy_timeout_ms(&self) -> Option<u64> {
        self.options
            .get("busy_timeout_ms")
            .and_then(|v| v.trim().parse().ok())
    }
}

/// The complete set of gridbase settings.
///
/// # Examples
///
/// ```
/// use gridbase_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.user_table_database, "default");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Controls the log output format.
    pub debug: bool,

    // ── Database ─────────────────────────────────────────────────────

    /// Database configurations, keyed by alias (e.g. "default").
    pub databases: HashMap<String, DatabaseSettings>,
    /// The alias of the database holding the physical user tables.
    pub user_table_database: String,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level or filter directive (e.g. "info", "gridbase_fields=debug").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert("default".to_string(), DatabaseSettings::default());

        Self {
            debug: true,
            databases,
            user_table_database: "default".to_string(),
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the database settings for the given alias.
    pub fn database(&self, alias: &str) -> GridbaseResult<&DatabaseSettings> {
        self.databases.get(alias).ok_or_else(|| {
            GridbaseError::ConfigurationError(format!("No database configured with alias '{alias}'"))
        })
    }

    /// Returns the database settings for the user table database.
    pub fn user_tables(&self) -> GridbaseResult<&DatabaseSettings> {
        self.database(&self.user_table_database)
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    pub fn configure(&self, settings: Settings) -> GridbaseResult<()> {
        self.inner.set(settings).map_err(|_| {
            GridbaseError::ConfigurationError("Settings have already been configured".to_string())
        })
    }

    /// Returns a reference to the configured settings.
    pub fn get(&self) -> GridbaseResult<&Settings> {
        self.inner.get().ok_or_else(|| {
            GridbaseError::ConfigurationError(
                "Settings have not been configured. Call SETTINGS.configure() first.".to_string(),
            )
        })
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
