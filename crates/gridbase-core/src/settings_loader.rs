//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `GRIDBASE_DEBUG` | `debug` |
//! | `GRIDBASE_LOG_LEVEL` | `log_level` |
//! | `GRIDBASE_DATABASE_NAME` | `name` of the user table database |
//! | `GRIDBASE_USER_TABLE_DATABASE` | `user_table_database` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use gridbase_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("gridbase.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::{GridbaseError, GridbaseResult};
use crate::settings::{DatabaseSettings, Settings};

/// Loads settings from a TOML string.
///
/// Any keys not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> GridbaseResult<Settings> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| GridbaseError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_with_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> GridbaseResult<Settings> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> GridbaseResult<Settings> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> GridbaseResult<Settings> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| GridbaseError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_with_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> GridbaseResult<Settings> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> GridbaseResult<Settings> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `GRIDBASE_*` environment variable overrides to a settings struct.
///
/// `GRIDBASE_DEBUG` accepts "true", "1" or "yes"; anything else disables
/// debug mode. `GRIDBASE_DATABASE_NAME` is applied after
/// `GRIDBASE_USER_TABLE_DATABASE` and creates the alias if it is missing.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("GRIDBASE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("GRIDBASE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("GRIDBASE_USER_TABLE_DATABASE") {
        settings.user_table_database = val;
    }

    if let Ok(val) = std::env::var("GRIDBASE_DATABASE_NAME") {
        settings
            .databases
            .entry(settings.user_table_database.clone())
            .or_insert_with(DatabaseSettings::default)
            .name = val;
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> GridbaseResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        GridbaseError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_with_defaults(value: serde_json::Value, format: &str) -> GridbaseResult<Settings> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        GridbaseError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        GridbaseError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
