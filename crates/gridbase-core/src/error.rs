//! Core error types for gridbase.
//!
//! This module provides the [`GridbaseError`] enum shared by every crate in the
//! workspace, plus the field-keyed [`ValidationError`] used when field
//! attributes fail validation. Each variant belongs to exactly one
//! [`ErrorKind`], which is what callers should branch on when deciding whether
//! an error is recoverable (fix input and retry) or fatal for the operation.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional per-attribute errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-attribute error lists).
///
/// # Examples
///
/// ```
/// use gridbase_core::error::ValidationError;
///
/// let err = ValidationError::new("This attribute is required.", "required");
///
/// let mut attribute_errors = std::collections::HashMap::new();
/// attribute_errors.insert(
///     "number_decimal_places".to_string(),
///     vec![ValidationError::new("Must be between 1 and 5.", "invalid")],
/// );
/// let err = ValidationError::with_field_errors(attribute_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-attribute validation errors, keyed by attribute name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-attribute errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Creates a `ValidationError` for a single attribute.
    pub fn for_attribute(
        attribute: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(attribute.into(), vec![Self::new(message, code)]);
        Self::with_field_errors(field_errors)
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if an error was recorded for the given attribute.
    pub fn has_error_for(&self, attribute: &str) -> bool {
        self.field_errors.contains_key(attribute)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut first = true;
            for (field, errors) in &self.field_errors {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The category an error belongs to.
///
/// Validation and invariant errors are raised before anything is persisted and
/// are always recoverable by the caller. `SchemaAlteration` means the whole
/// update failed and the field keeps its previous type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The actor is not a member of the tenant group.
    Authorization,
    /// A referenced field or table does not exist.
    NotFound,
    /// A primary-field invariant would be violated.
    InvariantViolation,
    /// Attribute values or type names are invalid.
    Validation,
    /// The backend rejected a physical column change.
    SchemaAlteration,
    /// Any other error reported by the relational backend.
    Database,
    /// Configuration, serialization, or IO problems.
    Configuration,
}

/// The primary error type for gridbase.
#[derive(Error, Debug)]
pub enum GridbaseError {
    // ── Authorization ────────────────────────────────────────────────

    /// The user does not belong to the group that owns the table.
    #[error("User {user_id} does not belong to group {group_id}")]
    UserNotInGroup {
        /// The id of the acting user.
        user_id: i64,
        /// The id of the group owning the table.
        group_id: i64,
    },

    // ── Lookup ───────────────────────────────────────────────────────

    /// No field exists with the requested id.
    #[error("Field does not exist: {0}")]
    FieldDoesNotExist(String),

    /// No table exists with the requested id.
    #[error("Table does not exist: {0}")]
    TableDoesNotExist(String),

    // ── Invariants ───────────────────────────────────────────────────

    /// A second primary field was requested for a table.
    #[error("Primary field already exists: {0}")]
    PrimaryFieldAlreadyExists(String),

    /// The primary field of a table cannot be deleted.
    #[error("Cannot delete primary field: {0}")]
    CannotDeletePrimaryField(String),

    /// The primary field cannot be converted to a type that is not primary-eligible.
    #[error("The field type {0} is not compatible with the primary field")]
    IncompatiblePrimaryFieldType(String),

    // ── Validation ───────────────────────────────────────────────────

    /// No field type is registered under the given name.
    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    /// One or more field attributes failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Schema alteration ────────────────────────────────────────────

    /// The physical column could not be altered to the new type.
    #[error("Cannot change field type: {0}")]
    CannotChangeFieldType(String),

    // ── Database ─────────────────────────────────────────────────────

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The engine rejected a value for its target type.
    #[error("Data error: {0}")]
    DataError(String),

    /// The engine rejected the statement itself (syntax, missing column, ...).
    #[error("Programming error: {0}")]
    ProgrammingError(String),

    /// A database integrity constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// An operational database error (connection failure, lock contention, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GridbaseError {
    /// Returns the category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotInGroup { .. } => ErrorKind::Authorization,
            Self::FieldDoesNotExist(_) | Self::TableDoesNotExist(_) => ErrorKind::NotFound,
            Self::PrimaryFieldAlreadyExists(_)
            | Self::CannotDeletePrimaryField(_)
            | Self::IncompatiblePrimaryFieldType(_) => ErrorKind::InvariantViolation,
            Self::UnknownFieldType(_) | Self::ValidationError(_) => ErrorKind::Validation,
            Self::CannotChangeFieldType(_) => ErrorKind::SchemaAlteration,
            Self::DatabaseError(_)
            | Self::DataError(_)
            | Self::ProgrammingError(_)
            | Self::IntegrityError(_)
            | Self::OperationalError(_) => ErrorKind::Database,
            Self::ConfigurationError(_) | Self::SerializationError(_) | Self::IoError(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Returns `true` for any error reported by the relational backend.
    pub const fn is_database_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Database)
    }

    /// Returns `true` if the engine rejected a value for its target type.
    pub const fn is_data_error(&self) -> bool {
        matches!(self, Self::DataError(_))
    }
}

impl From<ValidationError> for GridbaseError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for GridbaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, GridbaseError>`.
pub type GridbaseResult<T> = Result<T, GridbaseError>;
