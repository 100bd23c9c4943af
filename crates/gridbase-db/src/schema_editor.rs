//! Schema editor implementations for DDL generation.
//!
//! The [`SchemaEditor`] trait turns [`ColumnDef`]s into DDL statements for a
//! particular SQL dialect. Like the rest of the database layer it only builds
//! SQL; executing it is left to a [`DbExecutor`](crate::executor::DbExecutor).
//!
//! Column type changes use a shadow column: the new definition is added under
//! a temporary name, populated from the old column, and then swapped in place
//! of the old one. This works on engines without `ALTER COLUMN ... TYPE`
//! (SQLite) and keeps the whole change inside one transaction.

use crate::cast::CastTarget;
use crate::value::Value;

/// The physical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Unbounded text.
    Text,
    /// Text with a maximum length.
    Varchar(u32),
    /// 64-bit integer.
    Integer,
    /// Fixed-point number.
    Decimal {
        /// Total number of digits.
        max_digits: u8,
        /// Digits after the decimal point.
        decimal_places: u8,
    },
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time without timezone.
    DateTime,
}

/// A physical column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// The column name.
    pub column: String,
    /// The column type.
    pub column_type: ColumnType,
    /// Whether the column accepts `NULL`.
    pub null: bool,
    /// The column default, if any.
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Creates a nullable column without a default.
    pub fn new(column: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            column: column.into(),
            column_type,
            null: true,
            default: None,
        }
    }

    /// Marks the column as `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.null = false;
        self
    }

    /// Sets the column default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns a copy of this definition under another column name.
    pub fn with_column(&self, column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..self.clone()
        }
    }
}

/// Returns the temporary name used while a column's type is being changed.
pub fn shadow_column_name(column: &str) -> String {
    format!("{column}__shadow")
}

/// Generates DDL SQL for schema operations.
///
/// Returns `Vec<String>` because some operations need multiple statements.
pub trait SchemaEditor: Send + Sync {
    /// Returns the vendor this editor targets (e.g. "sqlite").
    fn vendor(&self) -> &'static str;

    /// Generates `CREATE TABLE` DDL for a user table with an integer `id`
    /// primary key followed by the given columns.
    fn create_table(&self, table_name: &str, columns: &[ColumnDef]) -> Vec<String>;

    /// Generates `DROP TABLE` DDL.
    fn drop_table(&self, table_name: &str) -> Vec<String>;

    /// Generates `ALTER TABLE ... ADD COLUMN` DDL.
    fn add_column(&self, table_name: &str, column: &ColumnDef) -> Vec<String>;

    /// Generates `ALTER TABLE ... DROP COLUMN` DDL.
    fn drop_column(&self, table_name: &str, column_name: &str) -> Vec<String>;

    /// Generates `ALTER TABLE ... RENAME COLUMN` DDL.
    fn rename_column(&self, table_name: &str, old_name: &str, new_name: &str) -> Vec<String>;

    /// Returns the backend type name for a column type (e.g. `DECIMAL(50,2)`).
    fn db_type(&self, column_type: ColumnType) -> String;

    /// Generates the SQL fragment for a column definition (type, constraints).
    fn column_sql(&self, column: &ColumnDef) -> String {
        let null_str = if column.null { "" } else { " NOT NULL" };
        format!(
            "{}{null_str}{}",
            self.db_type(column.column_type),
            default_sql(column)
        )
    }

    /// Adds the shadow column for `new_column`.
    fn add_shadow_column(&self, table_name: &str, new_column: &ColumnDef) -> Vec<String> {
        self.add_column(
            table_name,
            &new_column.with_column(shadow_column_name(&new_column.column)),
        )
    }

    /// Fills the shadow column of `column` by passing every value of `column`
    /// through the SQL cast `function` towards `target`.
    fn populate_shadow_column(
        &self,
        table_name: &str,
        column: &str,
        function: &str,
        target: CastTarget,
    ) -> Vec<String> {
        let shadow = shadow_column_name(column);
        vec![format!(
            "UPDATE \"{table_name}\" SET \"{shadow}\" = {function}(\"{column}\", '{target}')"
        )]
    }

    /// A parameterised statement setting one row's shadow value.
    ///
    /// Parameters are the new value followed by the row id.
    fn update_shadow_value(&self, table_name: &str, column: &str) -> String {
        let shadow = shadow_column_name(column);
        format!("UPDATE \"{table_name}\" SET \"{shadow}\" = ? WHERE \"id\" = ?")
    }

    /// Drops `column` and renames its shadow column into its place.
    fn swap_shadow_column(&self, table_name: &str, column: &str) -> Vec<String> {
        let mut statements = self.drop_column(table_name, column);
        statements.extend(self.rename_column(table_name, &shadow_column_name(column), column));
        statements
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Generates the default value SQL fragment for a column.
fn default_sql(column: &ColumnDef) -> String {
    match &column.default {
        Some(Value::Null) => " DEFAULT NULL".to_string(),
        Some(Value::Bool(b)) => format!(" DEFAULT {}", if *b { "TRUE" } else { "FALSE" }),
        Some(Value::Int(i)) => format!(" DEFAULT {i}"),
        Some(Value::Float(f)) => format!(" DEFAULT {f}"),
        Some(Value::String(s)) => format!(" DEFAULT '{}'", s.replace('\'', "''")),
        Some(_) | None => String::new(),
    }
}

// ── SQLite ───────────────────────────────────────────────────────────────

/// Schema editor for SQLite databases.
///
/// Requires SQLite 3.35+ for `DROP COLUMN` and 3.25+ for `RENAME COLUMN`;
/// the bundled library shipped with `rusqlite` satisfies both.
pub struct SqliteSchemaEditor;

impl SchemaEditor for SqliteSchemaEditor {
    fn vendor(&self) -> &'static str {
        "sqlite"
    }

    fn create_table(&self, table_name: &str, columns: &[ColumnDef]) -> Vec<String> {
        let mut col_defs = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        col_defs.extend(
            columns
                .iter()
                .map(|c| format!("\"{}\" {}", c.column, self.column_sql(c))),
        );
        vec![format!(
            "CREATE TABLE \"{table_name}\" ({})",
            col_defs.join(", ")
        )]
    }

    fn drop_table(&self, table_name: &str) -> Vec<String> {
        vec![format!("DROP TABLE IF EXISTS \"{table_name}\"")]
    }

    fn add_column(&self, table_name: &str, column: &ColumnDef) -> Vec<String> {
        vec![format!(
            "ALTER TABLE \"{table_name}\" ADD COLUMN \"{}\" {}",
            column.column,
            self.column_sql(column)
        )]
    }

    fn drop_column(&self, table_name: &str, column_name: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE \"{table_name}\" DROP COLUMN \"{column_name}\""
        )]
    }

    fn rename_column(&self, table_name: &str, old_name: &str, new_name: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE \"{table_name}\" RENAME COLUMN \"{old_name}\" TO \"{new_name}\""
        )]
    }

    fn db_type(&self, column_type: ColumnType) -> String {
        match column_type {
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({n})"),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Decimal {
                max_digits,
                decimal_places,
            } => format!("DECIMAL({max_digits},{decimal_places})"),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
        }
    }
}
