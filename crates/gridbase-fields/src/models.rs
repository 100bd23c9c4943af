//! Tables, fields, and the physical model derived from them.
//!
//! A [`Field`] is a tagged record: the `field_type` discriminator names the
//! registered [`FieldType`](crate::registry::FieldType) and `attributes` holds
//! the type-specific settings as a JSON object. The physical column of a field
//! is never stored separately; [`Table::get_model`] derives it on demand.

use std::fmt;

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{ColumnDef, DbExecutor, Value};
use serde::{Deserialize, Serialize};

use crate::registry::FieldTypeRegistry;

/// Type-specific field attributes, keyed by attribute name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A user table owned by a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// The table id.
    pub id: i64,
    /// The display name.
    pub name: String,
    /// The group whose members may change the table.
    pub group_id: i64,
}

impl Table {
    /// The name of the physical table holding the rows.
    pub fn db_table(&self) -> String {
        format!("database_table_{}", self.id)
    }

    /// Builds the physical model for `fields`.
    ///
    /// Only the given fields are part of the model, so callers can build a
    /// model for a single field before and after it changes.
    pub fn get_model(
        &self,
        fields: &[Field],
        registry: &FieldTypeRegistry,
    ) -> GridbaseResult<PhysicalModel> {
        let columns = fields
            .iter()
            .map(|field| {
                let field_type = registry.get_for_field(field)?;
                Ok((field.id, field_type.column_def(field)))
            })
            .collect::<GridbaseResult<Vec<_>>>()?;
        Ok(PhysicalModel {
            table_id: self.id,
            db_table: self.db_table(),
            columns,
        })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// The metadata record of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// The field id.
    pub id: i64,
    /// The owning table.
    pub table_id: i64,
    /// The display name.
    pub name: String,
    /// Creation sequence within the table.
    pub order: i64,
    /// Whether this is the primary field of the table.
    pub primary: bool,
    /// The registered type name.
    pub field_type: String,
    /// Attributes for the current type.
    pub attributes: Attributes,
}

impl Field {
    /// The name of the physical column holding this field's cells.
    pub fn db_column(&self) -> String {
        format!("field_{}", self.id)
    }

    /// Returns a raw attribute.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Returns a string attribute.
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(serde_json::Value::as_str)
    }

    /// Returns a boolean attribute, `false` when missing.
    pub fn attribute_bool(&self, name: &str) -> bool {
        self.attribute(name)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns an integer attribute.
    pub fn attribute_i64(&self, name: &str) -> Option<i64> {
        self.attribute(name).and_then(serde_json::Value::as_i64)
    }
}

/// The physical columns of a table, one per field in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalModel {
    table_id: i64,
    db_table: String,
    columns: Vec<(i64, ColumnDef)>,
}

impl PhysicalModel {
    /// The id of the table this model belongs to.
    pub fn table_id(&self) -> i64 {
        self.table_id
    }

    /// The physical table name.
    pub fn db_table(&self) -> &str {
        &self.db_table
    }

    /// All column definitions in the model.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().map(|(_, column)| column)
    }

    /// Returns the column definition of `field`.
    pub fn column_for(&self, field: &Field) -> GridbaseResult<&ColumnDef> {
        self.columns
            .iter()
            .find(|(id, _)| *id == field.id)
            .map(|(_, column)| column)
            .ok_or_else(|| {
                GridbaseError::FieldDoesNotExist(format!(
                    "The field with id {} is not part of the model of {}.",
                    field.id, self.db_table
                ))
            })
    }

    /// Inserts a row and returns its id.
    pub fn insert_row(&self, db: &dyn DbExecutor, values: &[(&Field, Value)]) -> GridbaseResult<i64> {
        if values.is_empty() {
            return db.insert_returning_id(
                &format!("INSERT INTO \"{}\" DEFAULT VALUES", self.db_table),
                &[],
            );
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (field, value) in values {
            columns.push(format!("\"{}\"", self.column_for(field)?.column));
            params.push(value.clone());
        }
        let placeholders = vec!["?"; params.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({placeholders})",
            self.db_table,
            columns.join(", ")
        );
        db.insert_returning_id(&sql, &params)
    }

    /// Returns `(row id, cell)` for every row, ordered by row id.
    pub fn column_values(
        &self,
        db: &dyn DbExecutor,
        field: &Field,
    ) -> GridbaseResult<Vec<(i64, Value)>> {
        let column = &self.column_for(field)?.column;
        let sql = format!(
            "SELECT \"id\", \"{column}\" AS cell FROM \"{}\" ORDER BY \"id\"",
            self.db_table
        );
        db.query(&sql, &[])?
            .into_iter()
            .map(|row| Ok((row.get::<i64>("id")?, row.get::<Value>("cell")?)))
            .collect()
    }
}
