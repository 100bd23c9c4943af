//! Persistence of table and field metadata.
//!
//! [`TableStore`] and [`FieldStore`] read and write the `database_table` and
//! `database_field` rows created by [`install`](crate::install::install).
//! They issue plain statements on the caller's executor and never open a
//! transaction of their own; the [`FieldHandler`](crate::handler::FieldHandler)
//! wraps every operation in one.

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{atomic, DbExecutor, Row, SchemaEditor, Value};

use crate::models::{Attributes, Field, Table};
use crate::registry::FieldType;

/// Reads and creates tables.
pub struct TableStore;

impl TableStore {
    /// Creates a table record and its physical table.
    pub fn create(
        db: &dyn DbExecutor,
        editor: &dyn SchemaEditor,
        name: &str,
        group_id: i64,
    ) -> GridbaseResult<Table> {
        atomic(db, |db| {
            let id = db.insert_returning_id(
                "INSERT INTO \"database_table\" (\"name\", \"group_id\") VALUES (?, ?)",
                &[Value::from(name), Value::Int(group_id)],
            )?;
            let table = Table {
                id,
                name: name.to_string(),
                group_id,
            };
            db.execute_batch(&editor.create_table(&table.db_table(), &[]))?;
            tracing::info!(table_id = id, group_id, "created table");
            Ok(table)
        })
    }

    /// Returns the table with `table_id`.
    pub fn get(db: &dyn DbExecutor, table_id: i64) -> GridbaseResult<Table> {
        let rows = db.query(
            "SELECT \"id\", \"name\", \"group_id\" FROM \"database_table\" WHERE \"id\" = ?",
            &[Value::Int(table_id)],
        )?;
        let row = rows.into_iter().next().ok_or_else(|| {
            GridbaseError::TableDoesNotExist(format!(
                "The table with id {table_id} does not exist."
            ))
        })?;
        Ok(Table {
            id: row.get("id")?,
            name: row.get("name")?,
            group_id: row.get("group_id")?,
        })
    }
}

const FIELD_COLUMNS: &str =
    "\"id\", \"table_id\", \"name\", \"order\", \"primary\", \"type\", \"attributes\"";

fn field_from_row(row: &Row) -> GridbaseResult<Field> {
    let attributes = match row.get::<serde_json::Value>("attributes")? {
        serde_json::Value::Object(map) => map,
        _ => Attributes::new(),
    };
    Ok(Field {
        id: row.get("id")?,
        table_id: row.get("table_id")?,
        name: row.get("name")?,
        order: row.get("order")?,
        primary: row.get("primary")?,
        field_type: row.get("type")?,
        attributes,
    })
}

fn attributes_param(attributes: &Attributes) -> GridbaseResult<Value> {
    Ok(Value::String(serde_json::to_string(attributes)?))
}

/// Reads and writes field records.
pub struct FieldStore;

impl FieldStore {
    /// Inserts a field record and returns it with its new id.
    pub fn create(
        db: &dyn DbExecutor,
        table_id: i64,
        name: &str,
        order: i64,
        primary: bool,
        field_type: &str,
        attributes: Attributes,
    ) -> GridbaseResult<Field> {
        let id = db.insert_returning_id(
            "INSERT INTO \"database_field\" \
             (\"table_id\", \"name\", \"order\", \"primary\", \"type\", \"attributes\") \
             VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Int(table_id),
                Value::from(name),
                Value::Int(order),
                Value::Bool(primary),
                Value::from(field_type),
                attributes_param(&attributes)?,
            ],
        )?;
        Ok(Field {
            id,
            table_id,
            name: name.to_string(),
            order,
            primary,
            field_type: field_type.to_string(),
            attributes,
        })
    }

    /// Writes the name, type and attributes of `field`.
    ///
    /// Table, order and the primary flag never change after creation.
    pub fn save(db: &dyn DbExecutor, field: &Field) -> GridbaseResult<()> {
        let updated = db.execute_sql(
            "UPDATE \"database_field\" SET \"name\" = ?, \"type\" = ?, \"attributes\" = ? \
             WHERE \"id\" = ?",
            &[
                Value::from(field.name.as_str()),
                Value::from(field.field_type.as_str()),
                attributes_param(&field.attributes)?,
                Value::Int(field.id),
            ],
        )?;
        if updated == 0 {
            return Err(does_not_exist(field.id));
        }
        Ok(())
    }

    /// Deletes the record of `field_id`.
    pub fn delete(db: &dyn DbExecutor, field_id: i64) -> GridbaseResult<()> {
        db.execute_sql(
            "DELETE FROM \"database_field\" WHERE \"id\" = ?",
            &[Value::Int(field_id)],
        )?;
        Ok(())
    }

    /// Returns the field with `field_id`.
    pub fn get(db: &dyn DbExecutor, field_id: i64) -> GridbaseResult<Field> {
        let rows = db.query(
            &format!("SELECT {FIELD_COLUMNS} FROM \"database_field\" WHERE \"id\" = ?"),
            &[Value::Int(field_id)],
        )?;
        rows.first()
            .map(field_from_row)
            .unwrap_or_else(|| Err(does_not_exist(field_id)))
    }

    /// Returns every field of a table in display order.
    pub fn for_table(db: &dyn DbExecutor, table_id: i64) -> GridbaseResult<Vec<Field>> {
        db.query(
            &format!(
                "SELECT {FIELD_COLUMNS} FROM \"database_field\" \
                 WHERE \"table_id\" = ? ORDER BY \"order\", \"id\""
            ),
            &[Value::Int(table_id)],
        )?
        .iter()
        .map(field_from_row)
        .collect()
    }

    /// Returns `true` if the table already has a primary field.
    pub fn primary_exists(db: &dyn DbExecutor, table_id: i64) -> GridbaseResult<bool> {
        let row = db.query_one(
            "SELECT COUNT(*) AS n FROM \"database_field\" WHERE \"table_id\" = ? AND \"primary\"",
            &[Value::Int(table_id)],
        )?;
        Ok(row.get::<i64>("n")? > 0)
    }

    /// Returns an order above every field of the table, starting at 1.
    pub fn next_order(db: &dyn DbExecutor, table_id: i64) -> GridbaseResult<i64> {
        let row = db.query_one(
            "SELECT COALESCE(MAX(\"order\"), 0) + 1 AS next_order FROM \"database_field\" \
             WHERE \"table_id\" = ?",
            &[Value::Int(table_id)],
        )?;
        row.get("next_order")
    }
}

fn does_not_exist(field_id: i64) -> GridbaseError {
    GridbaseError::FieldDoesNotExist(format!("The field with id {field_id} does not exist."))
}

/// Reclassifies `field` as `field_type` in place.
///
/// Id, table, name, order and the primary flag are kept. Attributes the new
/// type does not allow are dropped and missing ones take the new type's
/// defaults.
pub fn change_discriminator(field: &mut Field, field_type: &dyn FieldType) {
    let allowed = field_type.allowed_fields();
    field
        .attributes
        .retain(|name, _| allowed.contains(&name.as_str()));
    for (name, value) in field_type.default_attributes() {
        field.attributes.entry(name).or_insert(value);
    }
    field.field_type = field_type.type_name().to_string();
}
