//! The field handler.
//!
//! [`FieldHandler`] is the entry point for creating, changing and deleting
//! fields. Each operation checks group membership, enforces the primary field
//! rules, runs the type's hooks in their documented order and keeps the
//! metadata, the physical column and dependent view artifacts in step.
//!
//! Every operation runs inside one [`atomic`] block on the caller's
//! executor: when any step fails, including the column alteration, the
//! metadata changes made by the operation are rolled back with it.

use std::slice;
use std::sync::Arc;

use gridbase_core::logging::field_span;
use gridbase_core::{GridbaseError, GridbaseResult, ValidationError};
use gridbase_db::{atomic, DbExecutor, SchemaLocks, SqliteSchemaEditor};

use crate::auth::{check_group, GroupMembership, User};
use crate::converters::ConverterRegistry;
use crate::models::{Attributes, Field, Table};
use crate::registry::{FieldChange, FieldTypeRegistry};
use crate::store::{change_discriminator, FieldStore, TableStore};
use crate::synchronizer::SchemaSynchronizer;
use crate::views::FieldDependents;

/// A request to create a field.
#[derive(Debug, Clone)]
pub struct NewField {
    type_name: String,
    primary: bool,
    do_schema_change: bool,
    values: Attributes,
}

impl NewField {
    /// A field of `type_name` called `name`.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        let mut values = Attributes::new();
        values.insert("name".to_string(), serde_json::Value::String(name.into()));
        Self {
            type_name: type_name.into(),
            primary: false,
            do_schema_change: true,
            values,
        }
    }

    /// Makes the field the primary field of its table.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Only creates the metadata; the column is added by other means.
    pub fn without_schema_change(mut self) -> Self {
        self.do_schema_change = false;
        self
    }

    /// Sets an attribute. Attributes the type does not allow are ignored.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Sets several attributes.
    pub fn values(mut self, values: Attributes) -> Self {
        self.values.extend(values);
        self
    }
}

/// A request to change a field.
#[derive(Debug, Clone, Default)]
pub struct FieldUpdate {
    new_type_name: Option<String>,
    values: Attributes,
}

impl FieldUpdate {
    /// An update that changes nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the field type.
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.new_type_name = Some(type_name.into());
        self
    }

    /// Renames the field.
    pub fn name(self, name: impl Into<String>) -> Self {
        self.value("name", name.into())
    }

    /// Sets an attribute. Attributes the type does not allow are ignored.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Sets several attributes.
    pub fn values(mut self, values: Attributes) -> Self {
        self.values.extend(values);
        self
    }
}

/// Keeps the values whose key is `name` or one of `allowed`.
fn extract_allowed(values: &Attributes, allowed: &[&str]) -> Attributes {
    values
        .iter()
        .filter(|(key, _)| key.as_str() == "name" || allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Removes and validates the `name` value.
fn take_name(values: &mut Attributes) -> GridbaseResult<Option<String>> {
    match values.remove("name") {
        None => Ok(None),
        Some(serde_json::Value::String(name)) if !name.trim().is_empty() => Ok(Some(name)),
        Some(_) => Err(
            ValidationError::for_attribute("name", "This field may not be blank.", "blank").into(),
        ),
    }
}

/// Creates, changes and deletes fields.
pub struct FieldHandler {
    registry: Arc<FieldTypeRegistry>,
    membership: Arc<dyn GroupMembership>,
    dependents: Arc<dyn FieldDependents>,
    synchronizer: SchemaSynchronizer,
}

impl FieldHandler {
    /// Creates a handler altering SQLite tables.
    ///
    /// Every handler created this way uses [`SchemaLocks::global`], so
    /// handlers in one process never alter the same table at once. Use
    /// [`with_synchronizer`](Self::with_synchronizer) for a private registry.
    pub fn new(
        registry: Arc<FieldTypeRegistry>,
        converters: Arc<ConverterRegistry>,
        membership: Arc<dyn GroupMembership>,
        dependents: Arc<dyn FieldDependents>,
    ) -> Self {
        let synchronizer = SchemaSynchronizer::new(
            Arc::new(SqliteSchemaEditor),
            SchemaLocks::global(),
            converters,
        );
        Self {
            registry,
            membership,
            dependents,
            synchronizer,
        }
    }

    /// Replaces the schema synchronizer, e.g. to share schema locks between
    /// handlers or to target another SQL dialect.
    pub fn with_synchronizer(mut self, synchronizer: SchemaSynchronizer) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    /// The field type registry.
    pub fn registry(&self) -> &FieldTypeRegistry {
        &self.registry
    }

    /// The schema synchronizer.
    pub fn synchronizer(&self) -> &SchemaSynchronizer {
        &self.synchronizer
    }

    /// Returns the field with `field_id` if `user` may access its table.
    pub fn get_field(
        &self,
        db: &dyn DbExecutor,
        user: &User,
        field_id: i64,
    ) -> GridbaseResult<Field> {
        let field = FieldStore::get(db, field_id)?;
        let table = TableStore::get(db, field.table_id)?;
        check_group(self.membership.as_ref(), table.group_id, user)?;
        Ok(field)
    }

    /// Creates a field and, unless disabled, its column.
    pub fn create_field(
        &self,
        db: &dyn DbExecutor,
        user: &User,
        table: &Table,
        new_field: &NewField,
    ) -> GridbaseResult<Field> {
        let span = field_span("create_field", 0);
        let _entered = span.enter();
        check_group(self.membership.as_ref(), table.group_id, user)?;

        atomic(db, |db| {
            if new_field.primary && FieldStore::primary_exists(db, table.id)? {
                return Err(GridbaseError::PrimaryFieldAlreadyExists(format!(
                    "A primary field already exists for the table {table}."
                )));
            }

            let field_type = self.registry.get(&new_field.type_name)?;
            if new_field.primary && !field_type.can_be_primary_field() {
                return Err(GridbaseError::IncompatiblePrimaryFieldType(
                    new_field.type_name.clone(),
                ));
            }

            let mut values = extract_allowed(&new_field.values, field_type.allowed_fields());
            let name = take_name(&mut values)?.ok_or_else(|| {
                GridbaseError::from(ValidationError::for_attribute(
                    "name",
                    "This field is required.",
                    "required",
                ))
            })?;
            let mut values = field_type.prepare_values(values, user)?;
            let order = FieldStore::next_order(db, table.id)?;
            field_type.before_create(table, new_field.primary, &mut values, order, user)?;

            let mut attributes = field_type.default_attributes();
            attributes.extend(values);
            let field = FieldStore::create(
                db,
                table.id,
                &name,
                order,
                new_field.primary,
                field_type.type_name(),
                attributes,
            )?;

            let model = table.get_model(slice::from_ref(&field), &self.registry)?;
            if new_field.do_schema_change {
                self.synchronizer.add_column(db, &model, &field)?;
            }
            field_type.after_create(&field, &model, user, db)?;

            tracing::info!(
                field_id = field.id,
                table_id = table.id,
                field_type = %field.field_type,
                primary = field.primary,
                "created field"
            );
            Ok(field)
        })
    }

    /// Changes the name, attributes and optionally the type of `field`.
    ///
    /// Returns the field as stored after the update.
    pub fn update_field(
        &self,
        db: &dyn DbExecutor,
        user: &User,
        field: &Field,
        update: &FieldUpdate,
    ) -> GridbaseResult<Field> {
        let span = field_span("update_field", field.id);
        let _entered = span.enter();

        atomic(db, |db| {
            let table = TableStore::get(db, field.table_id)?;
            check_group(self.membership.as_ref(), table.group_id, user)?;

            let old_field = field.clone();
            let old_type = self.registry.get_for_field(&old_field)?;
            let mut field = field.clone();
            let mut field_type = old_type;

            let new_type_name = update
                .new_type_name
                .as_deref()
                .filter(|name| *name != old_type.type_name());
            if let Some(new_type_name) = new_type_name {
                field_type = self.registry.get(new_type_name)?;
                if field.primary && !field_type.can_be_primary_field() {
                    return Err(GridbaseError::IncompatiblePrimaryFieldType(
                        new_type_name.to_string(),
                    ));
                }
                change_discriminator(&mut field, field_type);
                self.dependents.field_type_changed(db, &field)?;
            }

            let mut values = extract_allowed(&update.values, field_type.allowed_fields());
            let name = take_name(&mut values)?;
            let mut values = field_type.prepare_values(values, user)?;
            field_type.before_update(&old_field, &mut values, user)?;
            if let Some(name) = name {
                field.name = name;
            }
            field.attributes.extend(values);
            FieldStore::save(db, &field)?;

            let old_model = table.get_model(slice::from_ref(&old_field), &self.registry)?;
            let new_model = table.get_model(slice::from_ref(&field), &self.registry)?;
            let change = FieldChange {
                old_field: &old_field,
                new_field: &field,
                old_model: &old_model,
                new_model: &new_model,
                old_column: old_model.column_for(&old_field)?,
                new_column: new_model.column_for(&field)?,
                old_target: old_type.cast_target(&old_field),
                new_target: field_type.cast_target(&field),
            };

            old_type.before_schema_change(&change, user, db)?;
            let outcome = self.synchronizer.alter_column(db, &change, user)?;
            field_type.after_update(&change, user, db, outcome.altered_column)?;

            tracing::info!(
                from = old_type.type_name(),
                to = field_type.type_name(),
                strategy = ?outcome.strategy,
                altered_column = outcome.altered_column,
                "updated field"
            );
            Ok(field)
        })
    }

    /// Deletes `field` and its column. The primary field cannot be deleted.
    pub fn delete_field(&self, db: &dyn DbExecutor, user: &User, field: &Field) -> GridbaseResult<()> {
        let span = field_span("delete_field", field.id);
        let _entered = span.enter();

        atomic(db, |db| {
            let table = TableStore::get(db, field.table_id)?;
            check_group(self.membership.as_ref(), table.group_id, user)?;
            if field.primary {
                return Err(GridbaseError::CannotDeletePrimaryField(
                    "Cannot delete the primary field of a table.".to_string(),
                ));
            }

            let field_type = self.registry.get_for_field(field)?;
            let model = table.get_model(slice::from_ref(field), &self.registry)?;
            self.dependents.field_deleted(db, field)?;
            self.synchronizer.remove_column(db, &model, field)?;
            field_type.after_delete(field, &model, user, db)?;

            tracing::info!(field_type = %field.field_type, "deleted field");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_allowed() {
        let mut values = Attributes::new();
        values.insert("name".into(), json!("Price"));
        values.insert("number_negative".into(), json!(true));
        values.insert("select_options_last_id".into(), json!(99));

        let allowed = extract_allowed(&values, &["number_negative", "number_type"]);
        assert_eq!(allowed.len(), 2);
        assert!(allowed.contains_key("name"));
        assert!(allowed.contains_key("number_negative"));
    }

    #[test]
    fn test_take_name() {
        let mut values = Attributes::new();
        assert_eq!(take_name(&mut values).unwrap(), None);

        values.insert("name".into(), json!("Status"));
        assert_eq!(take_name(&mut values).unwrap().as_deref(), Some("Status"));
        assert!(values.is_empty());

        values.insert("name".into(), json!("  "));
        let err = take_name(&mut values).unwrap_err();
        assert!(matches!(err, GridbaseError::ValidationError(ref v) if v.has_error_for("name")));

        values.insert("name".into(), json!(5));
        assert!(take_name(&mut values).is_err());
    }

    #[test]
    fn test_builders() {
        let new_field = NewField::new("number", "Price")
            .primary()
            .without_schema_change()
            .value("number_negative", true);
        assert!(new_field.primary);
        assert!(!new_field.do_schema_change);
        assert_eq!(new_field.values.get("name"), Some(&json!("Price")));
        assert_eq!(new_field.values.len(), 2);

        let update = FieldUpdate::new().type_name("text").name("Label");
        assert_eq!(update.new_type_name.as_deref(), Some("text"));
        assert_eq!(update.values.get("name"), Some(&json!("Label")));
    }
}
