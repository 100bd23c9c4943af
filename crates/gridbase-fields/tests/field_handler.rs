//! Integration tests for the field handler against a real SQLite database.
//!
//! These tests create tables through `TableStore`, then drive
//! `FieldHandler::create_field`, `update_field` and `delete_field` and check
//! the metadata rows and physical columns they leave behind.

mod common;

use std::sync::{Arc, Mutex};

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{CastTarget, ColumnDef, ColumnType, DbExecutor, Value};
use gridbase_fields::registry::FieldChange;
use gridbase_fields::{
    ConverterRegistry, Field, FieldStore, FieldType, FieldTypeRegistry, FieldUpdate, NewField,
    PhysicalModel, Table, User,
};
use serde_json::json;

use common::{text, Env};

// ── Test field type ─────────────────────────────────────────────────────

/// A field type that records every hook invocation.
struct RecordingFieldType {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingFieldType {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl FieldType for RecordingFieldType {
    fn type_name(&self) -> &'static str {
        "recording"
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Integer)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Integer { negative: true }
    }

    fn prepare_values(
        &self,
        values: gridbase_fields::Attributes,
        _user: &User,
    ) -> GridbaseResult<gridbase_fields::Attributes> {
        self.record("prepare_values");
        Ok(values)
    }

    fn before_create(
        &self,
        _table: &Table,
        _primary: bool,
        _values: &mut gridbase_fields::Attributes,
        _order: i64,
        _user: &User,
    ) -> GridbaseResult<()> {
        self.record("before_create");
        Ok(())
    }

    fn after_create(
        &self,
        _field: &Field,
        _model: &PhysicalModel,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        self.record("after_create");
        Ok(())
    }

    fn before_update(
        &self,
        _old_field: &Field,
        _values: &mut gridbase_fields::Attributes,
        _user: &User,
    ) -> GridbaseResult<()> {
        self.record("before_update");
        Ok(())
    }

    fn before_schema_change(
        &self,
        _change: &FieldChange<'_>,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        self.record("before_schema_change");
        Ok(())
    }

    fn after_update(
        &self,
        _change: &FieldChange<'_>,
        _user: &User,
        _db: &dyn DbExecutor,
        altered_column: bool,
    ) -> GridbaseResult<()> {
        self.record(format!("after_update:{altered_column}"));
        Ok(())
    }

    fn after_delete(
        &self,
        _field: &Field,
        _model: &PhysicalModel,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        self.record("after_delete");
        Ok(())
    }
}

fn recording_env() -> (Env, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = FieldTypeRegistry::with_builtin_types();
    registry.register(RecordingFieldType {
        calls: Arc::clone(&calls),
    });
    let env = Env::with_registries(registry, ConverterRegistry::with_builtin_converters());
    (env, calls)
}

fn drain(calls: &Mutex<Vec<String>>) -> Vec<String> {
    std::mem::take(&mut *calls.lock().unwrap())
}

// ── Creating fields ─────────────────────────────────────────────────────

#[test]
fn test_create_field_adds_metadata_and_column() {
    let env = Env::new();
    let field = env.create(
        NewField::new("number", "Amount")
            .value("number_type", "DECIMAL")
            .value("number_decimal_places", 2),
    );

    assert_eq!(field.name, "Amount");
    assert_eq!(field.field_type, "number");
    assert_eq!(field.table_id, env.table.id);
    assert!(!field.primary);
    assert_eq!(field.attribute_i64("number_decimal_places"), Some(2));
    assert!(!field.attribute_bool("number_negative"));

    let stored = FieldStore::get(&env.db, field.id).unwrap();
    assert_eq!(stored, field);
    assert_eq!(
        env.column_type(&field.db_column()).as_deref(),
        Some("DECIMAL(50,2)")
    );
}

#[test]
fn test_create_field_ignores_disallowed_values() {
    let env = Env::new();
    let field = env.create(
        NewField::new("text", "Title")
            .value("text_default", "untitled")
            .value("number_decimal_places", 3),
    );

    assert_eq!(field.attribute_str("text_default"), Some("untitled"));
    assert!(field.attribute("number_decimal_places").is_none());
}

#[test]
fn test_create_field_without_schema_change() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Imported").without_schema_change());

    assert!(FieldStore::get(&env.db, field.id).is_ok());
    assert_eq!(env.column_type(&field.db_column()), None);
}

#[test]
fn test_create_field_rejects_null_name() {
    let env = Env::new();
    let new_field = NewField::new("text", "x").value("name", json!(null));

    let err = env
        .handler
        .create_field(&env.db, &env.user, &env.table, &new_field)
        .unwrap_err();
    assert!(matches!(err, GridbaseError::ValidationError(_)));
    assert!(FieldStore::for_table(&env.db, env.table.id).unwrap().is_empty());
}

#[test]
fn test_create_field_rejects_invalid_attributes_before_persisting() {
    let env = Env::new();
    let new_field = NewField::new("number", "Amount")
        .value("number_type", "DECIMAL")
        .value("number_decimal_places", 9);

    let err = env
        .handler
        .create_field(&env.db, &env.user, &env.table, &new_field)
        .unwrap_err();
    match err {
        GridbaseError::ValidationError(e) => assert!(e.has_error_for("number_decimal_places")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(FieldStore::for_table(&env.db, env.table.id).unwrap().is_empty());
}

#[test]
fn test_create_field_unknown_type() {
    let env = Env::new();
    let err = env
        .handler
        .create_field(&env.db, &env.user, &env.table, &NewField::new("formula", "F"))
        .unwrap_err();
    assert!(matches!(err, GridbaseError::UnknownFieldType(_)));
}

#[test]
fn test_field_order_is_increasing() {
    let env = Env::new();
    let first = env.create(NewField::new("text", "A"));
    let second = env.create(NewField::new("text", "B"));
    let third = env.create(NewField::new("text", "C"));
    assert_eq!((first.order, second.order, third.order), (1, 2, 3));

    env.handler.delete_field(&env.db, &env.user, &second).unwrap();
    let fourth = env.create(NewField::new("text", "D"));
    assert_eq!(fourth.order, 4);

    let names: Vec<String> = FieldStore::for_table(&env.db, env.table.id)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, ["A", "C", "D"]);
}

// ── Primary field ───────────────────────────────────────────────────────

#[test]
fn test_second_primary_field_is_rejected() {
    let env = Env::new();
    let primary = env.create(NewField::new("text", "Name").primary());

    let err = env
        .handler
        .create_field(
            &env.db,
            &env.user,
            &env.table,
            &NewField::new("text", "Other").primary(),
        )
        .unwrap_err();
    assert!(matches!(err, GridbaseError::PrimaryFieldAlreadyExists(_)));

    let fields = FieldStore::for_table(&env.db, env.table.id).unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].id, primary.id);
    assert!(fields[0].primary);
}

#[test]
fn test_primary_field_cannot_be_deleted() {
    let env = Env::new();
    let primary = env.create(NewField::new("text", "Name").primary());
    env.insert(&primary, vec![text("kept")]);

    let err = env
        .handler
        .delete_field(&env.db, &env.user, &primary)
        .unwrap_err();
    assert!(matches!(err, GridbaseError::CannotDeletePrimaryField(_)));

    assert!(FieldStore::get(&env.db, primary.id).is_ok());
    assert_eq!(env.column_type(&primary.db_column()).as_deref(), Some("TEXT"));
    assert_eq!(env.cells(&primary), vec![text("kept")]);
}

#[test]
fn test_primary_field_cannot_become_boolean() {
    let env = Env::new();
    let primary = env.create(NewField::new("text", "Name").primary());
    env.insert(&primary, vec![text("yes"), text("no")]);

    let err = env
        .update(&primary, FieldUpdate::new().type_name("boolean"))
        .unwrap_err();
    assert!(matches!(err, GridbaseError::IncompatiblePrimaryFieldType(_)));

    let stored = FieldStore::get(&env.db, primary.id).unwrap();
    assert_eq!(stored.field_type, "text");
    assert_eq!(env.column_type(&primary.db_column()).as_deref(), Some("TEXT"));
    assert_eq!(env.cells(&primary), vec![text("yes"), text("no")]);
}

#[test]
fn test_primary_field_cannot_be_created_as_boolean() {
    let env = Env::new();
    let err = env
        .handler
        .create_field(
            &env.db,
            &env.user,
            &env.table,
            &NewField::new("boolean", "Done").primary(),
        )
        .unwrap_err();
    assert!(matches!(err, GridbaseError::IncompatiblePrimaryFieldType(_)));
}

#[test]
fn test_primary_field_can_change_to_eligible_type() {
    let env = Env::new();
    let primary = env.create(NewField::new("text", "Name").primary());
    let updated = env
        .update(&primary, FieldUpdate::new().type_name("long_text"))
        .unwrap();
    assert!(updated.primary);
    assert_eq!(updated.field_type, "long_text");
}

// ── Updating fields ─────────────────────────────────────────────────────

#[test]
fn test_rename_only_keeps_column_and_data() {
    let env = Env::new();
    let field = env.create(NewField::new("number", "Count"));
    env.insert(&field, vec![Value::Int(3), Value::Int(7)]);

    let updated = env.update(&field, FieldUpdate::new().name("Total")).unwrap();

    assert_eq!(updated.name, "Total");
    assert_eq!(updated.field_type, "number");
    assert_eq!(FieldStore::get(&env.db, field.id).unwrap().name, "Total");
    assert_eq!(env.column_type(&field.db_column()).as_deref(), Some("INTEGER"));
    assert_eq!(env.cells(&updated), vec![Value::Int(3), Value::Int(7)]);
}

#[test]
fn test_update_rejects_blank_name() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Title"));
    let err = env.update(&field, FieldUpdate::new().name("   ")).unwrap_err();
    assert!(matches!(err, GridbaseError::ValidationError(_)));
    assert_eq!(FieldStore::get(&env.db, field.id).unwrap().name, "Title");
}

#[test]
fn test_update_changes_attributes_and_column() {
    let env = Env::new();
    let field = env.create(
        NewField::new("number", "Price")
            .value("number_type", "DECIMAL")
            .value("number_decimal_places", 1),
    );
    env.insert(&field, vec![Value::Float(2.5)]);

    let updated = env
        .update(&field, FieldUpdate::new().value("number_decimal_places", 3))
        .unwrap();

    assert_eq!(updated.attribute_i64("number_decimal_places"), Some(3));
    assert_eq!(
        env.column_type(&field.db_column()).as_deref(),
        Some("DECIMAL(50,3)")
    );
    assert_eq!(env.cells(&updated), vec![Value::Float(2.5)]);
}

#[test]
fn test_type_change_drops_attributes_of_old_type() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Title").value("text_default", "x"));

    let updated = env
        .update(
            &field,
            FieldUpdate::new()
                .type_name("number")
                .value("number_negative", true),
        )
        .unwrap();

    assert!(updated.attribute("text_default").is_none());
    assert_eq!(updated.attribute_str("number_type"), Some("INTEGER"));
    assert!(updated.attribute_bool("number_negative"));
    assert_eq!(FieldStore::get(&env.db, field.id).unwrap(), updated);
}

// ── Hooks ───────────────────────────────────────────────────────────────

#[test]
fn test_hook_order() {
    let (env, calls) = recording_env();

    let field = env.create(NewField::new("recording", "Score"));
    assert_eq!(
        drain(&calls),
        ["prepare_values", "before_create", "after_create"]
    );

    let as_text = env.update(&field, FieldUpdate::new().type_name("text")).unwrap();
    assert_eq!(drain(&calls), ["before_schema_change"]);

    let back = env
        .update(&as_text, FieldUpdate::new().type_name("recording"))
        .unwrap();
    assert_eq!(
        drain(&calls),
        ["prepare_values", "before_update", "after_update:true"]
    );

    env.update(&back, FieldUpdate::new().name("Points")).unwrap();
    assert_eq!(
        drain(&calls),
        [
            "prepare_values",
            "before_update",
            "before_schema_change",
            "after_update:false"
        ]
    );

    let back = FieldStore::get(&env.db, back.id).unwrap();
    env.handler.delete_field(&env.db, &env.user, &back).unwrap();
    assert_eq!(drain(&calls), ["after_delete"]);
}

// ── Deleting fields ─────────────────────────────────────────────────────

#[test]
fn test_delete_field_removes_metadata_and_column() {
    let env = Env::new();
    let field = env.create(NewField::new("email", "Contact"));
    assert_eq!(
        env.column_type(&field.db_column()).as_deref(),
        Some("VARCHAR(254)")
    );

    env.handler.delete_field(&env.db, &env.user, &field).unwrap();

    assert!(matches!(
        FieldStore::get(&env.db, field.id),
        Err(GridbaseError::FieldDoesNotExist(_))
    ));
    assert_eq!(env.column_type(&field.db_column()), None);
}

// ── Access control ──────────────────────────────────────────────────────

#[test]
fn test_outsider_cannot_touch_fields() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Title"));
    let outsider = User::new(2, "mallory");

    let create = env.handler.create_field(
        &env.db,
        &outsider,
        &env.table,
        &NewField::new("text", "Sneaky"),
    );
    let update = env.handler.update_field(
        &env.db,
        &outsider,
        &field,
        &FieldUpdate::new().type_name("number"),
    );
    let delete = env.handler.delete_field(&env.db, &outsider, &field);
    let get = env.handler.get_field(&env.db, &outsider, field.id);

    for result in [create.map(|_| ()), update.map(|_| ()), delete, get.map(|_| ())] {
        assert!(matches!(
            result,
            Err(GridbaseError::UserNotInGroup { user_id: 2, .. })
        ));
    }
    let fields = FieldStore::for_table(&env.db, env.table.id).unwrap();
    assert_eq!(fields, vec![field]);
}

#[test]
fn test_removed_member_loses_access() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Title"));
    env.groups.remove_user(common::GROUP_ID, &env.user);

    let err = env.handler.get_field(&env.db, &env.user, field.id).unwrap_err();
    assert!(matches!(err, GridbaseError::UserNotInGroup { .. }));
}

#[test]
fn test_get_field() {
    let env = Env::new();
    let field = env.create(NewField::new("url", "Homepage"));

    assert_eq!(env.handler.get_field(&env.db, &env.user, field.id).unwrap(), field);
    assert!(matches!(
        env.handler.get_field(&env.db, &env.user, 999),
        Err(GridbaseError::FieldDoesNotExist(_))
    ));
}
