//! Integration tests for view filters and sorts that depend on fields.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{CastTarget, ColumnDef, ColumnType, DbExecutor};
use gridbase_fields::views::SortOrder;
use gridbase_fields::{
    ConverterRegistry, Field, FieldDependents, FieldHandler, FieldType, FieldTypeRegistry,
    FieldUpdate, NewField, ViewHandler,
};

use common::Env;

const VIEW_ID: i64 = 7;

// ── Test doubles ────────────────────────────────────────────────────────

/// A type that views cannot sort on.
struct AttachmentFieldType;

impl FieldType for AttachmentFieldType {
    fn type_name(&self) -> &'static str {
        "attachment"
    }

    fn can_order_by(&self) -> bool {
        false
    }

    fn column_def(&self, field: &Field) -> ColumnDef {
        ColumnDef::new(field.db_column(), ColumnType::Text)
    }

    fn cast_target(&self, _field: &Field) -> CastTarget {
        CastTarget::Text
    }
}

/// Forwards to a `ViewHandler` and counts the notifications.
struct CountingDependents {
    views: Arc<ViewHandler>,
    type_changes: AtomicUsize,
    deletions: AtomicUsize,
}

impl FieldDependents for CountingDependents {
    fn field_type_changed(&self, db: &dyn DbExecutor, field: &Field) -> GridbaseResult<()> {
        self.type_changes.fetch_add(1, Ordering::SeqCst);
        self.views.field_type_changed(db, field)
    }

    fn field_deleted(&self, db: &dyn DbExecutor, field: &Field) -> GridbaseResult<()> {
        self.deletions.fetch_add(1, Ordering::SeqCst);
        self.views.field_deleted(db, field)
    }
}

fn filter_types(env: &Env, field: &Field) -> Vec<String> {
    env.views
        .filters_for_field(&env.db, field.id)
        .unwrap()
        .into_iter()
        .map(|f| f.filter_type)
        .collect()
}

// ── Filters ─────────────────────────────────────────────────────────────

#[test]
fn test_incompatible_filters_removed_on_type_change() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Notes"));
    for (filter_type, value) in [("contains", "abc"), ("equal", "10"), ("empty", "")] {
        env.views
            .create_filter(&env.db, VIEW_ID, &field, filter_type, value)
            .unwrap();
    }

    let updated = env.update(&field, FieldUpdate::new().type_name("number")).unwrap();
    assert_eq!(filter_types(&env, &updated), ["equal", "empty"]);

    let updated = env.update(&updated, FieldUpdate::new().name("Amount")).unwrap();
    assert_eq!(filter_types(&env, &updated), ["equal", "empty"]);

    env.update(&updated, FieldUpdate::new().type_name("boolean"))
        .unwrap();
    assert_eq!(filter_types(&env, &updated), ["empty"]);
}

#[test]
fn test_type_change_notifies_dependents_once() {
    let env = Env::new();
    let dependents = Arc::new(CountingDependents {
        views: Arc::clone(&env.views),
        type_changes: AtomicUsize::new(0),
        deletions: AtomicUsize::new(0),
    });
    let handler = FieldHandler::new(
        Arc::clone(&env.registry),
        Arc::new(ConverterRegistry::with_builtin_converters()),
        env.groups.clone(),
        dependents.clone(),
    );

    let field = handler
        .create_field(&env.db, &env.user, &env.table, &NewField::new("text", "Notes"))
        .unwrap();
    let field = handler
        .update_field(&env.db, &env.user, &field, &FieldUpdate::new().name("Body"))
        .unwrap();
    assert_eq!(dependents.type_changes.load(Ordering::SeqCst), 0);

    let field = handler
        .update_field(
            &env.db,
            &env.user,
            &field,
            &FieldUpdate::new().type_name("number"),
        )
        .unwrap();
    assert_eq!(dependents.type_changes.load(Ordering::SeqCst), 1);

    handler.delete_field(&env.db, &env.user, &field).unwrap();
    assert_eq!(dependents.deletions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_incompatible_filter_cannot_be_created() {
    let env = Env::new();
    let field = env.create(NewField::new("boolean", "Done"));

    let err = env
        .views
        .create_filter(&env.db, VIEW_ID, &field, "contains", "x")
        .unwrap_err();
    match err {
        GridbaseError::ValidationError(e) => assert!(e.has_error_for("type")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(env.views.filters_for_field(&env.db, field.id).unwrap().is_empty());
}

#[test]
fn test_delete_field_removes_filters_and_sorts() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Notes"));
    let other = env.create(NewField::new("text", "Other"));
    env.views
        .create_filter(&env.db, VIEW_ID, &field, "contains", "a")
        .unwrap();
    env.views
        .create_filter(&env.db, VIEW_ID, &other, "contains", "b")
        .unwrap();
    env.views
        .create_sort(&env.db, VIEW_ID, &field, SortOrder::Descending)
        .unwrap();

    env.handler.delete_field(&env.db, &env.user, &field).unwrap();

    assert!(env.views.filters_for_field(&env.db, field.id).unwrap().is_empty());
    assert!(env.views.sorts_for_field(&env.db, field.id).unwrap().is_empty());
    assert_eq!(filter_types(&env, &other), ["contains"]);
}

// ── Sorts ───────────────────────────────────────────────────────────────

fn attachment_env() -> Env {
    let mut registry = FieldTypeRegistry::with_builtin_types();
    registry.register(AttachmentFieldType);
    Env::with_registries(registry, ConverterRegistry::with_builtin_converters())
}

#[test]
fn test_sorts_removed_when_type_cannot_be_ordered() {
    let env = attachment_env();
    let field = env.create(NewField::new("text", "Files"));
    let sort = env
        .views
        .create_sort(&env.db, VIEW_ID, &field, SortOrder::Ascending)
        .unwrap();
    assert_eq!(sort.order, SortOrder::Ascending);

    let updated = env
        .update(&field, FieldUpdate::new().type_name("attachment"))
        .unwrap();
    assert!(env.views.sorts_for_field(&env.db, updated.id).unwrap().is_empty());

    let err = env
        .views
        .create_sort(&env.db, VIEW_ID, &updated, SortOrder::Ascending)
        .unwrap_err();
    assert!(matches!(err, GridbaseError::ValidationError(_)));
}

#[test]
fn test_sorts_kept_when_type_can_be_ordered() {
    let env = Env::new();
    let field = env.create(NewField::new("text", "Rank"));
    env.views
        .create_sort(&env.db, VIEW_ID, &field, SortOrder::Descending)
        .unwrap();

    let updated = env.update(&field, FieldUpdate::new().type_name("number")).unwrap();
    let sorts = env.views.sorts_for_field(&env.db, updated.id).unwrap();
    assert_eq!(sorts.len(), 1);
    assert_eq!(sorts[0].order, SortOrder::Descending);
    assert_eq!(sorts[0].view_id, VIEW_ID);
}
