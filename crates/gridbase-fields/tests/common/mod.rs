//! Shared fixtures for the field engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use gridbase_core::GridbaseResult;
use gridbase_db::{DbExecutor, SqliteSchemaEditor, Value};
use gridbase_db_backends::SqliteBackend;
use gridbase_fields::{
    install, ConverterRegistry, Field, FieldHandler, FieldTypeRegistry, FieldUpdate, NewField,
    PhysicalModel, StaticGroups, Table, TableStore, User, ViewHandler,
};

pub const GROUP_ID: i64 = 10;

/// An in-memory database with one table and a member of its group.
pub struct Env {
    pub db: SqliteBackend,
    pub registry: Arc<FieldTypeRegistry>,
    pub groups: Arc<StaticGroups>,
    pub views: Arc<ViewHandler>,
    pub handler: FieldHandler,
    pub user: User,
    pub table: Table,
}

impl Env {
    pub fn new() -> Self {
        Self::with_registries(
            FieldTypeRegistry::with_builtin_types(),
            ConverterRegistry::with_builtin_converters(),
        )
    }

    pub fn with_registries(registry: FieldTypeRegistry, converters: ConverterRegistry) -> Self {
        let db = SqliteBackend::memory().unwrap();
        install(&db).unwrap();

        let registry = Arc::new(registry);
        let groups = Arc::new(StaticGroups::new());
        let user = User::new(1, "alice");
        groups.add_user(GROUP_ID, &user);
        let views = Arc::new(ViewHandler::new(Arc::clone(&registry)));
        let handler = FieldHandler::new(
            Arc::clone(&registry),
            Arc::new(converters),
            groups.clone(),
            views.clone(),
        );
        let table = TableStore::create(&db, &SqliteSchemaEditor, "Projects", GROUP_ID).unwrap();

        Self {
            db,
            registry,
            groups,
            views,
            handler,
            user,
            table,
        }
    }

    pub fn create(&self, new_field: NewField) -> Field {
        self.handler
            .create_field(&self.db, &self.user, &self.table, &new_field)
            .unwrap()
    }

    pub fn update(&self, field: &Field, update: FieldUpdate) -> GridbaseResult<Field> {
        self.handler
            .update_field(&self.db, &self.user, field, &update)
    }

    pub fn model(&self, field: &Field) -> PhysicalModel {
        self.table
            .get_model(std::slice::from_ref(field), &self.registry)
            .unwrap()
    }

    /// Inserts one row per value and returns the row ids.
    pub fn insert(&self, field: &Field, values: Vec<Value>) -> Vec<i64> {
        let model = self.model(field);
        values
            .into_iter()
            .map(|value| model.insert_row(&self.db, &[(field, value)]).unwrap())
            .collect()
    }

    /// The cells of `field` in row order.
    pub fn cells(&self, field: &Field) -> Vec<Value> {
        self.model(field)
            .column_values(&self.db, field)
            .unwrap()
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// The declared backend type of `column`, `None` if it does not exist.
    pub fn column_type(&self, column: &str) -> Option<String> {
        column_type(&self.db, &self.table.db_table(), column)
    }
}

pub fn column_type(db: &dyn DbExecutor, table: &str, column: &str) -> Option<String> {
    db.query(
        "SELECT type FROM pragma_table_info(?) WHERE name = ?",
        &[Value::from(table), Value::from(column)],
    )
    .unwrap()
    .into_iter()
    .next()
    .map(|row| row.get::<String>("type").unwrap())
}

pub fn text(s: &str) -> Value {
    Value::from(s)
}
