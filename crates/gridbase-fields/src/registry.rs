//! Field type descriptors and their registry.
//!
//! A [`FieldType`] describes one kind of field: which attributes it accepts,
//! how its physical column looks, how values are cast into it, and a fixed set
//! of lifecycle hooks. Every hook has a no-op default so a type only
//! implements the ones it needs. The [`FieldHandler`](crate::handler::FieldHandler)
//! is the only caller of the hooks and invokes them in a fixed order:
//!
//! | operation | hooks |
//! |---|---|
//! | create | `prepare_values`, `before_create`, `after_create` |
//! | update | `prepare_values`, `before_update`, `before_schema_change` (old type), `after_update` (new type) |
//! | delete | `after_delete` |
//!
//! The [`FieldTypeRegistry`] is filled once at start-up and then shared
//! read-only.

use std::collections::HashMap;

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{CastTarget, ColumnDef, DbExecutor};

use crate::auth::User;
use crate::field_types;
use crate::models::{Attributes, Field, PhysicalModel, Table};

/// Everything a hook or converter needs to know about a field update.
///
/// `old_*` describe the field as it was before the update, `new_*` as it is
/// after the metadata has been saved.
#[derive(Debug, Clone, Copy)]
pub struct FieldChange<'a> {
    /// Snapshot of the field before the update.
    pub old_field: &'a Field,
    /// The field after the update.
    pub new_field: &'a Field,
    /// Physical model containing the old column.
    pub old_model: &'a PhysicalModel,
    /// Physical model containing the new column.
    pub new_model: &'a PhysicalModel,
    /// The old column definition.
    pub old_column: &'a ColumnDef,
    /// The new column definition.
    pub new_column: &'a ColumnDef,
    /// Cast applied to values of the old type.
    pub old_target: CastTarget,
    /// Cast applied to values converted into the new type.
    pub new_target: CastTarget,
}

impl FieldChange<'_> {
    /// Returns `true` if the update changed the field type.
    pub fn type_changed(&self) -> bool {
        self.old_field.field_type != self.new_field.field_type
    }
}

/// Behaviour and metadata of a field type.
pub trait FieldType: Send + Sync {
    /// The unique type name, e.g. `"number"`.
    fn type_name(&self) -> &'static str;

    /// Attributes that may be set on fields of this type, besides `name`.
    fn allowed_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Attribute values used when a field becomes this type.
    fn default_attributes(&self) -> Attributes {
        Attributes::new()
    }

    /// Whether a primary field may have this type.
    fn can_be_primary_field(&self) -> bool {
        true
    }

    /// Whether views may sort on fields of this type.
    fn can_order_by(&self) -> bool {
        true
    }

    /// The physical column for `field`.
    fn column_def(&self, field: &Field) -> ColumnDef;

    /// How foreign values are cast into this type.
    fn cast_target(&self, field: &Field) -> CastTarget;

    /// Validates and normalizes attribute values before they are stored.
    fn prepare_values(&self, values: Attributes, _user: &User) -> GridbaseResult<Attributes> {
        Ok(values)
    }

    /// Called before a field of this type is created.
    fn before_create(
        &self,
        _table: &Table,
        _primary: bool,
        _values: &mut Attributes,
        _order: i64,
        _user: &User,
    ) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called after a field of this type and its column have been created.
    fn after_create(
        &self,
        _field: &Field,
        _model: &PhysicalModel,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called with the new attribute values before they are applied.
    fn before_update(
        &self,
        _old_field: &Field,
        _values: &mut Attributes,
        _user: &User,
    ) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called on the old type after the metadata is saved and before the
    /// column is altered.
    fn before_schema_change(
        &self,
        _change: &FieldChange<'_>,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called on the new type after the column has been altered.
    fn after_update(
        &self,
        _change: &FieldChange<'_>,
        _user: &User,
        _db: &dyn DbExecutor,
        _altered_column: bool,
    ) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called after a field of this type and its column have been deleted.
    fn after_delete(
        &self,
        _field: &Field,
        _model: &PhysicalModel,
        _user: &User,
        _db: &dyn DbExecutor,
    ) -> GridbaseResult<()> {
        Ok(())
    }
}

/// Catalog of field types keyed by type name.
///
/// # Examples
///
/// ```
/// use gridbase_fields::registry::FieldTypeRegistry;
///
/// let registry = FieldTypeRegistry::with_builtin_types();
/// assert!(registry.get("number").is_ok());
/// assert!(registry.get("formula").is_err());
/// ```
pub struct FieldTypeRegistry {
    types: HashMap<String, Box<dyn FieldType>>,
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTypeRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Creates a registry holding every built-in field type.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(field_types::TextFieldType);
        registry.register(field_types::LongTextFieldType);
        registry.register(field_types::UrlFieldType);
        registry.register(field_types::EmailFieldType);
        registry.register(field_types::NumberFieldType);
        registry.register(field_types::BooleanFieldType);
        registry.register(field_types::DateFieldType);
        registry.register(field_types::SingleSelectFieldType);
        registry
    }

    /// Registers a field type, replacing any type with the same name.
    pub fn register(&mut self, field_type: impl FieldType + 'static) {
        self.types
            .insert(field_type.type_name().to_string(), Box::new(field_type));
    }

    /// Returns the type registered under `name`.
    pub fn get(&self, name: &str) -> GridbaseResult<&dyn FieldType> {
        self.types
            .get(name)
            .map(|field_type| &**field_type)
            .ok_or_else(|| GridbaseError::UnknownFieldType(name.to_string()))
    }

    /// Returns the type of `field`.
    pub fn get_for_field(&self, field: &Field) -> GridbaseResult<&dyn FieldType> {
        self.get(&field.field_type)
    }

    /// Returns `true` if a type is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns all registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
