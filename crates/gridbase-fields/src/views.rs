//! View filters and sorts that depend on fields.
//!
//! Filters and sorts reference a field by id. When the field changes type, a
//! filter whose operator makes no sense for the new type, or a sort on a type
//! that cannot be ordered, would be left dangling. The field handler reports
//! type changes and deletions through [`FieldDependents`], and
//! [`ViewHandler`] removes what no longer fits.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use gridbase_core::{GridbaseError, GridbaseResult, ValidationError};
use gridbase_db::{DbExecutor, Row, Value};
use serde::{Deserialize, Serialize};

use crate::models::Field;
use crate::registry::FieldTypeRegistry;

/// Owner of artifacts that reference fields.
pub trait FieldDependents: Send + Sync {
    /// Called after `field` was reclassified to a new type and before its
    /// column is altered.
    fn field_type_changed(&self, _db: &dyn DbExecutor, _field: &Field) -> GridbaseResult<()> {
        Ok(())
    }

    /// Called before `field` and its column are deleted.
    fn field_deleted(&self, _db: &dyn DbExecutor, _field: &Field) -> GridbaseResult<()> {
        Ok(())
    }
}

/// Dependents for applications without views.
pub struct NoDependents;

impl FieldDependents for NoDependents {}

// ── Filter types ────────────────────────────────────────────────────────

/// A filter operator and the field types it works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFilterType {
    name: &'static str,
    compatible_field_types: &'static [&'static str],
}

impl ViewFilterType {
    /// Creates a filter type.
    pub const fn new(name: &'static str, compatible_field_types: &'static [&'static str]) -> Self {
        Self {
            name,
            compatible_field_types,
        }
    }

    /// The operator name, e.g. `"contains"`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the operator can filter fields of `field_type`.
    pub fn is_compatible(&self, field_type: &str) -> bool {
        self.compatible_field_types.contains(&field_type)
    }
}

const TEXTUAL: &[&str] = &["text", "long_text", "url", "email"];
const COMPARABLE: &[&str] = &["text", "long_text", "url", "email", "number"];
const ALL_BUILTIN: &[&str] = &[
    "text",
    "long_text",
    "url",
    "email",
    "number",
    "boolean",
    "date",
    "single_select",
];

const BUILTIN_FILTER_TYPES: &[ViewFilterType] = &[
    ViewFilterType::new("equal", COMPARABLE),
    ViewFilterType::new("not_equal", COMPARABLE),
    ViewFilterType::new("contains", TEXTUAL),
    ViewFilterType::new("contains_not", TEXTUAL),
    ViewFilterType::new("higher_than", &["number"]),
    ViewFilterType::new("lower_than", &["number"]),
    ViewFilterType::new("date_equal", &["date"]),
    ViewFilterType::new("date_not_equal", &["date"]),
    ViewFilterType::new("boolean", &["boolean"]),
    ViewFilterType::new("single_select_equal", &["single_select"]),
    ViewFilterType::new("single_select_not_equal", &["single_select"]),
    ViewFilterType::new("empty", ALL_BUILTIN),
    ViewFilterType::new("not_empty", ALL_BUILTIN),
];

/// Catalog of filter types keyed by name.
pub struct ViewFilterTypeRegistry {
    types: HashMap<&'static str, ViewFilterType>,
}

impl Default for ViewFilterTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewFilterTypeRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in filter types.
    pub fn with_builtin_filter_types() -> Self {
        let mut registry = Self::new();
        for filter_type in BUILTIN_FILTER_TYPES {
            registry.register(filter_type.clone());
        }
        registry
    }

    /// Registers a filter type, replacing any type with the same name.
    pub fn register(&mut self, filter_type: ViewFilterType) {
        self.types.insert(filter_type.name, filter_type);
    }

    /// Returns the filter type called `name`.
    pub fn get(&self, name: &str) -> Option<&ViewFilterType> {
        self.types.get(name)
    }

    /// Returns all registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ── Filters and sorts ───────────────────────────────────────────────────

/// A filter of a view on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    /// The filter id.
    pub id: i64,
    /// The view the filter belongs to.
    pub view_id: i64,
    /// The filtered field.
    pub field_id: i64,
    /// The filter type name.
    pub filter_type: String,
    /// The value compared against.
    pub value: String,
}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ASC"),
            Self::Descending => write!(f, "DESC"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = GridbaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(Self::Ascending),
            "DESC" => Ok(Self::Descending),
            other => Err(GridbaseError::DatabaseError(format!(
                "Invalid sort order '{other}'"
            ))),
        }
    }
}

/// A sort of a view on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSort {
    /// The sort id.
    pub id: i64,
    /// The view the sort belongs to.
    pub view_id: i64,
    /// The sorted field.
    pub field_id: i64,
    /// The direction.
    pub order: SortOrder,
}

fn filter_from_row(row: &Row) -> GridbaseResult<ViewFilter> {
    Ok(ViewFilter {
        id: row.get("id")?,
        view_id: row.get("view_id")?,
        field_id: row.get("field_id")?,
        filter_type: row.get("type")?,
        value: row.get("value")?,
    })
}

fn sort_from_row(row: &Row) -> GridbaseResult<ViewSort> {
    Ok(ViewSort {
        id: row.get("id")?,
        view_id: row.get("view_id")?,
        field_id: row.get("field_id")?,
        order: row.get::<String>("order")?.parse()?,
    })
}

/// Maintains filters and sorts, and repairs them when fields change.
pub struct ViewHandler {
    filter_types: ViewFilterTypeRegistry,
    field_types: Arc<FieldTypeRegistry>,
}

impl ViewHandler {
    /// Creates a handler with the built-in filter types.
    pub fn new(field_types: Arc<FieldTypeRegistry>) -> Self {
        Self::with_filter_types(field_types, ViewFilterTypeRegistry::with_builtin_filter_types())
    }

    /// Creates a handler with custom filter types.
    pub fn with_filter_types(
        field_types: Arc<FieldTypeRegistry>,
        filter_types: ViewFilterTypeRegistry,
    ) -> Self {
        Self {
            filter_types,
            field_types,
        }
    }

    /// The registered filter types.
    pub fn filter_types(&self) -> &ViewFilterTypeRegistry {
        &self.filter_types
    }

    fn accepts(&self, filter_type: &str, field: &Field) -> bool {
        self.filter_types
            .get(filter_type)
            .is_some_and(|t| t.is_compatible(&field.field_type))
    }

    /// Adds a filter on `field` to a view.
    pub fn create_filter(
        &self,
        db: &dyn DbExecutor,
        view_id: i64,
        field: &Field,
        filter_type: &str,
        value: &str,
    ) -> GridbaseResult<ViewFilter> {
        if !self.accepts(filter_type, field) {
            return Err(ValidationError::for_attribute(
                "type",
                format!(
                    "The filter type '{filter_type}' is not compatible with the field type '{}'.",
                    field.field_type
                ),
                "not_allowed",
            )
            .into());
        }
        let id = db.insert_returning_id(
            "INSERT INTO \"database_viewfilter\" (\"view_id\", \"field_id\", \"type\", \"value\") \
             VALUES (?, ?, ?, ?)",
            &[
                Value::Int(view_id),
                Value::Int(field.id),
                Value::from(filter_type),
                Value::from(value),
            ],
        )?;
        Ok(ViewFilter {
            id,
            view_id,
            field_id: field.id,
            filter_type: filter_type.to_string(),
            value: value.to_string(),
        })
    }

    /// Adds a sort on `field` to a view.
    pub fn create_sort(
        &self,
        db: &dyn DbExecutor,
        view_id: i64,
        field: &Field,
        order: SortOrder,
    ) -> GridbaseResult<ViewSort> {
        if !self.field_types.get_for_field(field)?.can_order_by() {
            return Err(ValidationError::for_attribute(
                "field",
                format!("Fields of type '{}' cannot be sorted.", field.field_type),
                "not_allowed",
            )
            .into());
        }
        let id = db.insert_returning_id(
            "INSERT INTO \"database_viewsort\" (\"view_id\", \"field_id\", \"order\") VALUES (?, ?, ?)",
            &[
                Value::Int(view_id),
                Value::Int(field.id),
                Value::String(order.to_string()),
            ],
        )?;
        Ok(ViewSort {
            id,
            view_id,
            field_id: field.id,
            order,
        })
    }

    /// Returns the filters on `field_id`.
    pub fn filters_for_field(
        &self,
        db: &dyn DbExecutor,
        field_id: i64,
    ) -> GridbaseResult<Vec<ViewFilter>> {
        db.query(
            "SELECT \"id\", \"view_id\", \"field_id\", \"type\", \"value\" \
             FROM \"database_viewfilter\" WHERE \"field_id\" = ? ORDER BY \"id\"",
            &[Value::Int(field_id)],
        )?
        .iter()
        .map(filter_from_row)
        .collect()
    }

    /// Returns the sorts on `field_id`.
    pub fn sorts_for_field(&self, db: &dyn DbExecutor, field_id: i64) -> GridbaseResult<Vec<ViewSort>> {
        db.query(
            "SELECT \"id\", \"view_id\", \"field_id\", \"order\" \
             FROM \"database_viewsort\" WHERE \"field_id\" = ? ORDER BY \"id\"",
            &[Value::Int(field_id)],
        )?
        .iter()
        .map(sort_from_row)
        .collect()
    }
}

impl FieldDependents for ViewHandler {
    fn field_type_changed(&self, db: &dyn DbExecutor, field: &Field) -> GridbaseResult<()> {
        let mut removed_filters = 0;
        for filter in self.filters_for_field(db, field.id)? {
            if !self.accepts(&filter.filter_type, field) {
                removed_filters += db.execute_sql(
                    "DELETE FROM \"database_viewfilter\" WHERE \"id\" = ?",
                    &[Value::Int(filter.id)],
                )?;
            }
        }

        let removed_sorts = if self.field_types.get_for_field(field)?.can_order_by() {
            0
        } else {
            db.execute_sql(
                "DELETE FROM \"database_viewsort\" WHERE \"field_id\" = ?",
                &[Value::Int(field.id)],
            )?
        };

        tracing::info!(
            field_id = field.id,
            field_type = %field.field_type,
            removed_filters,
            removed_sorts,
            "repaired view filters and sorts"
        );
        Ok(())
    }

    fn field_deleted(&self, db: &dyn DbExecutor, field: &Field) -> GridbaseResult<()> {
        let params = [Value::Int(field.id)];
        let removed_filters = db.execute_sql(
            "DELETE FROM \"database_viewfilter\" WHERE \"field_id\" = ?",
            &params,
        )?;
        let removed_sorts = db.execute_sql(
            "DELETE FROM \"database_viewsort\" WHERE \"field_id\" = ?",
            &params,
        )?;
        tracing::info!(
            field_id = field.id,
            removed_filters,
            removed_sorts,
            "removed view filters and sorts of deleted field"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_filter_types() {
        let registry = ViewFilterTypeRegistry::with_builtin_filter_types();
        assert_eq!(registry.names().len(), 13);

        let contains = registry.get("contains").unwrap();
        assert_eq!(contains.name(), "contains");
        assert!(contains.is_compatible("text"));
        assert!(contains.is_compatible("email"));
        assert!(!contains.is_compatible("number"));

        let higher = registry.get("higher_than").unwrap();
        assert!(higher.is_compatible("number"));
        assert!(!higher.is_compatible("text"));

        assert!(registry.get("empty").unwrap().is_compatible("boolean"));
        assert!(registry.get("regex").is_none());
    }

    #[test]
    fn test_custom_filter_type() {
        let mut registry = ViewFilterTypeRegistry::default();
        registry.register(ViewFilterType::new("starts_with", &["text"]));
        assert_eq!(registry.names(), vec!["starts_with"]);
    }

    #[test]
    fn test_sort_order_text() {
        assert_eq!(SortOrder::Descending.to_string(), "DESC");
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert!("UP".parse::<SortOrder>().is_err());
    }
}
