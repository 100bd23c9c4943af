//! Data-aware field converters.
//!
//! A [`FieldConverter`] handles type changes a plain cast gets wrong, such as
//! turning option ids into their text or formatted dates into dates. The
//! [`ConverterRegistry`] is scanned in registration order and the first
//! converter accepting the old and new field wins. When none applies the
//! [`LenientAlteration`](crate::lenient::LenientAlteration) fallback is used.
//!
//! The built-in converters compute every new cell in Rust and write it through
//! the shadow column protocol of [`SchemaEditor`], so the column is either
//! fully converted or, when any statement fails, left untouched by the
//! enclosing transaction.

use gridbase_core::GridbaseResult;
use gridbase_db::cast::CastTarget;
use gridbase_db::{DbExecutor, SchemaEditor, Value};

use crate::auth::User;
use crate::field_types::{select_options, DateFieldType, SelectOption};
use crate::models::{Field, PhysicalModel};
use crate::registry::FieldChange;

/// A specialized strategy for changing a column from one type to another.
pub trait FieldConverter: Send + Sync {
    /// A short name used in log output.
    fn name(&self) -> &'static str;

    /// Returns `true` if this converter handles changing `old_field` into
    /// `new_field`. `old_model` gives access to the existing data.
    fn is_applicable(&self, old_model: &PhysicalModel, old_field: &Field, new_field: &Field)
        -> bool;

    /// Alters the column, converting every cell.
    ///
    /// Runs inside the caller's transaction on the caller's executor.
    fn alter_field(
        &self,
        change: &FieldChange<'_>,
        user: &User,
        db: &dyn DbExecutor,
        editor: &dyn SchemaEditor,
    ) -> GridbaseResult<()>;
}

/// Ordered collection of converters.
pub struct ConverterRegistry {
    converters: Vec<Box<dyn FieldConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Creates a registry holding the built-in converters.
    pub fn with_builtin_converters() -> Self {
        let mut registry = Self::new();
        registry.register(SingleSelectConverter);
        registry.register(BooleanTextConverter);
        registry.register(DateTextConverter);
        registry
    }

    /// Appends a converter. Earlier registrations take precedence.
    pub fn register(&mut self, converter: impl FieldConverter + 'static) {
        self.converters.push(Box::new(converter));
    }

    /// Returns the first converter applicable to the change, if any.
    pub fn find_applicable(
        &self,
        old_model: &PhysicalModel,
        old_field: &Field,
        new_field: &Field,
    ) -> Option<&dyn FieldConverter> {
        self.converters
            .iter()
            .find(|converter| converter.is_applicable(old_model, old_field, new_field))
            .map(|converter| &**converter)
    }

    /// Returns the converter names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.name()).collect()
    }
}

/// Rewrites the column of `change` with `convert` applied to every old cell.
pub fn rewrite_column(
    change: &FieldChange<'_>,
    db: &dyn DbExecutor,
    editor: &dyn SchemaEditor,
    convert: impl Fn(&Value) -> Value,
) -> GridbaseResult<()> {
    let table = change.new_model.db_table();
    let column = &change.new_column.column;

    let cells = change.old_model.column_values(db, change.old_field)?;
    db.execute_batch(&editor.add_shadow_column(table, change.new_column))?;
    let update = editor.update_shadow_value(table, column);
    for (row_id, cell) in &cells {
        db.execute_sql(&update, &[convert(cell), Value::Int(*row_id)])?;
    }
    db.execute_batch(&editor.swap_shadow_column(table, column))?;

    tracing::debug!(
        field_id = change.new_field.id,
        rows = cells.len(),
        "rewrote column"
    );
    Ok(())
}

fn is_text_type(field: &Field) -> bool {
    matches!(field.field_type.as_str(), "text" | "long_text")
}

// ── Single select ───────────────────────────────────────────────────────

/// Converts to and from `single_select` by matching option text.
///
/// Text is matched against option values ignoring case and surrounding
/// whitespace; cells without a match become empty.
pub struct SingleSelectConverter;

fn option_matching<'a>(options: &'a [SelectOption], text: &str) -> Option<&'a SelectOption> {
    let needle = text.trim().to_lowercase();
    options
        .iter()
        .find(|option| option.value.trim().to_lowercase() == needle)
}

impl FieldConverter for SingleSelectConverter {
    fn name(&self) -> &'static str {
        "single_select"
    }

    fn is_applicable(
        &self,
        _old_model: &PhysicalModel,
        old_field: &Field,
        new_field: &Field,
    ) -> bool {
        (old_field.field_type == "single_select") != (new_field.field_type == "single_select")
    }

    fn alter_field(
        &self,
        change: &FieldChange<'_>,
        _user: &User,
        db: &dyn DbExecutor,
        editor: &dyn SchemaEditor,
    ) -> GridbaseResult<()> {
        let from_select = change.old_field.field_type == "single_select";
        let old_options = select_options(change.old_field);
        let new_options = select_options(change.new_field);
        let target = change.new_target;

        rewrite_column(change, db, editor, |cell| {
            let text = if from_select {
                cell.as_int()
                    .and_then(|id| old_options.iter().find(|o| o.id == id))
                    .map(|o| o.value.clone())
            } else {
                cell.to_text()
            };
            match text {
                None => target.empty_value(),
                Some(text) if from_select => target.try_cast(&Value::String(text)),
                Some(text) => {
                    option_matching(&new_options, &text).map_or(Value::Null, |o| Value::Int(o.id))
                }
            }
        })
    }
}

// ── Boolean ↔ text ──────────────────────────────────────────────────────

/// Converts between `boolean` and the text types.
///
/// Booleans become `"true"` or `"false"`; text becomes `true` when it reads
/// as a truthy word (`yes`, `1`, `checked`, ...).
pub struct BooleanTextConverter;

impl FieldConverter for BooleanTextConverter {
    fn name(&self) -> &'static str {
        "boolean_text"
    }

    fn is_applicable(
        &self,
        _old_model: &PhysicalModel,
        old_field: &Field,
        new_field: &Field,
    ) -> bool {
        (old_field.field_type == "boolean" && is_text_type(new_field))
            || (is_text_type(old_field) && new_field.field_type == "boolean")
    }

    fn alter_field(
        &self,
        change: &FieldChange<'_>,
        _user: &User,
        db: &dyn DbExecutor,
        editor: &dyn SchemaEditor,
    ) -> GridbaseResult<()> {
        if change.old_field.field_type == "boolean" {
            rewrite_column(change, db, editor, |cell| {
                let checked = CastTarget::Boolean.try_cast(cell) == Value::Bool(true);
                Value::from(if checked { "true" } else { "false" })
            })
        } else {
            rewrite_column(change, db, editor, |cell| CastTarget::Boolean.try_cast(cell))
        }
    }
}

// ── Date ↔ text ─────────────────────────────────────────────────────────

/// Converts between `date` and the text types using the date field's
/// display format.
pub struct DateTextConverter;

impl FieldConverter for DateTextConverter {
    fn name(&self) -> &'static str {
        "date_text"
    }

    fn is_applicable(
        &self,
        _old_model: &PhysicalModel,
        old_field: &Field,
        new_field: &Field,
    ) -> bool {
        (old_field.field_type == "date" && is_text_type(new_field))
            || (is_text_type(old_field) && new_field.field_type == "date")
    }

    fn alter_field(
        &self,
        change: &FieldChange<'_>,
        _user: &User,
        db: &dyn DbExecutor,
        editor: &dyn SchemaEditor,
    ) -> GridbaseResult<()> {
        if change.old_field.field_type == "date" {
            let old_field = change.old_field;
            rewrite_column(change, db, editor, |cell| {
                DateFieldType::format_cell(old_field, cell).map_or(Value::Null, Value::String)
            })
        } else {
            let new_field = change.new_field;
            rewrite_column(change, db, editor, |cell| {
                cell.as_str()
                    .map_or(Value::Null, |text| DateFieldType::parse_cell(new_field, text))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, Table};
    use crate::registry::FieldTypeRegistry;

    fn field(id: i64, field_type: &str) -> Field {
        Field {
            id,
            table_id: 1,
            name: "F".into(),
            order: 1,
            primary: false,
            field_type: field_type.into(),
            attributes: Attributes::new(),
        }
    }

    fn model(fields: &[Field]) -> PhysicalModel {
        let table = Table {
            id: 1,
            name: "T".into(),
            group_id: 1,
        };
        table
            .get_model(fields, &FieldTypeRegistry::with_builtin_types())
            .unwrap()
    }

    fn find(old_type: &str, new_type: &str) -> Option<&'static str> {
        let registry = ConverterRegistry::with_builtin_converters();
        let old = field(1, old_type);
        registry
            .find_applicable(&model(&[old.clone()]), &old, &field(1, new_type))
            .map(FieldConverter::name)
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            ConverterRegistry::with_builtin_converters().names(),
            vec!["single_select", "boolean_text", "date_text"]
        );
    }

    #[test]
    fn test_applicability() {
        assert_eq!(find("text", "single_select"), Some("single_select"));
        assert_eq!(find("single_select", "number"), Some("single_select"));
        assert_eq!(find("single_select", "single_select"), None);
        assert_eq!(find("boolean", "long_text"), Some("boolean_text"));
        assert_eq!(find("text", "boolean"), Some("boolean_text"));
        assert_eq!(find("date", "text"), Some("date_text"));
        assert_eq!(find("long_text", "date"), Some("date_text"));
        assert_eq!(find("text", "number"), None);
        assert_eq!(find("boolean", "number"), None);
    }

    struct Never;

    impl FieldConverter for Never {
        fn name(&self) -> &'static str {
            "never"
        }

        fn is_applicable(&self, _: &PhysicalModel, _: &Field, _: &Field) -> bool {
            false
        }

        fn alter_field(
            &self,
            _: &FieldChange<'_>,
            _: &User,
            _: &dyn DbExecutor,
            _: &dyn SchemaEditor,
        ) -> GridbaseResult<()> {
            unreachable!("never applicable")
        }
    }

    #[test]
    fn test_first_applicable_wins() {
        let mut registry = ConverterRegistry::default();
        registry.register(Never);
        registry.register(DateTextConverter);
        registry.register(BooleanTextConverter);
        let old = field(1, "date");
        let found = registry
            .find_applicable(&model(&[old.clone()]), &old, &field(1, "text"))
            .map(FieldConverter::name);
        assert_eq!(found, Some("date_text"));
    }

    #[test]
    fn test_option_matching() {
        let options = vec![
            SelectOption {
                id: 1,
                value: "In Progress".into(),
                color: "blue".into(),
            },
            SelectOption {
                id: 2,
                value: "Done".into(),
                color: "green".into(),
            },
        ];
        assert_eq!(option_matching(&options, "  in progress ").map(|o| o.id), Some(1));
        assert_eq!(option_matching(&options, "DONE").map(|o| o.id), Some(2));
        assert!(option_matching(&options, "Blocked").is_none());
    }
}
