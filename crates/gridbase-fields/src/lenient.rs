//! The lenient column alteration used when no converter applies.
//!
//! The column is rebuilt through a shadow column populated by the backend's
//! cast function. A strict cast of the whole column is tried first; when the
//! engine rejects a value with a data error, the shadow column is populated
//! again with the lenient cast, which turns every unconvertible cell into the
//! empty value of the new type. Only errors other than data errors, or a
//! failure of the lenient pass itself, reach the caller.

use gridbase_core::GridbaseResult;
use gridbase_db::{atomic, DbExecutor, SchemaEditor, CAST_FUNCTION, TRY_CAST_FUNCTION};

use crate::registry::FieldChange;

/// Which cast populated the new column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTier {
    /// Every cell converted.
    Strict,
    /// At least one cell could not be converted and was emptied.
    Lenient,
}

/// Best-effort column alteration.
pub struct LenientAlteration<'a> {
    editor: &'a dyn SchemaEditor,
}

impl<'a> LenientAlteration<'a> {
    /// Creates a fallback issuing DDL built by `editor`.
    pub fn new(editor: &'a dyn SchemaEditor) -> Self {
        Self { editor }
    }

    /// Alters the column of `change` to its new definition.
    pub fn alter(&self, db: &dyn DbExecutor, change: &FieldChange<'_>) -> GridbaseResult<CastTier> {
        let table = change.new_model.db_table();
        let column = change.old_column.column.as_str();
        let target = change.new_target;

        atomic(db, |db| {
            db.execute_batch(&self.editor.add_shadow_column(table, change.new_column))?;

            let strict = atomic(db, |db| {
                db.execute_batch(&self.editor.populate_shadow_column(
                    table,
                    column,
                    CAST_FUNCTION,
                    target,
                ))
            });
            let tier = match strict {
                Ok(()) => CastTier::Strict,
                Err(e) if e.is_data_error() => {
                    tracing::warn!(
                        field_id = change.new_field.id,
                        target = %target,
                        error = %e,
                        "values cannot be cast, emptying unconvertible cells"
                    );
                    db.execute_batch(&self.editor.populate_shadow_column(
                        table,
                        column,
                        TRY_CAST_FUNCTION,
                        target,
                    ))?;
                    CastTier::Lenient
                }
                Err(e) => return Err(e),
            };

            db.execute_batch(&self.editor.swap_shadow_column(table, column))?;
            Ok(tier)
        })
    }
}
