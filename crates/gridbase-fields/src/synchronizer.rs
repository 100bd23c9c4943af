//! Keeps physical columns in step with field metadata.
//!
//! Every structural change runs while holding the table's entry in
//! [`SchemaLocks`], so two alterations of the same table never interleave.
//! Backend failures while altering a column are reported as
//! [`GridbaseError::CannotChangeFieldType`].

use std::sync::Arc;

use gridbase_core::{GridbaseError, GridbaseResult};
use gridbase_db::{atomic, DbExecutor, SchemaEditor, SchemaLocks};

use crate::auth::User;
use crate::converters::ConverterRegistry;
use crate::lenient::{CastTier, LenientAlteration};
use crate::models::{Field, PhysicalModel};
use crate::registry::FieldChange;
use crate::store::FieldStore;

/// How a column alteration was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterStrategy {
    /// A specialized converter rewrote the column.
    Converter(&'static str),
    /// The lenient fallback cast the column.
    Cast(CastTier),
    /// Column definition and cast were unchanged, nothing was done.
    Unchanged,
}

/// The result of [`SchemaSynchronizer::alter_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlterOutcome {
    /// The strategy that ran.
    pub strategy: AlterStrategy,
    /// Whether the backend column type differs from before.
    pub altered_column: bool,
}

/// Issues add, alter and remove operations for field columns.
pub struct SchemaSynchronizer {
    editor: Arc<dyn SchemaEditor>,
    locks: Arc<SchemaLocks>,
    converters: Arc<ConverterRegistry>,
}

impl SchemaSynchronizer {
    /// Creates a synchronizer.
    pub fn new(
        editor: Arc<dyn SchemaEditor>,
        locks: Arc<SchemaLocks>,
        converters: Arc<ConverterRegistry>,
    ) -> Self {
        Self {
            editor,
            locks,
            converters,
        }
    }

    /// The schema editor used to build DDL.
    pub fn editor(&self) -> &dyn SchemaEditor {
        self.editor.as_ref()
    }

    /// The schema locks serializing alterations of one table.
    pub fn locks(&self) -> &Arc<SchemaLocks> {
        &self.locks
    }

    /// Adds the column of `field` to the model's table.
    pub fn add_column(
        &self,
        db: &dyn DbExecutor,
        model: &PhysicalModel,
        field: &Field,
    ) -> GridbaseResult<()> {
        let column = model.column_for(field)?;
        self.locks.with_table_lock(model.table_id(), || {
            db.execute_batch(&self.editor.add_column(model.db_table(), column))
        })?;
        tracing::debug!(field_id = field.id, column = %column.column, "added column");
        Ok(())
    }

    /// Alters the column from the old to the new definition of `change`.
    ///
    /// A converter is used when one applies. Otherwise the lenient fallback
    /// runs, unless neither the column definition nor the cast changed.
    pub fn alter_column(
        &self,
        db: &dyn DbExecutor,
        change: &FieldChange<'_>,
        user: &User,
    ) -> GridbaseResult<AlterOutcome> {
        let editor = self.editor.as_ref();
        let altered_column = editor.db_type(change.old_column.column_type)
            != editor.db_type(change.new_column.column_type);

        let strategy = self
            .locks
            .with_table_lock(change.new_model.table_id(), || {
                self.run_alteration(db, change, user)
            })
            .map_err(|e| cannot_change_field_type(e, change))?;

        tracing::debug!(field_id = change.new_field.id, ?strategy, altered_column, "altered column");
        Ok(AlterOutcome {
            strategy,
            altered_column,
        })
    }

    fn run_alteration(
        &self,
        db: &dyn DbExecutor,
        change: &FieldChange<'_>,
        user: &User,
    ) -> GridbaseResult<AlterStrategy> {
        let editor = self.editor.as_ref();
        if let Some(converter) =
            self.converters
                .find_applicable(change.old_model, change.old_field, change.new_field)
        {
            tracing::debug!(converter = converter.name(), "using field converter");
            atomic(db, |db| converter.alter_field(change, user, db, editor))?;
            return Ok(AlterStrategy::Converter(converter.name()));
        }

        let definition_changed =
            editor.column_sql(change.old_column) != editor.column_sql(change.new_column);
        if !definition_changed && change.old_target == change.new_target {
            return Ok(AlterStrategy::Unchanged);
        }

        tracing::debug!(target = %change.new_target, "no converter applies, using lenient cast");
        let tier = LenientAlteration::new(editor).alter(db, change)?;
        Ok(AlterStrategy::Cast(tier))
    }

    /// Drops the column of `field` and deletes its metadata record.
    pub fn remove_column(
        &self,
        db: &dyn DbExecutor,
        model: &PhysicalModel,
        field: &Field,
    ) -> GridbaseResult<()> {
        let column = model.column_for(field)?;
        self.locks.with_table_lock(model.table_id(), || {
            db.execute_batch(&self.editor.drop_column(model.db_table(), &column.column))
        })?;
        FieldStore::delete(db, field.id)?;
        tracing::debug!(field_id = field.id, column = %column.column, "removed column");
        Ok(())
    }
}

fn cannot_change_field_type(error: GridbaseError, change: &FieldChange<'_>) -> GridbaseError {
    if !error.is_database_error() {
        return error;
    }
    let message = format!(
        "Could not alter field when changing field type {} to {}.",
        change.old_field.field_type, change.new_field.field_type
    );
    tracing::error!(field_id = change.new_field.id, error = %error, "{message}");
    GridbaseError::CannotChangeFieldType(message)
}
