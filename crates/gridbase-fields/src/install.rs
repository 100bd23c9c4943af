//! Metadata tables.
//!
//! [`install`] creates the tables holding table, field, filter and sort
//! metadata. It is idempotent and can run on every start.

use gridbase_core::GridbaseResult;
use gridbase_db::DbExecutor;

const METADATA_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS \"database_table\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"name\" TEXT NOT NULL, \
        \"group_id\" INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS \"database_field\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"table_id\" INTEGER NOT NULL REFERENCES \"database_table\" (\"id\") ON DELETE CASCADE, \
        \"name\" TEXT NOT NULL, \
        \"order\" INTEGER NOT NULL, \
        \"primary\" BOOLEAN NOT NULL DEFAULT FALSE, \
        \"type\" TEXT NOT NULL, \
        \"attributes\" TEXT NOT NULL DEFAULT '{}')",
    "CREATE INDEX IF NOT EXISTS \"database_field_table_id\" ON \"database_field\" (\"table_id\")",
    "CREATE TABLE IF NOT EXISTS \"database_viewfilter\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"view_id\" INTEGER NOT NULL, \
        \"field_id\" INTEGER NOT NULL REFERENCES \"database_field\" (\"id\") ON DELETE CASCADE, \
        \"type\" TEXT NOT NULL, \
        \"value\" TEXT NOT NULL DEFAULT '')",
    "CREATE TABLE IF NOT EXISTS \"database_viewsort\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"view_id\" INTEGER NOT NULL, \
        \"field_id\" INTEGER NOT NULL REFERENCES \"database_field\" (\"id\") ON DELETE CASCADE, \
        \"order\" TEXT NOT NULL DEFAULT 'ASC')",
];

/// Creates the metadata tables if they do not exist yet.
pub fn install(db: &dyn DbExecutor) -> GridbaseResult<()> {
    let statements: Vec<String> = METADATA_TABLES.iter().map(|s| (*s).to_string()).collect();
    db.execute_batch(&statements)?;
    tracing::debug!(statements = statements.len(), "installed metadata tables");
    Ok(())
}
