//! Integration tests for the SQLite backend: transactions, DDL, and the
//! shadow-column alteration protocol.

use gridbase_core::{GridbaseError, Settings};
use gridbase_db::schema_editor::shadow_column_name;
use gridbase_db::{
    atomic, CastTarget, ColumnDef, ColumnType, DbExecutor, SchemaEditor, SqliteSchemaEditor,
    Value, CAST_FUNCTION, TRY_CAST_FUNCTION,
};
use gridbase_db_backends::SqliteBackend;

fn table_with_text(values: &[&str]) -> SqliteBackend {
    let db = SqliteBackend::memory().unwrap();
    let editor = SqliteSchemaEditor;
    db.execute_batch(&editor.create_table("t", &[ColumnDef::new("field_1", ColumnType::Text)]))
        .unwrap();
    for value in values {
        db.execute_sql("INSERT INTO t (field_1) VALUES (?)", &[Value::from(*value)])
            .unwrap();
    }
    db
}

fn column_type(db: &dyn DbExecutor, table: &str, column: &str) -> Option<String> {
    db.query(
        "SELECT type FROM pragma_table_info(?) WHERE name = ?",
        &[Value::from(table), Value::from(column)],
    )
    .unwrap()
    .into_iter()
    .next()
    .map(|row| row.get::<String>("type").unwrap())
}

fn column_values(db: &dyn DbExecutor) -> Vec<Value> {
    db.query("SELECT field_1 FROM t ORDER BY id", &[])
        .unwrap()
        .into_iter()
        .map(|row| row.get::<Value>("field_1").unwrap())
        .collect()
}

#[test]
fn test_atomic_rolls_back_ddl_and_data() {
    let db = table_with_text(&["a"]);
    let editor = SqliteSchemaEditor;

    let result: Result<(), GridbaseError> = atomic(&db, |db| {
        db.execute_batch(&editor.add_column("t", &ColumnDef::new("field_2", ColumnType::Integer)))?;
        db.execute_sql("UPDATE t SET field_1 = 'changed'", &[])?;
        Err(GridbaseError::DatabaseError("simulated failure".into()))
    });
    assert!(result.is_err());

    assert_eq!(column_type(&db, "t", "field_2"), None);
    assert_eq!(column_values(&db), vec![Value::from("a")]);
}

#[test]
fn test_atomic_commits_on_success() {
    let db = table_with_text(&[]);
    let editor = SqliteSchemaEditor;
    atomic(&db, |db| {
        db.execute_batch(&editor.add_column("t", &ColumnDef::new("field_2", ColumnType::Date)))
    })
    .unwrap();
    assert_eq!(column_type(&db, "t", "field_2").as_deref(), Some("DATE"));
}

#[test]
fn test_strict_populate_fails_with_data_error() {
    let db = table_with_text(&["abc", "123"]);
    let editor = SqliteSchemaEditor;
    let target = CastTarget::Integer { negative: false };
    let new_col = ColumnDef::new("field_1", ColumnType::Integer);

    db.execute_batch(&editor.add_shadow_column("t", &new_col)).unwrap();
    let err = db
        .execute_batch(&editor.populate_shadow_column("t", "field_1", CAST_FUNCTION, target))
        .unwrap_err();
    assert!(err.is_data_error(), "unexpected error: {err:?}");
}

#[test]
fn test_lenient_shadow_protocol() {
    let db = table_with_text(&["abc", "123", "45.6"]);
    let editor = SqliteSchemaEditor;
    let target = CastTarget::Integer { negative: false };
    let new_col = ColumnDef::new("field_1", ColumnType::Integer);

    atomic(&db, |db| {
        db.execute_batch(&editor.add_shadow_column("t", &new_col))?;
        db.execute_batch(&editor.populate_shadow_column(
            "t",
            "field_1",
            TRY_CAST_FUNCTION,
            target,
        ))?;
        db.execute_batch(&editor.swap_shadow_column("t", "field_1"))
    })
    .unwrap();

    assert_eq!(column_type(&db, "t", "field_1").as_deref(), Some("INTEGER"));
    assert_eq!(column_type(&db, "t", &shadow_column_name("field_1")), None);
    assert_eq!(
        column_values(&db),
        vec![Value::Null, Value::Int(123), Value::Null]
    );
}

#[test]
fn test_per_row_shadow_update() {
    let db = table_with_text(&["yes", "no"]);
    let editor = SqliteSchemaEditor;
    let new_col = ColumnDef::new("field_1", ColumnType::Boolean)
        .not_null()
        .default(false);

    db.execute_batch(&editor.add_shadow_column("t", &new_col)).unwrap();
    let sql = editor.update_shadow_value("t", "field_1");
    db.execute_sql(&sql, &[Value::Bool(true), Value::Int(1)]).unwrap();
    db.execute_batch(&editor.swap_shadow_column("t", "field_1")).unwrap();

    assert_eq!(column_values(&db), vec![Value::Int(1), Value::Int(0)]);
}

#[test]
fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.sqlite3");

    {
        let db = SqliteBackend::open(&path).unwrap();
        db.execute_sql("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
            .unwrap();
        db.execute_sql("INSERT INTO t (v) VALUES ('kept')", &[]).unwrap();
    }

    let db = SqliteBackend::open(&path).unwrap();
    let row = db.query_one("SELECT v FROM t", &[]).unwrap();
    assert_eq!(row.get::<String>("v").unwrap(), "kept");
}

#[test]
fn test_connect_uses_user_table_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user_tables.sqlite3");
    let toml = format!(
        "user_table_database = \"tables\"\n[databases.tables]\nname = \"{}\"\n",
        path.display()
    );
    let settings: Settings = gridbase_core::settings_loader::from_toml_str(&toml).unwrap();

    let db = gridbase_db_backends::connect(&settings).unwrap();
    assert_eq!(db.path(), &path);
    assert!(path.exists());
}

#[test]
fn test_nested_atomic_rolls_back_inner_block_only() {
    let db = table_with_text(&["a"]);
    atomic(&db, |db| {
        db.execute_sql("UPDATE t SET field_1 = 'outer'", &[])?;
        let inner: Result<(), GridbaseError> = atomic(db, |db| {
            db.execute_sql("UPDATE t SET field_1 = 'inner'", &[])?;
            Err(GridbaseError::DataError("bad value".into()))
        });
        assert!(inner.is_err());
        assert!(db.in_transaction());
        Ok(())
    })
    .unwrap();

    assert!(!db.in_transaction());
    assert_eq!(column_values(&db), vec![Value::from("outer")]);
}

#[test]
fn test_concurrent_read_then_write_transactions_wait_for_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tables.sqlite3");
    {
        let db = SqliteBackend::open(&path).unwrap();
        db.execute_sql("CREATE TABLE counter (id INTEGER PRIMARY KEY, n INTEGER)", &[])
            .unwrap();
        db.execute_sql("INSERT INTO counter (n) VALUES (0)", &[]).unwrap();
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let db = SqliteBackend::open(path).unwrap();
                (0..25)
                    .map(|_| {
                        atomic(&db, |db| {
                            let n: i64 = db.query_one("SELECT n FROM counter", &[])?.get("n")?;
                            db.execute_sql("UPDATE counter SET n = ?", &[Value::Int(n + 1)])
                        })
                    })
                    .filter(Result::is_err)
                    .count()
            })
        })
        .collect();

    let failures: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(failures, 0);

    let db = SqliteBackend::open(&path).unwrap();
    let row = db.query_one("SELECT n FROM counter", &[]).unwrap();
    assert_eq!(row.get::<i64>("n").unwrap(), 100);
}
