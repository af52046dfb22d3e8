//! Runner tests against a real Postgres.
//!
//! Set TEST_DATABASE_URL to run them; without it every test returns early.
//! Each test works inside its own schema, dropped at the end.

use std::fs;
use std::path::Path;

use backoffice_core::config::MigrationsConfig;
use backoffice_core::error::BackofficeError;
use backoffice_core::testing::{IsolatedSchema, TestDatabase};
use backoffice_runtime::{
    Database, MigrateAction, MigrationRunner, RollbackOutcome, RunOutcome,
};
use tempfile::TempDir;

async fn test_db() -> Option<TestDatabase> {
    let db = TestDatabase::from_env().await.unwrap();
    if db.is_none() {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
    }
    db
}

fn runner(pool: &sqlx::PgPool, dir: &Path, schema: &IsolatedSchema) -> MigrationRunner {
    MigrationRunner::new(
        Database::from_pool(pool.clone()),
        MigrationsConfig {
            dir: dir.to_path_buf(),
            schema: schema.name().to_string(),
        },
    )
}

fn write(dir: &Path, name: &str, content: String) {
    fs::write(dir.join(name), content).unwrap();
}

fn create_table(schema: &str, table: &str) -> String {
    format!(
        "-- migrate:up\nCREATE TABLE {schema}.{table} (id INT);\n-- migrate:down\nDROP TABLE {schema}.{table};\n"
    )
}

async fn ledger_names(db: &TestDatabase, schema: &IsolatedSchema) -> Vec<String> {
    sqlx::query_scalar(&format!(
        "SELECT name FROM {}.migrations ORDER BY id",
        schema.name()
    ))
    .fetch_all(db.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn test_apply_twice_applies_nothing_the_second_time() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("apply_twice");
    let dir = TempDir::new().unwrap();
    write(dir.path(), "0001_a.sql", create_table(schema.name(), "a"));
    write(dir.path(), "0002_b.sql", create_table(schema.name(), "b"));

    let runner = runner(db.pool(), dir.path(), &schema);

    let first = runner.apply().await.unwrap();
    assert_eq!(first.applied, ["0001_a.sql", "0002_b.sql"]);
    assert!(first.skipped.is_empty());

    let second = runner.apply().await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, ["0001_a.sql", "0002_b.sql"]);

    assert_eq!(ledger_names(&db, &schema).await, ["0001_a.sql", "0002_b.sql"]);
    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_apply_follows_file_name_order() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("apply_order");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();

    // Written out of order on purpose
    write(
        dir.path(),
        "0003_c.sql",
        format!("-- migrate:up\nINSERT INTO {s}.events (label) VALUES ('c');"),
    );
    write(
        dir.path(),
        "0001_events.sql",
        format!("-- migrate:up\nCREATE TABLE {s}.events (seq SERIAL, label TEXT);"),
    );
    write(
        dir.path(),
        "0002_b.sql",
        format!("-- migrate:up\nINSERT INTO {s}.events (label) VALUES ('b');"),
    );

    let runner = runner(db.pool(), dir.path(), &schema);
    let report = runner.apply().await.unwrap();
    assert_eq!(report.applied, ["0001_events.sql", "0002_b.sql", "0003_c.sql"]);

    let labels: Vec<String> =
        sqlx::query_scalar(&format!("SELECT label FROM {s}.events ORDER BY seq"))
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(labels, ["b", "c"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_failed_migration_leaves_no_trace() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("atomic_apply");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();

    write(dir.path(), "0001_ok.sql", create_table(&s, "ok"));
    write(
        dir.path(),
        "0002_broken.sql",
        format!("-- migrate:up\nCREATE TABLE {s}.half (id INT);\nSELECT * FROM {s}.does_not_exist;"),
    );
    write(dir.path(), "0003_never.sql", create_table(&s, "never"));

    let runner = runner(db.pool(), dir.path(), &schema);
    let err = runner.apply().await.unwrap_err();

    match err {
        BackofficeError::MigrationFailed { name, offset, .. } => {
            assert_eq!(name, "0002_broken.sql");
            assert!(offset.is_some());
        }
        other => panic!("expected MigrationFailed, got {:?}", other),
    }

    assert!(schema.table_exists("ok").await.unwrap());
    assert!(!schema.table_exists("half").await.unwrap());
    assert!(!schema.table_exists("never").await.unwrap());
    assert_eq!(ledger_names(&db, &schema).await, ["0001_ok.sql"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_file_without_up_marker_is_never_applied() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("missing_up");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();

    write(
        dir.path(),
        "0001_down_only.sql",
        format!("-- migrate:down\nDROP TABLE {s}.nothing;"),
    );

    let runner = runner(db.pool(), dir.path(), &schema);
    let err = runner.apply().await.unwrap_err();
    assert!(matches!(err, BackofficeError::Parse { ref name, .. } if name == "0001_down_only.sql"));
    assert!(ledger_names(&db, &schema).await.is_empty());

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_list_pending_excludes_applied() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("list_pending");
    let dir = TempDir::new().unwrap();
    write(dir.path(), "0001_a.sql", create_table(schema.name(), "a"));

    let runner = runner(db.pool(), dir.path(), &schema);
    runner.apply().await.unwrap();

    write(dir.path(), "0002_b.sql", create_table(schema.name(), "b"));
    let pending: Vec<String> = runner
        .list_pending()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(pending, ["0002_b.sql"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_rollback_reverts_only_the_latest() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("rollback_latest");
    let dir = TempDir::new().unwrap();
    for (file, table) in [("0001_a.sql", "a"), ("0002_b.sql", "b"), ("0003_c.sql", "c")] {
        write(dir.path(), file, create_table(schema.name(), table));
    }

    let runner = runner(db.pool(), dir.path(), &schema);
    runner.apply().await.unwrap();

    let outcome = runner.rollback().await.unwrap();
    assert_eq!(outcome, RollbackOutcome::RolledBack("0003_c.sql".to_string()));

    assert!(schema.table_exists("a").await.unwrap());
    assert!(schema.table_exists("b").await.unwrap());
    assert!(!schema.table_exists("c").await.unwrap());
    assert_eq!(ledger_names(&db, &schema).await, ["0001_a.sql", "0002_b.sql"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_rollback_without_down_is_refused() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("unsafe_rollback");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();

    write(dir.path(), "0001_a.sql", create_table(&s, "a"));
    write(
        dir.path(),
        "0002_b.sql",
        format!("-- migrate:up\nCREATE TABLE {s}.b (id INT);\n-- migrate:down\n"),
    );

    let runner = runner(db.pool(), dir.path(), &schema);
    runner.apply().await.unwrap();

    let err = runner.rollback().await.unwrap_err();
    assert!(matches!(err, BackofficeError::UnsafeRollback(ref name) if name == "0002_b.sql"));

    assert!(schema.table_exists("a").await.unwrap());
    assert!(schema.table_exists("b").await.unwrap());
    assert_eq!(ledger_names(&db, &schema).await, ["0001_a.sql", "0002_b.sql"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_failed_rollback_keeps_ledger_entry() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("failed_rollback");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();

    write(
        dir.path(),
        "0001_a.sql",
        format!(
            "-- migrate:up\nCREATE TABLE {s}.a (id INT);\n-- migrate:down\nDROP TABLE {s}.a;\nDROP TABLE {s}.missing;"
        ),
    );

    let runner = runner(db.pool(), dir.path(), &schema);
    runner.apply().await.unwrap();

    let err = runner.rollback().await.unwrap_err();
    assert!(matches!(err, BackofficeError::MigrationFailed { ref name, .. } if name == "0001_a.sql"));

    assert!(schema.table_exists("a").await.unwrap());
    assert_eq!(ledger_names(&db, &schema).await, ["0001_a.sql"]);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_rollback_with_empty_ledger_is_noop() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("rollback_noop");
    let dir = TempDir::new().unwrap();

    let runner = runner(db.pool(), dir.path(), &schema);
    let outcome = runner.rollback().await.unwrap();
    assert_eq!(outcome, RollbackOutcome::NothingToRollback);

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_empty_directory_only_ensures_ledger() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("empty_dir");
    let dir = TempDir::new().unwrap();

    let runner = runner(db.pool(), dir.path(), &schema);
    let report = runner.apply().await.unwrap();
    assert!(report.applied.is_empty());
    assert!(report.skipped.is_empty());

    assert!(schema.table_exists("migrations").await.unwrap());
    assert!(ledger_names(&db, &schema).await.is_empty());

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_run_closes_pool_on_success_and_failure() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("run_closes");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();
    write(dir.path(), "0001_a.sql", create_table(&s, "a"));

    let own = TestDatabase::from_url(db.url()).await.unwrap();
    let pool = own.pool().clone();
    let outcome = runner(&pool, dir.path(), &schema)
        .run(MigrateAction::Apply)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Applied(ref r) if r.applied == ["0001_a.sql"]));
    assert!(pool.is_closed());

    write(dir.path(), "0002_bad.sql", "no markers here".to_string());
    let own = TestDatabase::from_url(db.url()).await.unwrap();
    let pool = own.pool().clone();
    let result = runner(&pool, dir.path(), &schema)
        .run(MigrateAction::Apply)
        .await;
    assert!(matches!(result, Err(BackofficeError::Parse { .. })));
    assert!(pool.is_closed());

    schema.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_rollback_that_removes_no_ledger_entry_is_undone() {
    let Some(db) = test_db().await else { return };
    let schema = db.isolated_schema("ledger_drift");
    let s = schema.name().to_string();
    let dir = TempDir::new().unwrap();
    write(dir.path(), "0001_a.sql", create_table(&s, "a"));

    let runner = runner(db.pool(), dir.path(), &schema);
    runner.apply().await.unwrap();

    // Another writer's delete got there first: ours now matches no row.
    db.execute(&format!(
        r#"
        CREATE FUNCTION {s}.keep_rows() RETURNS trigger AS $$
        BEGIN
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER keep_rows BEFORE DELETE ON {s}.migrations
            FOR EACH ROW EXECUTE FUNCTION {s}.keep_rows();
        "#
    ))
    .await
    .unwrap();

    let err = runner.rollback().await.unwrap_err();
    match err {
        BackofficeError::MigrationFailed { name, message, offset } => {
            assert_eq!(name, "0001_a.sql");
            assert!(message.contains("removed 0"));
            assert_eq!(offset, None);
        }
        other => panic!("expected MigrationFailed, got {:?}", other),
    }

    assert!(schema.table_exists("a").await.unwrap());
    assert_eq!(ledger_names(&db, &schema).await, ["0001_a.sql"]);

    schema.cleanup().await.unwrap();
}
