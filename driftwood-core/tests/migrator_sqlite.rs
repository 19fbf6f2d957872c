#[cfg(feature = "sqlite")]
use driftwood_core::migrator::Migrator;
#[cfg(feature = "sqlite")]
use driftwood_core::test_utils::{make_temp_dir, write_file};
#[cfg(feature = "sqlite")]
use driftwood_core::{DriftError, MigrationScript, MigrationWriter};
#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;
#[cfg(feature = "sqlite")]
use sqlx::sqlite::SqlitePoolOptions;

#[cfg(feature = "sqlite")]
async fn setup_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("pool")
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_migrator_runs_written_files() {
    let pool = setup_pool().await;
    let dir = make_temp_dir("migrator_it").expect("dir");
    let writer = MigrationWriter::new(&dir);
    writer
        .write(
            "create_items",
            &MigrationScript {
                up: "-- Migration: create_items\nCREATE TABLE items (id INTEGER PRIMARY KEY);\n"
                    .to_owned(),
                down: "DROP TABLE items;\n".to_owned(),
            },
        )
        .expect("write 1");
    writer
        .write(
            "add_label",
            &MigrationScript {
                up: "ALTER TABLE items ADD COLUMN label TEXT;\nCREATE INDEX idx_items_label ON items (label);\n"
                    .to_owned(),
                down: "DROP INDEX idx_items_label;\nALTER TABLE items DROP COLUMN label;\n".to_owned(),
            },
        )
        .expect("write 2");

    let migrator = Migrator::from_dir(pool.clone(), &dir).expect("load");
    assert_eq!(migrator.up().await.expect("up"), vec![1, 2]);
    assert_eq!(migrator.version().await.expect("version"), Some((2, false)));

    sqlx::query("INSERT INTO items (label) VALUES ('x')")
        .execute(&pool)
        .await
        .expect("insert");

    assert_eq!(migrator.down().await.expect("down"), Some(2));
    let err = sqlx::query("INSERT INTO items (label) VALUES ('y')")
        .execute(&pool)
        .await;
    assert!(err.is_err());
    assert_eq!(migrator.version().await.expect("version"), Some((1, false)));

    let _ = std::fs::remove_dir_all(dir);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_dirty_state_requires_force() {
    let pool = setup_pool().await;
    let dir = make_temp_dir("migrator_dirty").expect("dir");
    write_file(&dir, "1_ok.up.sql", "CREATE TABLE ok (id INTEGER);").expect("1");
    write_file(&dir, "2_bad.up.sql", "CREATE TABLE nope (id INTEGER);\nNOT SQL;").expect("2");

    let migrator = Migrator::from_dir(pool, &dir).expect("load");
    assert!(migrator.up().await.is_err());
    assert_eq!(migrator.version().await.expect("version"), Some((2, true)));
    assert!(matches!(
        migrator.goto(1).await.expect_err("dirty"),
        DriftError::DirtyDatabase(2)
    ));

    migrator.force(1).await.expect("force");
    assert_eq!(migrator.version().await.expect("version"), Some((1, false)));

    let _ = std::fs::remove_dir_all(dir);
}
