use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sqlx::Pool;
use walkdir::WalkDir;

use crate::dialect::SqlDialect;
use crate::error::{DriftError, DriftResult};
use crate::statements::split_statements;
use crate::version::numeric_prefix;

/// Name of the single-row schema version table.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT NOT NULL PRIMARY KEY,
    dirty BOOLEAN NOT NULL
)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u64,
    pub name: String,
    pub up_sql: String,
    pub down_sql: String,
}

impl Migration {
    fn file_name(&self, direction: &str) -> PathBuf {
        PathBuf::from(format!("{}_{}.{}.sql", self.version, self.name, direction))
    }
}

/// Reads `<version>_<name>.{up,down}.sql` pairs from `dir`, ascending by version.
/// A missing directory has no migrations.
pub fn load_migrations(dir: &Path) -> DriftResult<Vec<Migration>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found: BTreeMap<u64, (Option<Migration>, Option<String>)> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| DriftError::file_io(dir, err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let (stem, is_up) = if let Some(stem) = file_name.strip_suffix(".up.sql") {
            (stem, true)
        } else if let Some(stem) = file_name.strip_suffix(".down.sql") {
            (stem, false)
        } else {
            continue;
        };
        let Some(version) = numeric_prefix(stem) else {
            tracing::warn!(file = %file_name, "migration file has no numeric version; skipped");
            continue;
        };
        let name = stem.split_once('_').map(|(_, n)| n).unwrap_or_default();
        let sql = std::fs::read_to_string(entry.path())
            .map_err(|err| DriftError::file_io(entry.path(), err))?;

        let slot = found.entry(version).or_default();
        if is_up {
            if slot.0.is_some() {
                return Err(DriftError::Migration(format!(
                    "duplicate migration version {}",
                    version
                )));
            }
            slot.0 = Some(Migration {
                version,
                name: name.to_owned(),
                up_sql: sql,
                down_sql: String::new(),
            });
        } else if slot.1.replace(sql).is_some() {
            return Err(DriftError::Migration(format!(
                "duplicate down migration for version {}",
                version
            )));
        }
    }

    found
        .into_iter()
        .map(|(version, (up, down))| {
            let mut migration = up.ok_or_else(|| {
                DriftError::Migration(format!("migration {} has no up file", version))
            })?;
            migration.down_sql = down.unwrap_or_default();
            Ok(migration)
        })
        .collect()
}

/// Versioned schema migrations tracked in [`MIGRATIONS_TABLE`].
///
/// The table holds at most one row: the current version and whether the last
/// attempt to reach it failed half way. A dirty database refuses `up`, `down`
/// and `goto` until [`Migrator::force`] is used.
pub struct Migrator<DB: SqlDialect> {
    pool: Pool<DB>,
    migrations: Vec<Migration>,
}

impl<DB: SqlDialect> Migrator<DB> {
    pub fn new(pool: Pool<DB>, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        Self { pool, migrations }
    }

    pub fn from_dir(pool: Pool<DB>, dir: &Path) -> DriftResult<Self> {
        Ok(Self::new(pool, load_migrations(dir)?))
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    async fn ensure_table(&self) -> DriftResult<()> {
        DB::execute(&self.pool, CREATE_MIGRATIONS_TABLE, &[]).await?;
        Ok(())
    }

    /// Current `(version, dirty)`; `None` before the first migration.
    pub async fn version(&self) -> DriftResult<Option<(u64, bool)>> {
        self.ensure_table().await?;
        let sql = format!(
            "SELECT {}, {} FROM {}",
            DB::cast_to_text("version"),
            DB::cast_to_text("dirty"),
            MIGRATIONS_TABLE
        );
        let rows = DB::fetch_text_rows(&self.pool, &sql, &[]).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut cells = row.into_iter();
        let raw_version = cells.next().flatten().unwrap_or_default();
        let version = raw_version.trim().parse::<u64>().map_err(|_| {
            DriftError::Migration(format!("unreadable schema version `{}`", raw_version))
        })?;
        let dirty = matches!(
            cells.next().flatten().as_deref().map(str::trim),
            Some("1" | "t" | "true" | "TRUE")
        );
        Ok(Some((version, dirty)))
    }

    async fn set_version(&self, version: Option<u64>, dirty: bool) -> DriftResult<()> {
        DB::execute(&self.pool, &format!("DELETE FROM {}", MIGRATIONS_TABLE), &[]).await?;
        if let Some(version) = version {
            // both values are numeric literals
            let sql = format!(
                "INSERT INTO {} (version, dirty) VALUES ({}, {})",
                MIGRATIONS_TABLE,
                version,
                if dirty { "TRUE" } else { "FALSE" }
            );
            DB::execute(&self.pool, &sql, &[]).await?;
        }
        Ok(())
    }

    async fn clean_version(&self) -> DriftResult<Option<u64>> {
        match self.version().await? {
            Some((version, true)) => Err(DriftError::DirtyDatabase(version)),
            Some((version, false)) => Ok(Some(version)),
            None => Ok(None),
        }
    }

    async fn run_sql(&self, migration: &Migration, direction: &str, sql: &str) -> DriftResult<()> {
        for statement in split_statements(sql) {
            DB::execute(&self.pool, &statement, &[])
                .await
                .map_err(|source| DriftError::StatementExecution {
                    file: migration.file_name(direction),
                    statement: statement.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> DriftResult<()> {
        tracing::info!(
            operation = "migration_apply",
            version = migration.version,
            name = %migration.name,
            "driftwood migration"
        );
        println!(
            ">> Applying migration: {} - {}",
            migration.version, migration.name
        );
        self.set_version(Some(migration.version), true).await?;
        self.run_sql(migration, "up", &migration.up_sql).await?;
        self.set_version(Some(migration.version), false).await
    }

    async fn revert(&self, index: usize) -> DriftResult<()> {
        let migration = &self.migrations[index];
        if split_statements(&migration.down_sql).is_empty() {
            return Err(DriftError::Migration(format!(
                "down migration for version {} is empty",
                migration.version
            )));
        }
        tracing::info!(
            operation = "migration_rollback",
            version = migration.version,
            name = %migration.name,
            "driftwood migration"
        );
        println!(
            ">> Rolling back migration: {} - {}",
            migration.version, migration.name
        );
        self.set_version(Some(migration.version), true).await?;
        self.run_sql(migration, "down", &migration.down_sql).await?;
        let previous = index
            .checked_sub(1)
            .map(|prev| self.migrations[prev].version);
        self.set_version(previous, false).await
    }

    fn position(&self, version: u64) -> DriftResult<usize> {
        self.migrations
            .iter()
            .position(|m| m.version == version)
            .ok_or_else(|| {
                DriftError::Migration(format!("no migration file for version {}", version))
            })
    }

    /// Applies every migration above the current version. Returns the applied versions.
    pub async fn up(&self) -> DriftResult<Vec<u64>> {
        let current = self.clean_version().await?;
        let mut applied = Vec::new();
        for migration in &self.migrations {
            if current.is_some_and(|v| migration.version <= v) {
                continue;
            }
            self.apply(migration).await?;
            applied.push(migration.version);
        }
        if applied.is_empty() {
            println!("[INFO] No pending migrations");
        }
        Ok(applied)
    }

    /// Steps back one version. Returns the reverted version, `None` when nothing is applied.
    pub async fn down(&self) -> DriftResult<Option<u64>> {
        let Some(current) = self.clean_version().await? else {
            println!("[INFO] No migrations to rollback");
            return Ok(None);
        };
        let index = self.position(current)?;
        self.revert(index).await?;
        Ok(Some(current))
    }

    /// Sets the version and clears the dirty flag without running any SQL.
    pub async fn force(&self, version: u64) -> DriftResult<()> {
        self.ensure_table().await?;
        tracing::info!(operation = "migration_force", version, "driftwood migration");
        self.set_version(Some(version), false).await
    }

    /// Migrates up or down until the current version is `target`. `0` reverts everything.
    pub async fn goto(&self, target: u64) -> DriftResult<Option<u64>> {
        if target != 0 {
            self.position(target)?;
        }
        let mut current = self.clean_version().await?;

        for migration in &self.migrations {
            if migration.version > target {
                break;
            }
            if current.is_some_and(|v| migration.version <= v) {
                continue;
            }
            self.apply(migration).await?;
            current = Some(migration.version);
        }

        while let Some(version) = current.filter(|v| *v > target) {
            let index = self.position(version)?;
            self.revert(index).await?;
            current = index.checked_sub(1).map(|prev| self.migrations[prev].version);
        }
        Ok(current)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::test_utils::{make_temp_dir, write_file};

    async fn memory_pool() -> Pool<sqlx::Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn migration(version: u64, table: &str) -> Migration {
        Migration {
            version,
            name: format!("create_{}", table),
            up_sql: format!("CREATE TABLE {} (id INTEGER PRIMARY KEY);", table),
            down_sql: format!("DROP TABLE {};", table),
        }
    }

    async fn table_exists(pool: &Pool<sqlx::Sqlite>, table: &str) -> bool {
        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(table)
                .fetch_optional(pool)
                .await
                .unwrap();
        name.is_some()
    }

    #[tokio::test]
    async fn sqlite_migrator_applies_pending_once() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(pool.clone(), vec![migration(1, "users")]);

        assert_eq!(migrator.version().await.unwrap(), None);
        assert_eq!(migrator.up().await.unwrap(), vec![1]);
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));

        assert!(migrator.up().await.unwrap().is_empty());
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn sqlite_migrator_applies_in_version_order() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(pool.clone(), vec![migration(10, "b"), migration(2, "a")]);

        assert_eq!(migrator.up().await.unwrap(), vec![2, 10]);
        assert!(table_exists(&pool, "a").await);
        assert!(table_exists(&pool, "b").await);
    }

    #[tokio::test]
    async fn sqlite_migrator_rolls_back_last() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(pool.clone(), vec![migration(1, "a"), migration(2, "b")]);
        migrator.up().await.unwrap();

        assert_eq!(migrator.down().await.unwrap(), Some(2));
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));
        assert!(!table_exists(&pool, "b").await);

        assert_eq!(migrator.down().await.unwrap(), Some(1));
        assert_eq!(migrator.version().await.unwrap(), None);
        assert_eq!(migrator.down().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_migrator_marks_dirty_on_error() {
        let pool = memory_pool().await;
        let bad = Migration {
            version: 3,
            name: "bad_sql".to_owned(),
            up_sql: "CREATE TABLE broken (id INTEGER PRIMARY KEY); INVALID SQL".to_owned(),
            down_sql: "DROP TABLE broken;".to_owned(),
        };
        let migrator = Migrator::new(pool.clone(), vec![migration(1, "a"), bad]);

        let err = migrator.up().await.unwrap_err();
        assert!(
            matches!(err, DriftError::StatementExecution { .. }),
            "{err}"
        );
        assert!(err.to_string().contains("syntax"));
        assert_eq!(migrator.version().await.unwrap(), Some((3, true)));

        let err = migrator.up().await.unwrap_err();
        assert!(matches!(err, DriftError::DirtyDatabase(3)));
        assert!(matches!(
            migrator.down().await.unwrap_err(),
            DriftError::DirtyDatabase(3)
        ));

        migrator.force(1).await.unwrap();
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));
    }

    #[tokio::test]
    async fn sqlite_migrator_goto_moves_both_ways() {
        let pool = memory_pool().await;
        let migrator = Migrator::new(
            pool.clone(),
            vec![migration(1, "a"), migration(2, "b"), migration(3, "c")],
        );

        assert_eq!(migrator.goto(2).await.unwrap(), Some(2));
        assert!(table_exists(&pool, "b").await);
        assert!(!table_exists(&pool, "c").await);

        assert_eq!(migrator.goto(3).await.unwrap(), Some(3));
        assert_eq!(migrator.goto(1).await.unwrap(), Some(1));
        assert!(!table_exists(&pool, "b").await);
        assert_eq!(migrator.goto(0).await.unwrap(), None);
        assert!(!table_exists(&pool, "a").await);

        let err = migrator.goto(9).await.unwrap_err();
        assert!(matches!(err, DriftError::Migration(_)));
    }

    #[tokio::test]
    async fn empty_down_is_refused() {
        let pool = memory_pool().await;
        let mut only_up = migration(1, "a");
        only_up.down_sql = "-- nothing\n".to_owned();
        let migrator = Migrator::new(pool, vec![only_up]);
        migrator.up().await.unwrap();

        let err = migrator.down().await.unwrap_err();
        assert!(matches!(err, DriftError::Migration(_)));
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));
    }

    #[tokio::test]
    async fn template_down_is_refused() {
        let pool = memory_pool().await;
        let mut generated = migration(1, "cover");
        generated.down_sql = crate::writer::MigrationScript::template("add_cover").down;
        let migrator = Migrator::new(pool, vec![generated]);
        migrator.up().await.unwrap();

        let err = migrator.down().await.unwrap_err();
        assert!(err.to_string().contains("down migration for version 1 is empty"));
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));
    }

    #[test]
    fn loads_pairs_from_directory() {
        let dir = make_temp_dir("migrator_load").unwrap();
        write_file(&dir, "2_add_title.up.sql", "ALTER TABLE t ADD COLUMN title TEXT;").unwrap();
        write_file(&dir, "2_add_title.down.sql", "ALTER TABLE t DROP COLUMN title;").unwrap();
        write_file(&dir, "1_init.up.sql", "CREATE TABLE t (id INTEGER);").unwrap();
        write_file(&dir, "notes.txt", "ignored").unwrap();

        let migrations = load_migrations(&dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[0].name, "init");
        assert!(migrations[0].down_sql.is_empty());
        assert_eq!(migrations[1].name, "add_title");
        assert!(migrations[1].down_sql.contains("DROP COLUMN"));

        assert!(load_migrations(&dir.join("missing")).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn down_without_up_is_an_error() {
        let dir = make_temp_dir("migrator_orphan").unwrap();
        write_file(&dir, "4_orphan.down.sql", "DROP TABLE x;").unwrap();
        let err = load_migrations(&dir).unwrap_err();
        assert!(matches!(err, DriftError::Migration(_)));
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[cfg(all(test, feature = "postgres"))]
mod postgres_tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    async fn pg_pool_or_skip() -> Option<Pool<sqlx::Postgres>> {
        let db_url = std::env::var("DATABASE_URL").ok()?;
        if !db_url.starts_with("postgres") {
            return None;
        }
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await
            .ok()
    }

    #[tokio::test]
    async fn postgres_migrator_round_trip() {
        let Some(pool) = pg_pool_or_skip().await else {
            return;
        };
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let table = format!("driftwood_mig_{}", suffix);
        let migrator = Migrator::new(
            pool.clone(),
            vec![Migration {
                version: 1,
                name: "create_test_table".to_owned(),
                up_sql: format!("CREATE TABLE {} (id SERIAL PRIMARY KEY);", table),
                down_sql: format!("DROP TABLE {};", table),
            }],
        );
        migrator.version().await.unwrap();
        let _ = sqlx::query("DELETE FROM schema_migrations")
            .execute(&pool)
            .await;

        assert_eq!(migrator.up().await.unwrap(), vec![1]);
        assert_eq!(migrator.version().await.unwrap(), Some((1, false)));
        assert_eq!(migrator.down().await.unwrap(), Some(1));
        assert_eq!(migrator.version().await.unwrap(), None);

        let _ = sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&pool)
            .await;
    }
}
