use serde::Serialize;
use sqlx::Pool;

use crate::dialect::SqlDialect;
use crate::error::{DriftError, DriftResult, is_unique_violation};

/// Name of the per-environment seed tracking table.
pub const SEED_TABLE: &str = "seed_migrations";

const CREATE_SEED_TABLE: &str = "CREATE TABLE IF NOT EXISTS seed_migrations (
    version VARCHAR(255) NOT NULL,
    environment VARCHAR(50) NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (version, environment)
)";

/// One applied seed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedRecord {
    pub version: String,
    pub environment: String,
    /// As rendered by the database.
    pub applied_at: Option<String>,
}

/// Persisted `(version, environment)` state.
pub struct SeedTracker<DB: SqlDialect> {
    pool: Pool<DB>,
}

impl<DB: SqlDialect> SeedTracker<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Creates the tracking table if it does not exist.
    pub async fn ensure_table(&self) -> DriftResult<()> {
        DB::execute(&self.pool, CREATE_SEED_TABLE, &[]).await?;
        Ok(())
    }

    /// Applied versions for `environment`, ascending by version string.
    pub async fn applied_versions(&self, environment: &str) -> DriftResult<Vec<String>> {
        let sql = format!(
            "SELECT version FROM {} WHERE environment = {} ORDER BY version",
            SEED_TABLE,
            DB::placeholder(1)
        );
        let rows = DB::fetch_text_rows(&self.pool, &sql, &[environment]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    /// Full records including the application timestamp.
    pub async fn records(&self, environment: &str) -> DriftResult<Vec<SeedRecord>> {
        let sql = format!(
            "SELECT version, environment, {} FROM {} WHERE environment = {} ORDER BY version",
            DB::cast_to_text("applied_at"),
            SEED_TABLE,
            DB::placeholder(1)
        );
        let rows = DB::fetch_text_rows(&self.pool, &sql, &[environment]).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                SeedRecord {
                    version: cells.next().flatten().unwrap_or_default(),
                    environment: cells.next().flatten().unwrap_or_default(),
                    applied_at: cells.next().flatten(),
                }
            })
            .collect())
    }

    /// Records `version` as applied. A second insert for the same key is a
    /// [`DriftError::VersionConflict`].
    pub async fn mark_applied(&self, environment: &str, version: &str) -> DriftResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, environment) VALUES ({}, {})",
            SEED_TABLE,
            DB::placeholder(1),
            DB::placeholder(2)
        );
        match DB::execute(&self.pool, &sql, &[version, environment]).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(DriftError::VersionConflict(format!(
                "seed {} is already applied for environment {}",
                version, environment
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Forgets `version`; returns whether a row was removed.
    pub async fn mark_unapplied(&self, environment: &str, version: &str) -> DriftResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE version = {} AND environment = {}",
            SEED_TABLE,
            DB::placeholder(1),
            DB::placeholder(2)
        );
        let affected = DB::execute(&self.pool, &sql, &[version, environment]).await?;
        Ok(affected > 0)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::test_utils::MockDatabase;

    async fn tracker() -> SeedTracker<sqlx::Sqlite> {
        let db = MockDatabase::new_sqlite().await.unwrap();
        let tracker = SeedTracker::new(db.into_pool());
        tracker.ensure_table().await.unwrap();
        tracker
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let tracker = tracker().await;
        tracker.ensure_table().await.unwrap();
        assert!(tracker.applied_versions("development").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn applied_versions_are_scoped_by_environment() {
        let tracker = tracker().await;
        tracker.mark_applied("development", "2").await.unwrap();
        tracker.mark_applied("development", "1").await.unwrap();
        tracker.mark_applied("production", "1").await.unwrap();

        assert_eq!(
            tracker.applied_versions("development").await.unwrap(),
            vec!["1", "2"]
        );
        assert_eq!(
            tracker.applied_versions("production").await.unwrap(),
            vec!["1"]
        );
    }

    #[tokio::test]
    async fn duplicate_mark_is_a_version_conflict() {
        let tracker = tracker().await;
        tracker.mark_applied("development", "1").await.unwrap();
        let err = tracker.mark_applied("development", "1").await.unwrap_err();
        assert!(matches!(err, DriftError::VersionConflict(_)), "{err}");
    }

    #[tokio::test]
    async fn mark_unapplied_removes_only_that_key() {
        let tracker = tracker().await;
        tracker.mark_applied("development", "1").await.unwrap();
        tracker.mark_applied("staging", "1").await.unwrap();

        assert!(tracker.mark_unapplied("development", "1").await.unwrap());
        assert!(!tracker.mark_unapplied("development", "1").await.unwrap());
        assert!(tracker.applied_versions("development").await.unwrap().is_empty());
        assert_eq!(tracker.applied_versions("staging").await.unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn records_carry_timestamps() {
        let tracker = tracker().await;
        tracker.mark_applied("development", "3").await.unwrap();
        let records = tracker.records("development").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "3");
        assert_eq!(records[0].environment, "development");
        assert!(records[0].applied_at.is_some());
    }
}
