use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Pool;

use crate::config::Settings;
use crate::dialect::SqlDialect;
use crate::error::{DriftError, DriftResult};
use crate::seed::catalog::SeedCatalog;
use crate::seed::tracker::SeedTracker;
use crate::statements::{preview, split_statements};
use crate::version::compare_versions;

/// Where the orchestrator is within an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPhase {
    Idle,
    TrackingEnsured,
    PendingComputed,
    /// Index into the pending list.
    Applying(usize),
    RollingBack,
}

impl fmt::Display for SeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedPhase::Idle => f.write_str("idle"),
            SeedPhase::TrackingEnsured => f.write_str("tracking_ensured"),
            SeedPhase::PendingComputed => f.write_str("pending_computed"),
            SeedPhase::Applying(i) => write!(f, "applying({})", i),
            SeedPhase::RollingBack => f.write_str("rolling_back"),
        }
    }
}

/// Outcome of a tracked apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub environment: String,
    /// Versions applied by this call, in order. Empty when nothing was pending.
    pub applied: Vec<String>,
}

/// Outcome of a manual apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualReport {
    pub environment: String,
    pub files: Vec<PathBuf>,
}

/// Seed state of one environment, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedStatus {
    pub environment: String,
    pub available: Vec<String>,
    pub applied: Vec<String>,
    pub pending: Vec<String>,
    pub latest_applied: Option<String>,
    pub total_available: usize,
    pub total_applied: usize,
    pub total_pending: usize,
    pub checked_at: DateTime<Utc>,
}

/// Available versions not yet applied, ascending.
pub fn compute_pending(available: &[String], applied: &[String]) -> Vec<String> {
    let mut pending: Vec<String> = available
        .iter()
        .filter(|v| !applied.contains(v))
        .cloned()
        .collect();
    pending.sort_by(|a, b| compare_versions(a, b));
    pending.dedup();
    pending
}

/// Applies and rolls back per-environment seed files.
///
/// Every statement commits on its own. A failing statement aborts the call;
/// statements and versions applied before it stay applied.
pub struct SeedOrchestrator<DB: SqlDialect> {
    pool: Pool<DB>,
    tracker: SeedTracker<DB>,
    seeds_root: PathBuf,
    phase: SeedPhase,
}

impl<DB: SqlDialect> SeedOrchestrator<DB> {
    pub fn new(pool: Pool<DB>, seeds_root: impl Into<PathBuf>) -> Self {
        Self {
            tracker: SeedTracker::new(pool.clone()),
            pool,
            seeds_root: seeds_root.into(),
            phase: SeedPhase::Idle,
        }
    }

    pub fn from_settings(pool: Pool<DB>, settings: &Settings) -> Self {
        Self::new(pool, settings.seeds_dir.clone())
    }

    pub fn phase(&self) -> SeedPhase {
        self.phase
    }

    pub fn tracker(&self) -> &SeedTracker<DB> {
        &self.tracker
    }

    pub fn catalog(&self, environment: &str) -> DriftResult<SeedCatalog> {
        SeedCatalog::scan(&self.seeds_root, environment)
    }

    fn enter(&mut self, phase: SeedPhase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "seed phase");
        }
        self.phase = phase;
    }

    fn finish<T>(&mut self, result: DriftResult<T>) -> DriftResult<T> {
        self.enter(SeedPhase::Idle);
        result
    }

    /// Pending versions for `environment`. Ensures the tracking table exists.
    pub async fn pending(&mut self, environment: &str) -> DriftResult<Vec<String>> {
        let result = self.compute(environment).await.map(|(_, pending)| pending);
        self.finish(result)
    }

    async fn compute(&mut self, environment: &str) -> DriftResult<(SeedCatalog, Vec<String>)> {
        self.tracker.ensure_table().await?;
        self.enter(SeedPhase::TrackingEnsured);
        let catalog = self.catalog(environment)?;
        let applied = self.tracker.applied_versions(environment).await?;
        let pending = compute_pending(&catalog.versions(), &applied);
        self.enter(SeedPhase::PendingComputed);
        Ok((catalog, pending))
    }

    /// Applies every pending version in ascending order and records each one.
    pub async fn run_tracked(&mut self, environment: &str) -> DriftResult<ApplyReport> {
        let result = self.run_tracked_inner(environment).await;
        self.finish(result)
    }

    async fn run_tracked_inner(&mut self, environment: &str) -> DriftResult<ApplyReport> {
        println!(">> Running tracked seeds for environment: {}", environment);
        let (catalog, pending) = self.compute(environment).await?;
        let mut report = ApplyReport {
            environment: environment.to_owned(),
            applied: Vec::new(),
        };

        if pending.is_empty() {
            println!("[INFO] No pending seeds for environment: {}", environment);
            return Ok(report);
        }
        println!(
            "[INFO] Found {} pending seeds: {}",
            pending.len(),
            pending.join(", ")
        );

        for (index, version) in pending.iter().enumerate() {
            self.enter(SeedPhase::Applying(index));
            let Some(path) = catalog.up_path(version) else {
                println!("[WARN] Could not find seed file for version {}", version);
                continue;
            };
            tracing::info!(
                operation = "seed_apply",
                environment = %environment,
                version = %version,
                file = %path.display(),
                "driftwood seed"
            );
            self.execute_file(path).await?;
            self.tracker.mark_applied(environment, version).await?;
            println!("[OK] Applied seed version {}", version);
            report.applied.push(version.clone());
        }

        println!(
            "[OK] All pending seeds applied for environment: {}",
            environment
        );
        Ok(report)
    }

    /// Executes every up file of the environment in file-name order, without tracking.
    pub async fn run_manual(&mut self, environment: &str) -> DriftResult<ManualReport> {
        let result = self.run_manual_inner(environment).await;
        self.finish(result)
    }

    async fn run_manual_inner(&mut self, environment: &str) -> DriftResult<ManualReport> {
        println!(">> Running seeds manually for environment: {}", environment);
        let catalog = self.catalog(environment)?;
        let files = catalog.up_files().to_vec();
        if files.is_empty() {
            println!("[INFO] No seed files found for environment: {}", environment);
        }

        for (index, path) in files.iter().enumerate() {
            self.enter(SeedPhase::Applying(index));
            tracing::info!(
                operation = "seed_apply",
                environment = %environment,
                file = %path.display(),
                tracked = false,
                "driftwood seed"
            );
            self.execute_file(path).await?;
            println!("[OK] Executed seed file: {}", path.display());
        }

        Ok(ManualReport {
            environment: environment.to_owned(),
            files,
        })
    }

    /// Rolls back the lexically last applied version. `None` when nothing is applied.
    pub async fn rollback(&mut self, environment: &str) -> DriftResult<Option<String>> {
        let result = self.rollback_inner(environment).await;
        self.finish(result)
    }

    async fn rollback_inner(&mut self, environment: &str) -> DriftResult<Option<String>> {
        println!(">> Rolling back last seed for environment: {}", environment);
        self.tracker.ensure_table().await?;
        self.enter(SeedPhase::TrackingEnsured);

        let applied = self.tracker.applied_versions(environment).await?;
        let Some(last) = applied.last().cloned() else {
            println!("[INFO] No seeds to rollback for environment: {}", environment);
            return Ok(None);
        };

        self.enter(SeedPhase::RollingBack);
        let catalog = self.catalog(environment)?;
        let down = catalog.find_down_file(&last)?.ok_or_else(|| {
            DriftError::VersionConflict(format!(
                "could not find rollback file for seed version {}",
                last
            ))
        })?;

        tracing::info!(
            operation = "seed_rollback",
            environment = %environment,
            version = %last,
            file = %down.display(),
            "driftwood seed"
        );
        self.execute_file(&down).await?;
        self.tracker.mark_unapplied(environment, &last).await?;
        println!("[OK] Rolled back seed version {}", last);
        Ok(Some(last))
    }

    /// Applied / pending breakdown for `environment`.
    pub async fn status(&mut self, environment: &str) -> DriftResult<SeedStatus> {
        let result = self.status_inner(environment).await;
        self.finish(result)
    }

    async fn status_inner(&mut self, environment: &str) -> DriftResult<SeedStatus> {
        let (catalog, pending) = self.compute(environment).await?;
        let applied = self.tracker.applied_versions(environment).await?;
        let available = catalog.versions();
        Ok(SeedStatus {
            environment: environment.to_owned(),
            latest_applied: applied.last().cloned(),
            total_available: available.len(),
            total_applied: applied.len(),
            total_pending: pending.len(),
            available,
            applied,
            pending,
            checked_at: Utc::now(),
        })
    }

    /// Runs the statements of one file in order. Returns the number executed.
    pub async fn execute_file(&self, path: &Path) -> DriftResult<usize> {
        let content =
            std::fs::read_to_string(path).map_err(|err| DriftError::file_io(path, err))?;
        let statements = split_statements(&content);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if statements.is_empty() {
            println!("[INFO] No SQL statements found in {}, skipping", file_name);
            return Ok(0);
        }

        for statement in &statements {
            tracing::info!(
                operation = "seed_statement",
                file = %file_name,
                sql = %preview(statement),
                "driftwood seed"
            );
            DB::execute(&self.pool, statement, &[])
                .await
                .map_err(|source| DriftError::StatementExecution {
                    file: path.to_path_buf(),
                    statement: statement.clone(),
                    source,
                })?;
        }
        Ok(statements.len())
    }
}
