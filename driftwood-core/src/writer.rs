use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::diff::ChangeDescriptor;
use crate::error::{DriftError, DriftResult};
use crate::version::numeric_prefix;

/// Forward and backward SQL of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub up: String,
    pub down: String,
}

impl MigrationScript {
    /// Placeholder script for hand-written migrations.
    pub fn template(name: &str) -> Self {
        Self {
            up: format!(
                "-- Migration: {}\n-- Add your forward migration SQL here\n",
                name
            ),
            down: format!(
                "-- Rollback migration: {}\n-- Add your rollback migration SQL here\n",
                name
            ),
        }
    }

    /// Script built from detected changes. Down statements run in reverse order.
    pub fn from_changes(name: &str, changes: &[ChangeDescriptor]) -> Self {
        let mut up = format!(
            "-- Migration: {}\n-- Auto-generated based on model changes\n\n",
            name
        );
        let mut down = format!(
            "-- Rollback migration: {}\n-- Auto-generated rollback\n\n",
            name
        );

        if changes.is_empty() {
            up.push_str("-- No model changes detected\n");
            down.push_str("-- No rollback needed\n");
        } else {
            for change in changes {
                up.push_str(&change.up_sql);
                up.push('\n');
            }
            for change in changes.iter().rev() {
                down.push_str(&change.down_sql);
                down.push('\n');
            }
        }

        Self { up, down }
    }
}

/// Paths of a written migration pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenMigration {
    pub version: u64,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// Assigns versions and persists `<version>_<name>.{up,down}.sql` pairs.
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Highest numeric prefix among `*.up.sql` files plus one; 1 for a missing or empty directory.
    pub fn next_version(&self) -> DriftResult<u64> {
        if !self.dir.exists() {
            return Ok(1);
        }

        let mut max_version = 0;
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&self.dir).to_path_buf();
                DriftError::file_io(path, err.into())
            })?;
            let file_name = entry.file_name().to_string_lossy();
            if !file_name.ends_with(".up.sql") {
                continue;
            }
            if let Some(version) = numeric_prefix(&file_name) {
                max_version = max_version.max(version);
            }
        }
        Ok(max_version + 1)
    }

    /// Writes both files under the next version. Existing files are never overwritten.
    pub fn write(&self, name: &str, script: &MigrationScript) -> DriftResult<WrittenMigration> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(DriftError::Migration(format!(
                "invalid migration name `{}`",
                name
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|err| DriftError::file_io(&self.dir, err))?;
        let version = self.next_version()?;
        let up_path = self.dir.join(format!("{}_{}.up.sql", version, name));
        let down_path = self.dir.join(format!("{}_{}.down.sql", version, name));

        for path in [&up_path, &down_path] {
            if path.exists() {
                return Err(DriftError::file_io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::AlreadyExists, "file already exists"),
                ));
            }
        }
        write_new(&up_path, &script.up)?;
        if let Err(err) = write_new(&down_path, &script.down) {
            // an orphan up file would shift every later version
            let _ = fs::remove_file(&up_path);
            return Err(err);
        }

        tracing::info!(
            operation = "migration_write",
            version,
            name = %name,
            "driftwood migration"
        );
        Ok(WrittenMigration {
            version,
            up_path,
            down_path,
        })
    }
}

fn write_new(path: &Path, content: &str) -> DriftResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| DriftError::file_io(path, err))?;
    file.write_all(content.as_bytes())
        .map_err(|err| DriftError::file_io(path, err))
}
