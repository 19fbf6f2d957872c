use std::path::PathBuf;

/// Driftwood error type with actionable variants.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    /// The database could not be reached.
    #[error("cannot connect to database: {0}")]
    Connection(#[source] sqlx::Error),
    /// A schema query failed for a reason other than the table being absent.
    #[error("failed to introspect table `{table}`: {source}")]
    Introspection { table: String, source: sqlx::Error },
    /// A migration or seed file could not be read or written.
    #[error("file error at {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },
    /// One statement of a seed or migration file failed.
    #[error("statement failed in {}: {statement}: {source}", file.display())]
    StatementExecution {
        file: PathBuf,
        statement: String,
        source: sqlx::Error,
    },
    /// Missing down file, or a version the tracker already holds.
    #[error("version conflict: {0}")]
    VersionConflict(String),
    /// A previous migration failed half way and left the dirty flag set.
    #[error("database is dirty at version {0}; fix it manually and run `migrate force`")]
    DirtyDatabase(u64),
    /// Migration set inconsistent with the requested operation.
    #[error("migration error: {0}")]
    Migration(String),
    /// Model sources could not be read into definitions.
    #[error("model scan failed: {0}")]
    Scan(String),
    /// Generic database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result alias for driftwood operations.
pub type DriftResult<T> = Result<T, DriftError>;

impl DriftError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn introspection(table: &str, source: sqlx::Error) -> Self {
        Self::Introspection {
            table: table.to_owned(),
            source,
        }
    }
}

/// Returns true when the database rejected a row because of a unique or primary key constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return true;
            }
            let message = db.message().to_ascii_lowercase();
            message.contains("unique constraint") || message.contains("duplicate entry")
        }
        _ => false,
    }
}
