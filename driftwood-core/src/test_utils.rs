use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::Database;

/// Lightweight test helper for constructing a dedicated pool.
pub struct MockDatabase<DB: Database> {
    pool: sqlx::Pool<DB>,
}

impl<DB: Database> MockDatabase<DB> {
    pub fn pool(&self) -> &sqlx::Pool<DB> {
        &self.pool
    }

    pub fn into_pool(self) -> sqlx::Pool<DB> {
        self.pool
    }
}

#[cfg(feature = "sqlite")]
impl MockDatabase<sqlx::Sqlite> {
    pub async fn new_sqlite() -> Result<Self, sqlx::Error> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Creates a fresh directory under the system temp dir.
pub fn make_temp_dir(label: &str) -> std::io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let count = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "driftwood_{}_{}_{}_{}",
        label,
        std::process::id(),
        nanos,
        count
    ));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes `content` to `dir/name`, creating `dir` when needed.
pub fn write_file(dir: &Path, name: &str, content: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, content)?;
    Ok(path)
}
