use std::path::PathBuf;

/// Fallback connection string when nothing else is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:driftwood.db";

/// Process configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Connection string handed to sqlx.
    pub database_url: String,
    /// Directory holding `<version>_<name>.{up,down}.sql` schema migrations.
    pub migrations_dir: PathBuf,
    /// Root directory holding one sub-directory of seed files per environment.
    pub seeds_dir: PathBuf,
    /// Prefix applied to table names derived from model names.
    pub table_prefix: String,
    /// `debug` or `release`; picks the default environment.
    pub run_mode: String,
    /// Explicit environment from `APP_ENV`, if any.
    pub app_env: Option<String>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .or_else(|| {
                let name = get("DB_NAME")?;
                let user = get("DB_USER").unwrap_or_else(|| "root".to_owned());
                let password = get("DB_PASSWORD").unwrap_or_default();
                let host = get("DB_HOST").unwrap_or_else(|| "127.0.0.1:3306".to_owned());
                Some(format!("mysql://{}:{}@{}/{}", user, password, host, name))
            })
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());

        Self {
            database_url,
            migrations_dir: get("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("migrations")),
            seeds_dir: get("SEEDS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("seeds")),
            table_prefix: get("DB_TABLE_PREFIX").unwrap_or_default(),
            run_mode: get("RUN_MODE").unwrap_or_else(|| "debug".to_owned()),
            app_env: get("APP_ENV"),
        }
    }

    /// Replaces the connection string, e.g. from a `--database` flag.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database_url = url;
        }
        self
    }

    /// Explicit flag, then `APP_ENV`, then the run-mode default.
    pub fn resolve_environment(&self, explicit: Option<&str>) -> String {
        if let Some(env) = explicit.map(str::trim).filter(|e| !e.is_empty()) {
            return env.to_owned();
        }
        if let Some(env) = &self.app_env {
            return env.clone();
        }
        if self.run_mode == "debug" {
            "development".to_owned()
        } else {
            "production".to_owned()
        }
    }

    /// Table name for a model: prefix plus snake_case of the model name.
    pub fn table_name(&self, model_name: &str) -> String {
        format!(
            "{}{}",
            self.table_prefix,
            crate::model::to_snake_case(model_name)
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
