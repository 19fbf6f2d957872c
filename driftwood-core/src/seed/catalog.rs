use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{DriftError, DriftResult};
use crate::version::{compare_versions, version_token};

/// Seed files sharing one version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFileReference {
    pub version: String,
    pub up_path: PathBuf,
    /// Only needed for rollback.
    pub down_path: Option<PathBuf>,
}

/// Indexed view of `seeds/<environment>/`, built in one directory pass.
///
/// Files are visited in lexical file-name order. When several files share a
/// version token, the first one in that order is used for both the up and
/// the down direction; the others are ignored with a warning.
#[derive(Debug, Clone, Default)]
pub struct SeedCatalog {
    environment: String,
    dir: PathBuf,
    up_files: Vec<PathBuf>,
    entries: Vec<SeedFileReference>,
}

impl SeedCatalog {
    /// Scans `seeds_root/environment`. A missing directory is an empty catalog.
    pub fn scan(seeds_root: &Path, environment: &str) -> DriftResult<Self> {
        let dir = seeds_root.join(environment);
        let mut catalog = SeedCatalog {
            environment: environment.to_owned(),
            dir: dir.clone(),
            ..Default::default()
        };
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "seed directory not found");
            return Ok(catalog);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&dir).to_path_buf();
                DriftError::file_io(path, err.into())
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        let mut ups: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut downs: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let (is_up, target) = if file_name.ends_with(".up.sql") {
                (true, &mut ups)
            } else if file_name.ends_with(".down.sql") {
                (false, &mut downs)
            } else {
                continue;
            };

            let Some(version) = version_token(file_name).map(str::to_owned) else {
                tracing::warn!(file = %file_name, "seed file has no version prefix; skipped by tracking");
                if is_up {
                    catalog.up_files.push(path);
                }
                continue;
            };

            if let Some(existing) = target.get(&version) {
                tracing::warn!(
                    version = %version,
                    used = %existing.display(),
                    ignored = %path.display(),
                    "several seed files share a version; using the first"
                );
            } else {
                target.insert(version, path.clone());
            }
            if is_up {
                catalog.up_files.push(path);
            }
        }

        catalog.entries = ups
            .into_iter()
            .map(|(version, up_path)| SeedFileReference {
                down_path: downs.remove(&version),
                version,
                up_path,
            })
            .collect();
        catalog
            .entries
            .sort_by(|a, b| compare_versions(&a.version, &b.version));
        Ok(catalog)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Versioned entries, ascending.
    pub fn entries(&self) -> &[SeedFileReference] {
        &self.entries
    }

    /// Distinct version tokens, ascending.
    pub fn versions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.version.clone()).collect()
    }

    /// Every `*.up.sql` file in file-name order, versioned or not.
    pub fn up_files(&self) -> &[PathBuf] {
        &self.up_files
    }

    pub fn get(&self, version: &str) -> Option<&SeedFileReference> {
        self.entries.iter().find(|e| e.version == version)
    }

    pub fn up_path(&self, version: &str) -> Option<&Path> {
        self.get(version).map(|e| e.up_path.as_path())
    }

    pub fn down_path(&self, version: &str) -> Option<&Path> {
        self.get(version).and_then(|e| e.down_path.as_deref())
    }

    /// Finds a down file for a version that may no longer have an up file.
    pub(crate) fn find_down_file(&self, version: &str) -> DriftResult<Option<PathBuf>> {
        if let Some(path) = self.down_path(version) {
            return Ok(Some(path.to_path_buf()));
        }
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{}_", version);
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| DriftError::file_io(&self.dir, err.into()))?;
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".down.sql") {
                return Ok(Some(entry.into_path()));
            }
        }
        Ok(None)
    }
}

/// Sorted names of the environment directories under `seeds_root`.
/// A missing root yields an empty list.
pub fn list_environments(seeds_root: &Path) -> DriftResult<Vec<String>> {
    if !seeds_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut environments = Vec::new();
    for entry in WalkDir::new(seeds_root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| DriftError::file_io(seeds_root, err.into()))?;
        if entry.file_type().is_dir() {
            environments.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    environments.sort();
    Ok(environments)
}
