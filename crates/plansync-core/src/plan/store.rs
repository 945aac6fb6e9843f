//! On-disk plan storage.
//!
//! The plan document is a single YAML file. The store reads it once per run,
//! copies it to a sibling backup before the first mutation, and writes the
//! mutated plan back over the original path.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::model::ImplementationPlan;

/// Errors from reading, backing up, or writing a plan document.
#[derive(Debug, Error)]
pub enum PlanStoreError {
    #[error("plan file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read plan file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write plan file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plan file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize plan: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to back up {from} to {to}: {source}")]
    Backup {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Sibling backup path: `plan.yaml` becomes `plan.backup.yaml`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.backup.{}", ext.to_string_lossy()),
        None => format!("{stem}.backup"),
    };
    path.with_file_name(name)
}

/// A plan document at a fixed path.
#[derive(Debug, Clone)]
pub struct PlanStore {
    path: PathBuf,
}

impl PlanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<ImplementationPlan, PlanStoreError> {
        if !self.exists() {
            return Err(PlanStoreError::Missing(self.path.clone()));
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|source| PlanStoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        let plan: ImplementationPlan =
            serde_yaml::from_str(&contents).map_err(|source| PlanStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), items = plan.items.len(), "loaded plan");
        Ok(plan)
    }

    /// Copy the current document to its backup path and return that path.
    pub fn backup(&self) -> Result<PathBuf, PlanStoreError> {
        if !self.exists() {
            return Err(PlanStoreError::Missing(self.path.clone()));
        }
        let to = self.backup_path();
        std::fs::copy(&self.path, &to).map_err(|source| PlanStoreError::Backup {
            from: self.path.clone(),
            to: to.clone(),
            source,
        })?;
        info!(backup = %to.display(), "created plan backup");
        Ok(to)
    }

    /// Overwrite the document with `plan`.
    pub fn save(&self, plan: &ImplementationPlan) -> Result<(), PlanStoreError> {
        let contents = serde_yaml::to_string(plan)?;
        std::fs::write(&self.path, contents).map_err(|source| PlanStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "saved plan");
        Ok(())
    }
}
