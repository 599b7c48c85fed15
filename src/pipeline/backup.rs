//! Backup, restore and archive of the output documents.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::PipelineError;

/// Sibling path `<file>.<suffix>`
pub fn backup_path(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(OsString::from(format!(".{}", suffix)));
    PathBuf::from(name)
}

/// Output documents moved aside for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    files: Vec<PathBuf>,
    suffix: String,
}

impl BackupSet {
    pub fn new(files: Vec<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            files,
            suffix: suffix.into(),
        }
    }

    /// Move every existing document to its backup path
    pub fn backup(&self) -> Result<(), PipelineError> {
        for file in &self.files {
            if !file.exists() {
                tracing::info!("{} not found, skipping backup", file.display());
                continue;
            }
            let target = backup_path(file, &self.suffix);
            std::fs::rename(file, &target).map_err(|e| PipelineError::io(file, e))?;
            tracing::debug!("Backed up {} to {}", file.display(), target.display());
        }
        Ok(())
    }

    /// Move every backup back over its document
    pub fn restore(&self) -> Result<(), PipelineError> {
        for file in &self.files {
            let source = backup_path(file, &self.suffix);
            if !source.exists() {
                tracing::info!("{} not found, skipping restore", source.display());
                continue;
            }
            std::fs::rename(&source, file).map_err(|e| PipelineError::io(&source, e))?;
            tracing::debug!("Restored {} from {}", file.display(), source.display());
        }
        Ok(())
    }

    /// Delete the backups after a successful run
    pub fn remove(&self) -> Result<(), PipelineError> {
        for file in &self.files {
            let target = backup_path(file, &self.suffix);
            if target.exists() {
                std::fs::remove_file(&target).map_err(|e| PipelineError::io(&target, e))?;
                tracing::debug!("Removed {}", target.display());
            }
        }
        Ok(())
    }
}

/// Copy the digest to `<archive_dir>/<date>.md`
pub fn archive_readme(readme: &Path, archive_dir: &Path, date: &str) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(archive_dir).map_err(|e| PipelineError::io(archive_dir, e))?;
    let target = archive_dir.join(format!("{}.md", date));
    std::fs::copy(readme, &target).map_err(|e| PipelineError::io(readme, e))?;
    tracing::info!("Created archive: {}", target.display());
    Ok(target)
}
