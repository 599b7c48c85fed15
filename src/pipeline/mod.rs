//! Run orchestration.
//!
//! One run backs up the previous output documents, queries every selected
//! source for every keyword, renders the results into the README digest and
//! the issue template, patches placeholder dates from downloaded PDFs and
//! archives the digest. Any failure restores the backups.

mod backup;
mod keywords;
mod run;
mod selection;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::sources::SourceError;
use crate::utils::RetryError;

pub use backup::{archive_readme, backup_path, BackupSet};
pub use keywords::{specialise_keyword, VERIFICATION_KEYWORDS};
pub use run::{Pipeline, RunOptions, RunOutcome};
pub use selection::{SourceChoice, SourceSelection};

/// Topic profile of a run
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Keywords are used as given
    #[default]
    General,
    /// Digital design verification and UVM
    Verification,
}

impl Profile {
    /// Keywords of a run under this profile
    pub fn keywords(&self, configured: &[String]) -> Vec<String> {
        match self {
            Profile::General => configured.to_vec(),
            Profile::Verification => VERIFICATION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error("{source_name} is not configured: {error}")]
    SourceConfig {
        source_name: String,
        #[source]
        error: SourceError,
    },

    #[error("No sources selected")]
    NoSources,

    #[error("Failed to access {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            error,
        }
    }
}
