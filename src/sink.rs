//! Report persistence
//!
//! How a finished report reaches storage is up to the host. The engine only
//! hands over the canonical text and a file name through [`ReportSink`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProctorError;

/// Acknowledgement from a sink after a successful hand-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    /// Where the report ended up (path, object key, URL)
    pub location: String,
    pub bytes: usize,
}

pub trait ReportSink {
    fn save(&self, filename: &str, content: &str) -> Result<SaveReceipt, ProctorError>;
}

/// Writes reports into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for FileReportSink {
    fn save(&self, filename: &str, content: &str) -> Result<SaveReceipt, ProctorError> {
        if filename.is_empty() || filename.contains(|c| c == '/' || c == '\\') || filename.starts_with('.') {
            return Err(ProctorError::PersistenceFailed(format!(
                "invalid report file name: {filename:?}"
            )));
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| ProctorError::PersistenceFailed(format!("{}: {e}", self.dir.display())))?;

        let path = self.dir.join(filename);
        fs::write(&path, content)
            .map_err(|e| ProctorError::PersistenceFailed(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "report saved");

        Ok(SaveReceipt {
            location: path.display().to_string(),
            bytes: content.len(),
        })
    }
}
