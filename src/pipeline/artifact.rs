//! Temp artifact: decoded upload bytes persisted for inspection.
//!
//! Every decoded upload is written under the configured uploads dir so a
//! failing request can be reproduced from the exact bytes the service saw.
//! The file is strictly request-scoped and must disappear on *every* exit
//! path — success, validation failure, or panic between creation and
//! response. Wrapping a [`NamedTempFile`] gives us that guarantee through
//! `Drop`, while the explicit [`TempArtifact::release`] keeps removal
//! idempotent and lets cleanup failures be logged without ever replacing
//! the primary response.

use crate::error::ProcessError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

/// A request-scoped file holding the decoded upload bytes.
#[derive(Debug)]
pub struct TempArtifact {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl TempArtifact {
    /// Write `bytes` into a fresh file under `dir`.
    ///
    /// `label` seeds the filename so artifacts are recognisable while they
    /// exist; it is sanitised to a filesystem-safe prefix.
    pub fn write(dir: &Path, label: &str, bytes: &[u8]) -> Result<Self, ProcessError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| ProcessError::Internal(format!("uploads dir: {e}")))?;

        let mut file = Builder::new()
            .prefix(&format!("{}_", sanitize(label)))
            .tempfile_in(dir)
            .map_err(|e| ProcessError::Internal(format!("temp artifact: {e}")))?;
        file.write_all(bytes)
            .map_err(|e| ProcessError::Internal(format!("temp artifact write: {e}")))?;

        let path = file.path().to_path_buf();
        debug!("wrote temp artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Path of the artifact while it exists.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the artifact. Idempotent: releasing twice is a no-op.
    ///
    /// Removal failures are logged and swallowed — cleanup must never mask
    /// the response already chosen for the request.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                warn!("failed to remove temp artifact {}: {e}", self.path.display());
            } else {
                debug!("released temp artifact {}", self.path.display());
            }
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.release();
    }
}

/// Keep filenames boring: alphanumerics, dash, underscore, dot.
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(48)
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
