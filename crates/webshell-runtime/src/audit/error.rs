//! Audit sink errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open audit file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write audit record: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}
