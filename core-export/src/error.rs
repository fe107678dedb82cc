use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Network error: {0}")]
    Network(#[from] BridgeError),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Export request returned status {status}")]
    ExportStatus { status: u16 },

    #[error("Failed to write {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a document id or URL: {0}")]
    InvalidDocumentId(String),

    #[error("Document picker failed: {0}")]
    Picker(String),

    #[error("Export worker aborted: {0}")]
    WorkerAborted(String),
}

impl ExportError {
    /// Map a bridge failure, keeping "not found" distinct from other network errors
    pub fn from_lookup(error: BridgeError, document_id: &str) -> Self {
        match error {
            BridgeError::NotFound(_) => ExportError::NotFound(document_id.to_string()),
            other => ExportError::Network(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
