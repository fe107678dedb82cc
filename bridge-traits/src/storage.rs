//! Remote Document Abstractions
//!
//! Provides the provider-agnostic view of a remote document store: listing
//! metadata, describing a single document and exporting it to another format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::http::DynAsyncRead;

/// Metadata for a document held by a remote provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    /// Provider-assigned identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider MIME type
    pub mime_type: String,
}

/// Result of an export call
///
/// Carries the raw status so callers decide what counts as success; the body
/// has not been read yet.
pub struct ExportResponse {
    pub status: u16,
    pub body: Box<DynAsyncRead>,
}

impl ExportResponse {
    /// Only `200 OK` counts as a usable export
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl fmt::Debug for ExportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Remote document service trait
///
/// Implemented by provider connectors (e.g. Google Drive). A single instance
/// is shared by every concurrent export worker.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::DocumentService;
///
/// async fn show(service: &dyn DocumentService) -> Result<()> {
///     for doc in service.list_files().await? {
///         println!("{} ({})", doc.name, doc.id);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// List every document visible to the authenticated principal
    ///
    /// Ordering is provider-defined.
    async fn list_files(&self) -> Result<Vec<RemoteDocument>>;

    /// Fetch metadata for a single document
    ///
    /// Returns `BridgeError::NotFound` when the id is unknown.
    async fn get_file(&self, file_id: &str) -> Result<RemoteDocument>;

    /// Export a document's content as the given MIME type
    ///
    /// A non-OK status is reported in the response rather than as an error.
    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<ExportResponse>;
}
