//! Remote document listing and lookup.

use crate::error::{ExportError, Result};
use bridge_traits::storage::{DocumentService, RemoteDocument};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// MIME type of native Google Docs documents
pub const NATIVE_DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Native Google Docs document, exportable to DOCX and PDF
    NativeDocument,
    Other,
}

impl DocumentKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type == NATIVE_DOCUMENT_MIME_TYPE {
            DocumentKind::NativeDocument
        } else {
            DocumentKind::Other
        }
    }
}

/// A remote document as shown to the user.
///
/// `display_name` is only used for naming output files and may repeat
/// across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub display_name: String,
    pub kind: DocumentKind,
}

impl DocumentRef {
    /// Reference known only by id; the id doubles as its display name until
    /// the metadata has been fetched
    pub fn unresolved(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            kind: DocumentKind::Other,
        }
    }
}

impl From<RemoteDocument> for DocumentRef {
    fn from(document: RemoteDocument) -> Self {
        let kind = DocumentKind::from_mime(&document.mime_type);
        Self {
            id: document.id,
            display_name: document.name,
            kind,
        }
    }
}

/// Read-only view over the documents visible to the authenticated user
#[derive(Clone)]
pub struct DocumentDirectory {
    service: Arc<dyn DocumentService>,
}

impl DocumentDirectory {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self { service }
    }

    /// Every document visible to the user, in provider order
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<DocumentRef>> {
        let documents: Vec<DocumentRef> = self
            .service
            .list_files()
            .await?
            .into_iter()
            .map(DocumentRef::from)
            .collect();

        info!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// Only native documents, in provider order
    pub async fn list_native(&self) -> Result<Vec<DocumentRef>> {
        let documents: Vec<DocumentRef> = self
            .list()
            .await?
            .into_iter()
            .filter(|document| document.kind == DocumentKind::NativeDocument)
            .collect();

        debug!(count = documents.len(), "Filtered native documents");
        Ok(documents)
    }

    /// Canonical metadata for one document
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<DocumentRef> {
        self.service
            .get_file(id)
            .await
            .map(DocumentRef::from)
            .map_err(|e| ExportError::from_lookup(e, id))
    }
}

/// Extract a document id from either a bare id or a document URL.
///
/// For URLs the id is the path segment following `/d/`, so both
/// `https://docs.google.com/document/d/<id>/edit` and the same address
/// without `/edit` work.
///
/// ```
/// use core_export::directory::parse_document_id;
///
/// let id = parse_document_id("https://docs.google.com/document/d/1oLrOw/edit?tab=t.0").unwrap();
/// assert_eq!(id, "1oLrOw");
/// assert_eq!(parse_document_id("1oLrOw").unwrap(), "1oLrOw");
/// ```
pub fn parse_document_id(input: &str) -> Result<String> {
    let input = input.trim();

    let candidate = match input.find("/d/") {
        Some(start) => {
            let rest = &input[start + 3..];
            let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
            &rest[..end]
        }
        None => input,
    };

    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(candidate.to_string())
    } else {
        Err(ExportError::InvalidDocumentId(input.to_string()))
    }
}
