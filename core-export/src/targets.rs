//! Export formats and their file extensions.

use core_runtime::config::{DOCX_MIME_TYPE, PDF_MIME_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension used for MIME types outside the known set
pub const UNKNOWN_EXTENSION: &str = "unknown";

/// File extension for an export MIME type.
///
/// ```
/// use core_export::targets::extension_for_mime;
///
/// assert_eq!(extension_for_mime("application/pdf"), "pdf");
/// assert_eq!(extension_for_mime("text/markdown"), "unknown");
/// ```
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        PDF_MIME_TYPE => "pdf",
        DOCX_MIME_TYPE => "docx",
        _ => UNKNOWN_EXTENSION,
    }
}

/// One representation to export a document in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportTarget {
    pub mime_type: String,
    pub file_extension: String,
}

impl ExportTarget {
    pub fn from_mime(mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let file_extension = extension_for_mime(&mime_type).to_string();
        Self {
            mime_type,
            file_extension,
        }
    }

    pub fn docx() -> Self {
        Self::from_mime(DOCX_MIME_TYPE)
    }

    pub fn pdf() -> Self {
        Self::from_mime(PDF_MIME_TYPE)
    }

    /// The standard pair, DOCX then PDF
    pub fn defaults() -> Vec<Self> {
        vec![Self::docx(), Self::pdf()]
    }

    /// Output file name for a document with the given display name
    pub fn file_name(&self, display_name: &str) -> String {
        format!("{}.{}", display_name, self.file_extension)
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_extension)
    }
}
