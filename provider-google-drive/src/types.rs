//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use bridge_traits::storage::RemoteDocument;
use serde::{Deserialize, Serialize};

/// Google Drive API file resource, reduced to the fields the exporter asks for
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    pub mime_type: String,

    /// Whether file is trashed
    #[serde(default)]
    pub trashed: bool,
}

impl From<DriveFile> for RemoteDocument {
    fn from(file: DriveFile) -> Self {
        RemoteDocument {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
        }
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// List of files
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,

    /// Whether the result may be missing files from some corpora
    #[serde(default)]
    pub incomplete_search: bool,
}

/// Error envelope returned by Google APIs
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorResponse {
    /// Human-readable message from an error body, falling back to the raw text
    pub fn message_from(body: &[u8]) -> String {
        match serde_json::from_slice::<ApiErrorResponse>(body) {
            Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
            _ => String::from_utf8_lossy(body).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_drive_file() {
        let json = r#"{
            "id": "abc123",
            "name": "Quarterly Report",
            "mimeType": "application/vnd.google-apps.document"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.name, "Quarterly Report");
        assert_eq!(file.mime_type, "application/vnd.google-apps.document");
        assert!(!file.trashed);

        let document: RemoteDocument = file.into();
        assert_eq!(document.name, "Quarterly Report");
    }

    #[test]
    fn test_deserialize_files_list() {
        let json = r#"{
            "nextPageToken": "page2",
            "files": [
                {"id": "1", "name": "a", "mimeType": "application/pdf"},
                {"id": "2", "name": "b", "mimeType": "application/vnd.google-apps.document"}
            ]
        }"#;

        let list: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.next_page_token.as_deref(), Some("page2"));
        assert!(!list.incomplete_search);
    }

    #[test]
    fn test_deserialize_empty_files_list() {
        let list: FilesListResponse = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
        assert!(list.next_page_token.is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = br#"{"error": {"code": 404, "message": "File not found: xyz."}}"#;
        assert_eq!(ApiErrorResponse::message_from(body), "File not found: xyz.");
        assert_eq!(ApiErrorResponse::message_from(b"Bad Gateway\n"), "Bad Gateway");
    }
}
