//! # Google Drive Provider
//!
//! Implements the `DocumentService` bridge trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated file listing (trashed files excluded)
//! - Single-file metadata lookup
//! - Streamed export of native Google documents to a requested MIME type
//! - Exponential backoff for rate limiting and transient server errors
//!
//! Authentication is not handled here: the connector expects an
//! `HttpClient` that already attaches credentials.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
pub use types::{DriveFile, FilesListResponse};
