//! # Export Module
//!
//! Document discovery, interactive selection and concurrent export.
//!
//! ## Overview
//!
//! - [`DocumentDirectory`] lists the documents visible to the authenticated
//!   user and resolves a single id to its metadata.
//! - [`ExportPipeline`] exports one document to several formats at once, one
//!   task per format, and reports an outcome for each of them.
//! - [`SelectionFrontend`] lets the user pick a document and then drives the
//!   pipeline for it.
//!
//! Everything talks to the remote side through the `DocumentService` bridge
//! trait, so any provider connector can be plugged in.

pub mod directory;
pub mod error;
pub mod pipeline;
pub mod selection;
pub mod targets;

pub use directory::{parse_document_id, DocumentDirectory, DocumentKind, DocumentRef};
pub use error::{ExportError, Result};
pub use pipeline::{ExportJob, ExportPipeline, JobOutcome, RunSummary};
pub use selection::{
    ConsolePicker, DocumentPicker, FrontendState, PickerView, SelectionEvent, SelectionFrontend,
    SelectionOutcome,
};
pub use targets::{extension_for_mime, ExportTarget, UNKNOWN_EXTENSION};
