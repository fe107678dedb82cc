//! # Host Bridge Traits
//!
//! Capability traits shared by the export core and its host adapters.
//!
//! ## Overview
//!
//! This crate defines the contract between the export core and the concrete
//! implementations that talk to the outside world. Each trait represents a
//! capability the core requires but does not implement itself.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and streaming bodies
//!
//! ### Remote documents
//! - [`DocumentService`](storage::DocumentService) - List, describe and export remote documents
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Implementations should:
//!
//! - Convert library-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., file ids, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds. The export pipeline shares a
//! single `HttpClient` across concurrent workers without taking a lock, so
//! implementations must be safe for concurrent use.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, StreamingResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//!
//!     async fn execute_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse};
pub use storage::{DocumentService, ExportResponse, RemoteDocument};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
