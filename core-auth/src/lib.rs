//! # Authentication Module
//!
//! Credential lifecycle for the Google Drive exporter.
//!
//! ## Overview
//!
//! This module turns a one-time interactive OAuth 2.0 authorization into a
//! reusable, persisted access/refresh token pair and hands out an
//! authenticated HTTP transport built on it.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with PKCE (`access_type=offline`)
//! - Client identity read from Google's downloaded `credentials.json`
//! - Atomic, owner-only persistence of the token record
//! - Refresh of expired credentials at startup and transparently mid-run
//! - Pluggable operator prompt for the pasted authorization code

pub mod client_secret;
pub mod coordinator;
pub mod error;
pub mod oauth;
pub mod prompt;
pub mod token_store;
pub mod transport;
pub mod types;

pub use client_secret::{ClientSecret, DRIVE_READONLY_SCOPE};
pub use coordinator::{is_configuration_error, AuthCoordinator};
pub use error::{AuthError, Result};
pub use oauth::{AuthorizationResponse, OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use prompt::{AuthCodePrompt, ConsolePrompt};
pub use token_store::TokenStore;
pub use transport::AuthorizedHttpClient;
pub use types::{AuthState, OAuthTokens};
