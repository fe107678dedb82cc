//! # Application Configuration Module
//!
//! Provides configuration management for the exporter.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an `AppConfig`
//! instance that holds every path and setting the other crates are wired
//! from. It enforces fail-fast validation so that a bad configuration is
//! rejected before any file or network activity happens.
//!
//! ## Defaults
//!
//! | Setting              | Default            |
//! |----------------------|--------------------|
//! | client secret file   | `credentials.json` |
//! | credential file      | `token.json`       |
//! | output directory     | `exports`          |
//! | export MIME types    | DOCX, PDF          |
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::builder()
//!     .output_dir("/tmp/exports")
//!     .token_path("/tmp/token.json")
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.export_mime_types.len(), 2);
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use std::collections::HashSet;
use std::path::PathBuf;

/// MIME type for Office Open XML word-processing documents
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type for PDF documents
pub const PDF_MIME_TYPE: &str = "application/pdf";

pub const DEFAULT_CLIENT_SECRET_PATH: &str = "credentials.json";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const DEFAULT_OUTPUT_DIR: &str = "exports";

/// Validated application configuration.
///
/// Use [`AppConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OAuth client identity file, read once at startup
    pub client_secret_path: PathBuf,

    /// Persisted credential record
    pub token_path: PathBuf,

    /// Directory receiving exported files
    pub output_dir: PathBuf,

    /// MIME types requested from the export endpoint, in worker order
    pub export_mime_types: Vec<String>,

    /// Logging setup
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - No path is empty
    /// - At least one export MIME type is requested
    /// - Export MIME types are non-empty and not repeated
    pub fn validate(&self) -> Result<()> {
        if self.client_secret_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "Client secret path cannot be empty".to_string(),
            ));
        }

        if self.token_path.as_os_str().is_empty() {
            return Err(Error::Config("Token path cannot be empty".to_string()));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Output directory cannot be empty".to_string(),
            ));
        }

        if self.export_mime_types.is_empty() {
            return Err(Error::Config(
                "At least one export MIME type is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for mime_type in &self.export_mime_types {
            if mime_type.trim().is_empty() {
                return Err(Error::Config(
                    "Export MIME types cannot be empty".to_string(),
                ));
            }
            if !seen.insert(mime_type.as_str()) {
                return Err(Error::Config(format!(
                    "Export MIME type '{}' requested more than once",
                    mime_type
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    client_secret_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    export_mime_types: Option<Vec<String>>,
    logging: Option<LoggingConfig>,
}

impl AppConfigBuilder {
    pub fn client_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret_path = Some(path.into());
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Replace the requested export MIME types
    pub fn export_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.export_mime_types = Some(mime_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig> {
        let config = AppConfig {
            client_secret_path: self
                .client_secret_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET_PATH)),
            token_path: self
                .token_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            export_mime_types: self.export_mime_types.unwrap_or_else(|| {
                vec![DOCX_MIME_TYPE.to_string(), PDF_MIME_TYPE.to_string()]
            }),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::LogLevel;

    #[test]
    fn test_defaults() {
        let config = AppConfig::builder().build().unwrap();

        assert_eq!(config.client_secret_path, PathBuf::from("credentials.json"));
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.output_dir, PathBuf::from("exports"));
        assert_eq!(
            config.export_mime_types,
            vec![DOCX_MIME_TYPE.to_string(), PDF_MIME_TYPE.to_string()]
        );
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::builder()
            .client_secret_path(dir.path().join("client.json"))
            .token_path(dir.path().join("tok.json"))
            .output_dir(dir.path().join("out"))
            .export_mime_types(["application/pdf"])
            .logging(LoggingConfig::default().with_level(LogLevel::Debug))
            .build()
            .unwrap();

        assert_eq!(config.client_secret_path, dir.path().join("client.json"));
        assert_eq!(config.token_path, dir.path().join("tok.json"));
        assert_eq!(config.output_dir, dir.path().join("out"));
        assert_eq!(config.export_mime_types, vec!["application/pdf".to_string()]);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_rejects_empty_paths() {
        let err = AppConfig::builder().token_path("").build().unwrap_err();
        assert!(err.to_string().contains("Token path"));

        let err = AppConfig::builder().output_dir("").build().unwrap_err();
        assert!(err.to_string().contains("Output directory"));

        let err = AppConfig::builder()
            .client_secret_path("")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Client secret"));
    }

    #[test]
    fn test_rejects_bad_mime_types() {
        let err = AppConfig::builder()
            .export_mime_types(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("At least one"));

        let err = AppConfig::builder()
            .export_mime_types([PDF_MIME_TYPE, PDF_MIME_TYPE])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let err = AppConfig::builder()
            .export_mime_types(["  "])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_unknown_mime_type_is_accepted() {
        let config = AppConfig::builder()
            .export_mime_types(["text/markdown"])
            .build()
            .unwrap();
        assert_eq!(config.export_mime_types, vec!["text/markdown".to_string()]);
    }
}
