//! Credential Persistence
//!
//! Stores the OAuth token record as a JSON file on local disk.
//!
//! ## Guarantees
//!
//! - `load` never fails: a missing, unreadable or corrupt record reads as
//!   `None`, which callers treat as "interactive authorization needed"
//! - `save` replaces the record atomically (temporary file in the same
//!   directory, fsync, rename), so a concurrent reader sees either the old
//!   or the new record and never a truncated one
//! - On Unix the file is only readable by its owner (mode 0600)
//! - Token values are never logged
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{OAuthTokens, TokenStore};
//! use chrono::Utc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! let token_store = TokenStore::new("token.json");
//!
//! let tokens = OAuthTokens::new(
//!     "access_token_value".to_string(),
//!     Some("refresh_token_value".to_string()),
//!     3600,
//!     Utc::now(),
//! );
//!
//! token_store.save(&tokens).await?;
//! let loaded = token_store.load().await;
//! assert_eq!(loaded, Some(tokens));
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use core_runtime::logging::strip_path;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File-backed store for a single credential record
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential, if a usable one exists.
    pub async fn load(&self) -> Option<OAuthTokens> {
        let file = self.display_name();

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %file, "No stored credential");
                return None;
            }
            Err(e) => {
                warn!(file = %file, error = %e, "Failed to read stored credential");
                return None;
            }
        };

        let tokens: OAuthTokens = match serde_json::from_slice(&bytes) {
            Ok(tokens) => tokens,
            Err(e) => {
                // Left on disk; the next successful save overwrites it
                warn!(file = %file, error = %e, "Stored credential is corrupt, ignoring it");
                return None;
            }
        };

        if !tokens.is_usable() {
            warn!(file = %file, "Stored credential has no access token, ignoring it");
            return None;
        }

        debug!(file = %file, expires_at = %tokens.expires_at, "Loaded stored credential");
        Some(tokens)
    }

    /// Persist the credential, atomically replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Persistence`] if the record cannot be written.
    pub async fn save(&self, tokens: &OAuthTokens) -> Result<()> {
        if !tokens.is_usable() {
            return Err(AuthError::Other(
                "refusing to persist a credential without an access token".to_string(),
            ));
        }

        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| AuthError::Other(format!("Failed to serialize credential: {}", e)))?;

        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| AuthError::Other(format!("Credential writer task failed: {}", e)))?;

        result.map_err(|source| AuthError::Persistence {
            path: self.path.clone(),
            source,
        })?;

        info!(file = %self.display_name(), "Credential saved");
        Ok(())
    }

    fn display_name(&self) -> String {
        strip_path(&self.path.to_string_lossy()).to_string()
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    // NamedTempFile is created with mode 0600 on Unix
    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "ya29.a0".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//0g".to_string()),
            expires_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_tokens()).await.unwrap();
        assert_eq!(store.load().await, Some(sample_tokens()));
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_record() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_tokens()).await.unwrap();

        let mut newer = sample_tokens();
        newer.access_token = "ya29.b1".to_string();
        store.save(&newer).await.unwrap();

        assert_eq!(store.load().await.unwrap().access_token, "ya29.b1");
        // No temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));

        store.save(&sample_tokens()).await.unwrap();
        assert!(store.load().await.is_some());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{\"access_token\": ").unwrap();

        let store = TokenStore::new(&path);
        assert_eq!(store.load().await, None);
        // Corrupt records are not deleted
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_empty_access_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"access_token":"","token_type":"Bearer","expiry":"2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(TokenStore::new(&path).load().await, None);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_access_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let mut tokens = sample_tokens();
        tokens.access_token.clear();
        assert!(store.save(&tokens).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store = TokenStore::new(blocker.join("token.json"));
        let err = store.save(&sample_tokens()).await.unwrap_err();
        assert!(matches!(err, AuthError::Persistence { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample_tokens()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
