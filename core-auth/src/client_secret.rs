//! OAuth client identity loaded from Google's downloaded `credentials.json`.
//!
//! The Cloud Console hands out one of two shapes depending on the client type:
//!
//! ```json
//! {"installed": {"client_id": "...", "client_secret": "...",
//!                "auth_uri": "...", "token_uri": "...",
//!                "redirect_uris": ["http://localhost"]}}
//! ```
//!
//! or the same object under a `"web"` key. Both are accepted.

use crate::error::{AuthError, Result};
use crate::oauth::OAuthConfig;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only access to Drive file content and metadata
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
const LOOPBACK_REDIRECT: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecret {
    /// Load and parse the client secret file.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ConfigMissing`] if the file does not exist
    /// - [`AuthError::ConfigInvalid`] if it cannot be read or parsed
    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AuthError::ConfigMissing {
                    path: path.to_path_buf(),
                }
            } else {
                AuthError::ConfigInvalid {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        let secret = Self::from_json(&bytes).map_err(|reason| AuthError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(auth_uri = %secret.auth_uri, "Loaded OAuth client secret");
        Ok(secret)
    }

    fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let file: ClientSecretFile =
            serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

        let secret = file
            .installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())?;

        if secret.client_id.trim().is_empty() {
            return Err("client_id is empty".to_string());
        }

        Ok(secret)
    }

    /// Redirect URI used in the authorization request.
    ///
    /// Google no longer honors the out-of-band URN, so the first other entry
    /// wins; with none listed the loopback address is used.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .iter()
            .find(|uri| uri.as_str() != OUT_OF_BAND_REDIRECT)
            .or_else(|| self.redirect_uris.first())
            .map(String::as_str)
            .unwrap_or(LOOPBACK_REDIRECT)
    }

    /// Flow configuration requesting the read-only Drive scope
    pub fn to_oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            redirect_uri: self.redirect_uri().to_string(),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            auth_url: self.auth_uri.clone(),
            token_url: self.token_uri.clone(),
        }
    }
}
