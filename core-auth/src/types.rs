use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before the real expiry at which a token is already treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth 2.0 token set persisted between runs.
///
/// The JSON layout (`access_token`, `token_type`, `refresh_token`, `expiry`)
/// matches the token files written by Google's own quickstart tooling, so an
/// existing `token.json` keeps working.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug` implementation
/// redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
/// use chrono::{Duration, Utc};
///
/// let tokens = OAuthTokens {
///     access_token: "ya29.a0...".to_string(),
///     token_type: "Bearer".to_string(),
///     refresh_token: Some("1//0g...".to_string()),
///     expires_at: Utc::now() + Duration::hours(1),
/// };
///
/// assert!(!tokens.is_expired_at(Utc::now()));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// Authorization scheme, `Bearer` for Google
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Long-lived token used to obtain new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    #[serde(rename = "expiry")]
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Create a new token set expiring `expires_in` seconds after `now`
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            token_type: default_token_type(),
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// True when the token is expired or expires within [`EXPIRY_BUFFER_SECS`]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_with_buffer(now, EXPIRY_BUFFER_SECS)
    }

    pub fn is_expired_with_buffer(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now >= self.expires_at - Duration::seconds(buffer_seconds)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// A record is usable only if it carries a non-empty access token
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        let scheme = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", scheme, self.access_token)
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Progress of the credential lifecycle for one process run.
///
/// # State Transitions
///
/// ```text
/// NoCredential -> AwaitingUserCode -> Exchanging -> Persisted -> Ready
/// HasCredential ----------------------------------------------> Ready
///
/// any non-terminal state -> Fatal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Nothing usable was found on disk
    #[default]
    NoCredential,
    /// A stored credential was loaded
    HasCredential,
    /// Authorization URL shown, waiting for the operator to paste a code
    AwaitingUserCode,
    /// Trading the authorization code for tokens
    Exchanging,
    /// New credential written to disk
    Persisted,
    /// Authenticated transport handed out
    Ready,
    /// Unrecoverable failure
    Fatal,
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Ready | AuthState::Fatal)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: AuthState) -> bool {
        use AuthState::*;

        match (self, next) {
            (_, Fatal) => !self.is_terminal(),
            (NoCredential, AwaitingUserCode) => true,
            (NoCredential, HasCredential) => true,
            (HasCredential, Ready) => true,
            // Stored credential whose refresh failed falls back to the interactive flow
            (HasCredential, AwaitingUserCode) => true,
            (AwaitingUserCode, Exchanging) => true,
            (Exchanging, Persisted) => true,
            (Persisted, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthState::NoCredential => "no credential",
            AuthState::HasCredential => "has credential",
            AuthState::AwaitingUserCode => "awaiting user code",
            AuthState::Exchanging => "exchanging",
            AuthState::Persisted => "persisted",
            AuthState::Ready => "ready",
            AuthState::Fatal => "fatal",
        };
        f.write_str(label)
    }
}
