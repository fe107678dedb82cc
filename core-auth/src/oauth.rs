//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! This module implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for the
//! installed-application flow against Google's token endpoint.
//!
//! # Overview
//!
//! The OAuth flow manager handles:
//! - Building authorization URLs with PKCE challenge
//! - Reading the authorization code the operator pastes back
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens
//!
//! # Security
//!
//! - Uses PKCE (Proof Key for Code Exchange) for additional security
//! - Generates cryptographically secure random state and code verifier
//! - Validates the state parameter whenever the pasted input carries one
//! - Never logs sensitive values (tokens, codes, verifiers)
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthFlowManager, OAuthConfig};
//! use bridge_traits::time::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: Some("your-client-secret".to_string()),
//!     redirect_uri: "http://localhost".to_string(),
//!     scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
//!     auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
//!     token_url: "https://oauth2.googleapis.com/token".to_string(),
//! };
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client, Arc::new(SystemClock));
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Show auth_url to the operator...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::logging::redact_if_sensitive;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// OAuth 2.0 client configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Redirect URI registered for the client
    pub redirect_uri: String,
    /// List of OAuth scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// Contains the code verifier that must be kept for the duration of the
/// authorization flow and used when exchanging the authorization code.
///
/// # Security
///
/// The verifier must be kept secret and never transmitted to the authorization server.
/// Only the challenge (derived from the verifier) is sent during authorization.
#[derive(Clone)]
pub struct PkceVerifier {
    /// The code verifier (base64-url-encoded random string)
    verifier: String,
    /// The state parameter for CSRF protection
    state: String,
}

impl PkceVerifier {
    /// Create a new PKCE verifier with cryptographically secure random values.
    ///
    /// Generates:
    /// - A 32-byte random code verifier (base64-url-encoded)
    /// - A 16-byte random state parameter (base64-url-encoded)
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        // 43 characters once encoded, the RFC 7636 minimum
        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Compute the code challenge from the verifier.
    ///
    /// Uses S256 method: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        let hash = hasher.finalize();
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Authorization code as pasted by the operator.
///
/// The operator may paste either the bare code or the whole URL the browser
/// was redirected to (`http://localhost/?state=...&code=...`). In the latter
/// case the state is kept so it can be checked against the verifier.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationResponse {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AuthError::InvalidAuthCode(
                "authorization code is empty".to_string(),
            ));
        }

        let url = match Url::parse(input) {
            Ok(url) if url.query().is_some() => url,
            _ => {
                return Ok(Self {
                    code: input.to_string(),
                    state: None,
                })
            }
        };

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(AuthError::AuthenticationFailed(format!(
                        "authorization server returned error: {}",
                        value
                    )))
                }
                _ => {}
            }
        }

        let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthError::InvalidAuthCode("redirect URL has no code parameter".to_string())
        })?;

        Ok(Self { code, state })
    }
}

impl std::fmt::Debug for AuthorizationResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationResponse")
            .field("code", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// OAuth 2.0 flow manager.
///
/// Handles the complete OAuth 2.0 authorization code flow with PKCE support.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    refresh_policy: RetryPolicy,
}

impl OAuthFlowManager {
    /// Create a new OAuth flow manager with the given configuration.
    ///
    /// `http_client` must be the unauthenticated transport; token endpoint
    /// calls carry credentials in the form body.
    pub fn new(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            http_client,
            clock,
            refresh_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry schedule used for refresh requests
    pub fn with_refresh_policy(mut self, policy: RetryPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns both the URL and the PKCE verifier, which must be kept for the
    /// code exchange. `access_type=offline` asks Google for a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is not a valid URL.
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
        }

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for OAuth tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pasted response carries a state that doesn't match (CSRF protection)
    /// - The token endpoint rejects the code
    /// - Network errors occur
    /// - The response holds no access token
    #[instrument(skip(self, response, verifier))]
    pub async fn exchange_code(
        &self,
        response: &AuthorizationResponse,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if let Some(state) = response.state.as_deref() {
            if state != verifier.state() {
                warn!("OAuth state mismatch in pasted redirect URL");
                return Err(AuthError::StateMismatch {
                    expected: verifier.state().to_string(),
                    actual: state.to_string(),
                });
            }
        }

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", response.code.as_str());
        params.insert("redirect_uri", &self.config.redirect_uri);
        params.insert("client_id", &self.config.client_id);
        params.insert("code_verifier", verifier.verifier());

        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret);
        }

        debug!(
            code = %redact_if_sensitive("auth_code", &response.code),
            "Exchanging authorization code for tokens"
        );

        let request = self.token_request(&params)?;

        // Authorization codes are single-use, so the exchange is sent exactly once
        let response = match self.send_once(request).await {
            Ok(response) => response,
            Err(e) => match e.status() {
                Some(status) => {
                    warn!(status, "Token endpoint rejected the authorization code");
                    return Err(AuthError::InvalidAuthCode(format!(
                        "Token endpoint returned {}: {}",
                        status, e
                    )));
                }
                None => return Err(AuthError::NetworkError(e.to_string())),
            },
        };

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(
                status = status,
                error = %error_body,
                "Token exchange failed while exchanging authorization code"
            );

            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        let tokens = token_response.into_tokens(None, self.clock.now())?;

        info!(
            expires_at = %tokens.expires_at,
            has_refresh_token = tokens.can_refresh(),
            "Exchanged authorization code for tokens"
        );

        Ok(tokens)
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Server errors are retried with exponential backoff; client errors
    /// (revoked or invalid refresh token) fail immediately. Google usually
    /// omits the refresh token from the response, in which case the old one
    /// is carried over.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.config.client_id);

        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret);
        }

        debug!("Refreshing access token");

        let max_attempts = self.refresh_policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = self.token_request(&params)?;

            let (status, detail) = match self.send_once(request).await {
                Ok(response) if response.is_success() => {
                    let token_response: TokenResponse = response.json().map_err(|e| {
                        AuthError::TokenRefreshFailed(format!(
                            "Failed to parse token response: {}",
                            e
                        ))
                    })?;

                    let tokens = token_response
                        .into_tokens(Some(refresh_token), self.clock.now())
                        .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

                    info!(expires_at = %tokens.expires_at, "Refreshed access token");
                    return Ok(tokens);
                }
                Ok(response) => {
                    let body = response
                        .text()
                        .unwrap_or_else(|_| "Unable to read error response".to_string());
                    (Some(response.status), body)
                }
                Err(e) => (e.status(), e.to_string()),
            };

            if let Some(status) = status.filter(|s| is_permanent_failure(*s)) {
                warn!(
                    status = status,
                    error = %detail,
                    "Token refresh failed without retry"
                );

                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, detail
                )));
            }

            if attempts >= max_attempts {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {}",
                    attempts, detail
                )));
            }

            let delay = self.refresh_policy.delay_for(attempts);
            warn!(
                status = ?status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Token endpoint calls bypass transport-level retries; the refresh loop
    /// above is the only retry layer.
    async fn send_once(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
    }

    fn token_request(&self, params: &HashMap<&str, &str>) -> Result<HttpRequest> {
        let encoded_body = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        Ok(
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Bytes::from(encoded_body)),
        )
    }
}

/// Client errors other than rate limiting mean the refresh token itself was refused
fn is_permanent_failure(status: u16) -> bool {
    (400..500).contains(&status) && status != 429
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_tokens(
        self,
        previous_refresh_token: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<OAuthTokens> {
        if self.access_token.is_empty() {
            return Err(AuthError::AuthenticationFailed(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(str::to_string));

        let mut tokens = OAuthTokens::new(self.access_token, refresh_token, self.expires_in, now);
        if let Some(token_type) = self.token_type.filter(|t| !t.is_empty()) {
            tokens.token_type = token_type;
        }
        Ok(tokens)
    }
}

fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::StreamingResponse;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use std::time::Duration;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<StreamingResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "http://localhost".to_string(),
            scopes: vec!["scope1".to_string(), "scope2".to_string()],
            auth_url: "https://provider.com/auth".to_string(),
            token_url: "https://provider.com/token".to_string(),
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()))
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_exponential_backoff: true,
        }
    }

    fn body_of(request: &HttpRequest) -> String {
        String::from_utf8(request.body.clone().unwrap_or_default().to_vec()).unwrap()
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();

        assert!(verifier.verifier().len() >= 43);
        assert!(!verifier.state().is_empty());
        assert_eq!(verifier.challenge(), verifier.challenge());

        let verifier2 = PkceVerifier::new();
        assert_ne!(verifier.verifier(), verifier2.verifier());
        assert_ne!(verifier.state(), verifier2.state());
    }

    #[test]
    fn test_pkce_challenge_known_vector() {
        // RFC 7636 appendix B
        let verifier = PkceVerifier {
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
            state: "state".to_string(),
        };
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(config(), Arc::new(MockHttpClient::new()), clock());
        let (url, verifier) = manager.build_auth_url().unwrap();

        assert!(url.starts_with("https://provider.com/auth?"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("redirect_uri=http"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=scope1+scope2") || url.contains("scope=scope1%20scope2"));
        assert!(url.contains(&format!("state={}", verifier.state())));
        assert!(url.contains(&format!("code_challenge={}", verifier.challenge())));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut config = config();
        config.auth_url = "not a valid url".to_string();

        let manager = OAuthFlowManager::new(config, Arc::new(MockHttpClient::new()), clock());
        assert!(manager.build_auth_url().is_err());
    }

    #[test]
    fn test_authorization_response_parse() {
        let bare = AuthorizationResponse::parse("  4/0AbCd  \n").unwrap();
        assert_eq!(bare.code, "4/0AbCd");
        assert_eq!(bare.state, None);

        let redirect =
            AuthorizationResponse::parse("http://localhost/?state=xyz&code=4%2F0AbCd&scope=drive")
                .unwrap();
        assert_eq!(redirect.code, "4/0AbCd");
        assert_eq!(redirect.state.as_deref(), Some("xyz"));

        assert!(matches!(
            AuthorizationResponse::parse("http://localhost/?error=access_denied"),
            Err(AuthError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            AuthorizationResponse::parse("http://localhost/?state=xyz"),
            Err(AuthError::InvalidAuthCode(_))
        ));
        assert!(AuthorizationResponse::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                let body = body_of(request);
                request.url == "https://provider.com/token"
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code=the-code")
                    && body.contains("code_verifier=")
                    && body.contains("client_secret=secret")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"ya29","refresh_token":"1//r","expires_in":3599,"token_type":"Bearer"}"#,
                ))
            });

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock());
        let verifier = PkceVerifier::new();
        let response = AuthorizationResponse {
            code: "the-code".to_string(),
            state: None,
        };

        let tokens = manager.exchange_code(&response, &verifier).await.unwrap();
        assert_eq!(tokens.access_token, "ya29");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(
            tokens.expires_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 59, 59).unwrap()
        );
    }

    #[tokio::test]
    async fn test_exchange_code_state_mismatch_makes_no_request() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock());
        let verifier = PkceVerifier::new();
        let response = AuthorizationResponse {
            code: "the-code".to_string(),
            state: Some("forged".to_string()),
        };

        let err = manager.exchange_code(&response, &verifier).await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { .. }));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock());
        let response = AuthorizationResponse {
            code: "bad".to_string(),
            state: None,
        };

        let err = manager
            .exchange_code(&response, &PkceVerifier::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAuthCode(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_exchange_code_empty_access_token() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(json_response(200, r#"{"access_token":""}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock());
        let response = AuthorizationResponse {
            code: "code".to_string(),
            state: None,
        };

        assert!(manager
            .exchange_code(&response, &PkceVerifier::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                let body = body_of(request);
                body.contains("grant_type=refresh_token") && body.contains("refresh_token=old")
            })
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"fresh","expires_in":60}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock());
        let tokens = manager.refresh_access_token("old").await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(503, "unavailable")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"fresh"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock())
            .with_refresh_policy(fast_policy());

        let tokens = manager.refresh_access_token("old").await.unwrap();
        assert_eq!(tokens.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock())
            .with_refresh_policy(fast_policy());

        let err = manager.refresh_access_token("revoked").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_gives_up_after_max_attempts() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(json_response(500, "boom")));

        let manager = OAuthFlowManager::new(config(), Arc::new(http), clock())
            .with_refresh_policy(fast_policy());

        let err = manager.refresh_access_token("old").await.unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
    }

    /// Token endpoint that always fails with `status`, retrying internally the
    /// way the reqwest client does and counting every hit.
    struct FailingEndpoint {
        status: Option<u16>,
        hits: std::sync::atomic::AtomicU32,
    }

    impl FailingEndpoint {
        fn new(status: Option<u16>) -> Self {
            Self {
                status,
                hits: std::sync::atomic::AtomicU32::new(0),
            }
        }

        fn hits(&self) -> u32 {
            self.hits.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn failure(&self) -> BridgeError {
            match self.status {
                Some(status) => BridgeError::Status {
                    status,
                    message: "Internal Server Error".to_string(),
                },
                None => BridgeError::OperationFailed("connection reset".to_string()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for FailingEndpoint {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.execute_with_retry(request, RetryPolicy::default()).await
        }

        async fn execute_with_retry(
            &self,
            _request: HttpRequest,
            policy: RetryPolicy,
        ) -> BridgeResult<HttpResponse> {
            for _ in 0..policy.max_attempts.max(1) {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
            Err(self.failure())
        }

        async fn execute_stream(&self, _request: HttpRequest) -> BridgeResult<StreamingResponse> {
            Err(self.failure())
        }
    }

    #[tokio::test]
    async fn test_exchange_code_hits_token_endpoint_once() {
        let endpoint = Arc::new(FailingEndpoint::new(Some(500)));
        let manager = OAuthFlowManager::new(config(), endpoint.clone(), clock());
        let response = AuthorizationResponse {
            code: "code".to_string(),
            state: None,
        };

        let err = manager
            .exchange_code(&response, &PkceVerifier::new())
            .await
            .unwrap_err();

        assert_eq!(endpoint.hits(), 1);
        assert!(matches!(err, AuthError::InvalidAuthCode(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_exchange_code_transport_failure_is_network_error() {
        let endpoint = Arc::new(FailingEndpoint::new(None));
        let manager = OAuthFlowManager::new(config(), endpoint.clone(), clock());
        let response = AuthorizationResponse {
            code: "code".to_string(),
            state: None,
        };

        let err = manager
            .exchange_code(&response, &PkceVerifier::new())
            .await
            .unwrap_err();

        assert_eq!(endpoint.hits(), 1);
        assert!(matches!(err, AuthError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_refresh_attempts_are_not_multiplied_by_transport() {
        let endpoint = Arc::new(FailingEndpoint::new(Some(500)));
        let manager = OAuthFlowManager::new(config(), endpoint.clone(), clock())
            .with_refresh_policy(fast_policy());

        let err = manager.refresh_access_token("old").await.unwrap_err();

        assert_eq!(endpoint.hits(), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_refresh_retries_transport_failures() {
        let endpoint = Arc::new(FailingEndpoint::new(None));
        let manager = OAuthFlowManager::new(config(), endpoint.clone(), clock())
            .with_refresh_policy(fast_policy());

        let err = manager.refresh_access_token("old").await.unwrap_err();

        assert_eq!(endpoint.hits(), 3);
        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_rejected_status_error_is_not_retried() {
        let endpoint = Arc::new(FailingEndpoint::new(Some(400)));
        let manager = OAuthFlowManager::new(config(), endpoint.clone(), clock())
            .with_refresh_policy(fast_policy());

        let err = manager.refresh_access_token("old").await.unwrap_err();

        assert_eq!(endpoint.hits(), 1);
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_token_response_deserialization_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token": "token"}"#).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
