//! # Authorization Coordinator
//!
//! Turns whatever credential is on disk (or none) into an authenticated
//! transport.
//!
//! ## Flow
//!
//! 1. Load the stored credential. If present and still valid, use it.
//! 2. If it is expired and carries a refresh token, refresh once and persist
//!    the result. A failed refresh falls back to step 3.
//! 3. Otherwise show the authorization URL through an [`AuthCodePrompt`],
//!    wait for the operator to paste the code, exchange it and persist the
//!    new credential.
//!
//! Exchange and persistence failures are fatal: the coordinator moves to
//! [`AuthState::Fatal`] and returns the error.

use crate::error::{AuthError, Result};
use crate::oauth::{AuthorizationResponse, OAuthFlowManager};
use crate::prompt::AuthCodePrompt;
use crate::token_store::TokenStore;
use crate::transport::AuthorizedHttpClient;
use crate::types::{AuthState, OAuthTokens};
use bridge_traits::http::HttpClient;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct AuthCoordinator {
    token_store: TokenStore,
    oauth: Arc<OAuthFlowManager>,
    http_client: Arc<dyn HttpClient>,
    state: AuthState,
}

impl AuthCoordinator {
    /// `http_client` is the plain transport the authorized client wraps.
    pub fn new(
        token_store: TokenStore,
        oauth: Arc<OAuthFlowManager>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            token_store,
            oauth,
            http_client,
            state: AuthState::NoCredential,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Produce an authenticated transport, prompting the operator only when
    /// no usable credential is stored.
    #[instrument(skip_all)]
    pub async fn authorize(
        &mut self,
        prompt: &mut dyn AuthCodePrompt,
    ) -> Result<AuthorizedHttpClient> {
        match self.run(prompt).await {
            Ok(tokens) => {
                self.transition(AuthState::Ready);
                Ok(AuthorizedHttpClient::new(
                    self.http_client.clone(),
                    tokens,
                    self.oauth.clone(),
                ))
            }
            Err(e) => {
                self.transition(AuthState::Fatal);
                Err(e)
            }
        }
    }

    async fn run(&mut self, prompt: &mut dyn AuthCodePrompt) -> Result<OAuthTokens> {
        if let Some(stored) = self.token_store.load().await {
            self.transition(AuthState::HasCredential);

            match self.ensure_fresh(stored).await {
                Some(tokens) => return Ok(tokens),
                None => info!("Stored credential is no longer usable, authorization required"),
            }
        }

        self.authorize_interactively(prompt).await
    }

    /// Refresh an expired stored credential once; `None` means start over.
    async fn ensure_fresh(&self, stored: OAuthTokens) -> Option<OAuthTokens> {
        let now = self.oauth.clock().now();
        if !stored.is_expired_at(now) {
            debug!(expires_at = %stored.expires_at, "Stored credential is valid");
            return Some(stored);
        }

        let refresh_token = match stored.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!("Stored credential expired and has no refresh token");
                return None;
            }
        };

        let refreshed = match self.oauth.refresh_access_token(refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Could not refresh stored credential");
                return None;
            }
        };

        if let Err(e) = self.token_store.save(&refreshed).await {
            // The refreshed token still works for this run
            warn!(error = %e, "Failed to persist refreshed credential");
        }

        Some(refreshed)
    }

    async fn authorize_interactively(
        &mut self,
        prompt: &mut dyn AuthCodePrompt,
    ) -> Result<OAuthTokens> {
        let (auth_url, verifier) = self.oauth.build_auth_url()?;

        self.transition(AuthState::AwaitingUserCode);
        let input = prompt.request_code(&auth_url)?;
        let response = AuthorizationResponse::parse(&input)?;

        self.transition(AuthState::Exchanging);
        let tokens = self.oauth.exchange_code(&response, &verifier).await?;

        self.token_store.save(&tokens).await?;
        self.transition(AuthState::Persisted);

        Ok(tokens)
    }

    fn transition(&mut self, next: AuthState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected authorization state change");
        }
        debug!(from = %self.state, to = %next, "Authorization state changed");
        self.state = next;
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("token_store", &self.token_store)
            .field("state", &self.state)
            .finish()
    }
}

/// Convenience for callers that only need the error kind
pub fn is_configuration_error(error: &AuthError) -> bool {
    matches!(
        error,
        AuthError::ConfigMissing { .. } | AuthError::ConfigInvalid { .. }
    )
}
