//! Authenticated HTTP transport.
//!
//! [`AuthorizedHttpClient`] wraps a plain [`HttpClient`] and attaches the
//! current access token to every request. It is shared by every export
//! worker, so the token lives behind a `RwLock` and refreshes are serialized
//! by a separate `Mutex`: when several workers notice an expired token at the
//! same time only the first one talks to the token endpoint.
//!
//! Refreshed tokens stay in memory. The credential file is written by the
//! coordinator before the transport is handed out and never again during the
//! run.

use crate::oauth::OAuthFlowManager;
use crate::types::OAuthTokens;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{
    HttpClient, HttpRequest, HttpResponse, RetryPolicy, StreamingResponse,
};
use bridge_traits::time::Clock;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

const UNAUTHORIZED: u16 = 401;

pub struct AuthorizedHttpClient {
    inner: Arc<dyn HttpClient>,
    tokens: RwLock<OAuthTokens>,
    refresh_lock: Mutex<()>,
    oauth: Arc<OAuthFlowManager>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthorizedHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedHttpClient").finish_non_exhaustive()
    }
}

impl AuthorizedHttpClient {
    /// Transport that refreshes through `oauth` when the token runs out
    pub fn new(
        inner: Arc<dyn HttpClient>,
        tokens: OAuthTokens,
        oauth: Arc<OAuthFlowManager>,
    ) -> Self {
        let clock = oauth.clock().clone();
        Self {
            inner,
            tokens: RwLock::new(tokens),
            refresh_lock: Mutex::new(()),
            oauth,
            clock,
        }
    }

    /// Snapshot of the token currently in use
    pub async fn current_tokens(&self) -> OAuthTokens {
        self.tokens.read().await.clone()
    }

    /// Returns `(authorization header, access token it was built from)`
    async fn authorization(&self) -> Result<(String, String)> {
        let stale = {
            let tokens = self.tokens.read().await;
            if !self.should_refresh(&tokens) {
                return Ok((tokens.authorization_header(), tokens.access_token.clone()));
            }
            tokens.access_token.clone()
        };

        self.refresh(&stale).await
    }

    fn should_refresh(&self, tokens: &OAuthTokens) -> bool {
        tokens.can_refresh() && tokens.is_expired_at(self.clock.now())
    }

    /// Refresh unless another task already replaced `stale`
    #[instrument(skip_all)]
    async fn refresh(&self, stale: &str) -> Result<(String, String)> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = {
            let tokens = self.tokens.read().await;
            if tokens.access_token != stale {
                debug!("Access token already refreshed by another request");
                return Ok((tokens.authorization_header(), tokens.access_token.clone()));
            }
            tokens.refresh_token.clone()
        };

        let refresh_token = refresh_token.ok_or_else(|| {
            BridgeError::OperationFailed("access token expired and cannot be refreshed".to_string())
        })?;

        debug!("Refreshing access token in memory");
        let fresh = self
            .oauth
            .refresh_access_token(&refresh_token)
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        let authorization = (fresh.authorization_header(), fresh.access_token.clone());
        *self.tokens.write().await = fresh;
        Ok(authorization)
    }

    async fn can_retry_unauthorized(&self) -> bool {
        self.tokens.read().await.can_refresh()
    }

    fn authorize(request: HttpRequest, authorization: String) -> HttpRequest {
        request.header("Authorization", authorization)
    }
}

#[async_trait]
impl HttpClient for AuthorizedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (authorization, used) = self.authorization().await?;
        let response = self
            .inner
            .execute(Self::authorize(request.clone(), authorization))
            .await?;

        if response.status != UNAUTHORIZED || !self.can_retry_unauthorized().await {
            return Ok(response);
        }

        warn!("Request rejected as unauthorized, refreshing token and retrying once");
        let (authorization, _) = self.refresh(&used).await?;
        self.inner
            .execute(Self::authorize(request, authorization))
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let (authorization, used) = self.authorization().await?;
        let response = self
            .inner
            .execute_with_retry(Self::authorize(request.clone(), authorization), policy.clone())
            .await?;

        if response.status != UNAUTHORIZED || !self.can_retry_unauthorized().await {
            return Ok(response);
        }

        warn!("Request rejected as unauthorized, refreshing token and retrying once");
        let (authorization, _) = self.refresh(&used).await?;
        self.inner
            .execute_with_retry(Self::authorize(request, authorization), policy)
            .await
    }

    async fn execute_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let (authorization, used) = self.authorization().await?;
        let response = self
            .inner
            .execute_stream(Self::authorize(request.clone(), authorization))
            .await?;

        if response.status != UNAUTHORIZED || !self.can_retry_unauthorized().await {
            return Ok(response);
        }

        warn!("Stream rejected as unauthorized, refreshing token and retrying once");
        drop(response);
        let (authorization, _) = self.refresh(&used).await?;
        self.inner
            .execute_stream(Self::authorize(request, authorization))
            .await
    }
}
