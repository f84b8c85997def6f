//! Default implementation of the TokenManager trait.
//!
//! [`DefaultTokenManager`] refreshes access tokens against an OAuth token
//! endpoint using the credentials held in a [`CredentialPool`], and keeps
//! the current token for each pool in the shared cache.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use drivepool_core::{
//!     CredentialPool, CredentialSet, DefaultTokenManager, PoolId, TokenManager, TtlCache,
//! };
//!
//! let cache = Arc::new(TtlCache::new(Duration::from_secs(43200), Duration::from_secs(1200)));
//! let credentials = CredentialPool::new(cache.clone(), Duration::from_secs(43200));
//! let manager = DefaultTokenManager::new(
//!     cache,
//!     credentials.clone(),
//!     reqwest::Client::new(),
//!     drivepool_core::oauth::DEFAULT_AUTH_ENDPOINT.parse()?,
//!     Duration::from_secs(3000),
//! );
//!
//! let pool = PoolId::new("personal");
//! credentials.insert(&pool, CredentialSet::new("client", "secret", "https://app/cb", "refresh"));
//!
//! let token = manager.resolve_token(&pool).await?;
//! println!("Authorization: {}", token.authorization_header());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::{
    cache::TtlCache,
    credentials::CredentialPool,
    keys::{KeyNamespace, Slot},
    model::PoolId,
    oauth,
    token::{CachedToken, TokenError, TokenManager},
};

/// Default implementation of TokenManager.
///
/// This implementation:
/// - Reads credential sets from a [`CredentialPool`]
/// - Runs the refresh-token grant against a fixed token endpoint
/// - Caches access tokens with a TTL shorter than the server's lifetime
/// - Stores rotated refresh tokens back into the credential pool
pub struct DefaultTokenManager {
    cache: Arc<TtlCache<Slot>>,
    credentials: CredentialPool,
    http_client: reqwest::Client,
    endpoint: Url,
    token_ttl: Duration,
}

impl DefaultTokenManager {
    /// Create a token manager.
    ///
    /// # Arguments
    ///
    /// * `cache` - Shared cache that holds the token slots
    /// * `credentials` - Credential pool backed by the same cache
    /// * `http_client` - Client used for the token endpoint
    /// * `endpoint` - Authorization server token URL
    /// * `token_ttl` - How long a fetched access token is served from cache
    pub fn new(
        cache: Arc<TtlCache<Slot>>,
        credentials: CredentialPool,
        http_client: reqwest::Client,
        endpoint: Url,
        token_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            credentials,
            http_client,
            endpoint,
            token_ttl,
        }
    }

    /// The token endpoint this manager refreshes against.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn missing(pool: &PoolId) -> TokenError {
        TokenError::MissingCredentials {
            pool: pool.to_string(),
        }
    }

    fn cached_token(&self, pool: &PoolId) -> Option<CachedToken> {
        match self.cache.get(&KeyNamespace::new(pool).token()) {
            Some(Slot::Token(token)) if !token.is_expired() => Some(token),
            _ => None,
        }
    }
}

#[async_trait]
impl TokenManager for DefaultTokenManager {
    async fn resolve_token(&self, pool: &PoolId) -> Result<CachedToken, TokenError> {
        // Credentials gate every token, including one left in the cache.
        if !self.credentials.contains(pool) {
            return Err(Self::missing(pool));
        }

        if let Some(token) = self.cached_token(pool) {
            tracing::debug!(pool = %pool, "Using cached access token");
            return Ok(token);
        }

        tracing::debug!(pool = %pool, "No cached access token, refreshing");
        self.refresh(pool).await
    }

    async fn refresh(&self, pool: &PoolId) -> Result<CachedToken, TokenError> {
        let credentials = self
            .credentials
            .get(pool)
            .ok_or_else(|| Self::missing(pool))?;

        let response = match oauth::refresh_grant(&self.http_client, &self.endpoint, &credentials)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(pool = %pool, error = %e, "Token refresh failed");
                return Err(e);
            }
        };

        let token = CachedToken::new(response.access_token.expose(), self.token_ttl);
        let rotated = response
            .refresh_token
            .filter(|rotated| *rotated != credentials.refresh_token);
        let rotating = rotated.is_some();

        // Only the credential set the grant was sent with may absorb its result.
        let committed = self.credentials.commit_refresh(
            pool,
            &credentials,
            token.clone(),
            self.token_ttl,
            rotated,
        );

        if !committed {
            tracing::info!(
                pool = %pool,
                "Credentials changed during token refresh, result not cached"
            );
            return Ok(token);
        }

        if rotating {
            tracing::info!(pool = %pool, "Stored rotated refresh token");
        }

        tracing::info!(
            pool = %pool,
            server_expires_in = ?response.expires_in,
            "Refreshed access token"
        );

        Ok(token)
    }
}

impl std::fmt::Debug for DefaultTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTokenManager")
            .field("endpoint", &self.endpoint.as_str())
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
