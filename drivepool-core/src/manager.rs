//! The caller-owned entry point tying pools, tokens and invocation together.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), drivepool_core::Error> {
//! use drivepool_core::{CredentialSet, ManagerConfig, PoolId, PoolManager, UpstreamError};
//!
//! let manager = PoolManager::new(ManagerConfig::default())?;
//! let pool = PoolId::new("personal");
//!
//! manager
//!     .add_connection(&pool, CredentialSet::new("client", "secret", "https://app/cb", "refresh"))
//!     .await?;
//!
//! let header = manager
//!     .invoke(&pool, (), |req| async move { Ok::<_, UpstreamError>(req.authorization) })
//!     .await?;
//! println!("{}", header);
//!
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::{
    cache::TtlCache,
    config::ManagerConfig,
    credentials::{CredentialPool, CredentialSet},
    error::Error,
    invoker::{Authorized, AuthFailurePredicate, RetryingInvoker, UpstreamError},
    keys::{KeyNamespace, Slot},
    model::PoolId,
    token::{CachedToken, TokenManager},
    token_manager::DefaultTokenManager,
};

/// Manages credential pools and runs authorized remote operations.
///
/// One manager owns one cache and its sweep task. Managers are independent
/// of each other, so several configurations can coexist in a process.
/// Wrap the manager in an `Arc` to share it between tasks.
pub struct PoolManager {
    config: ManagerConfig,
    cache: Arc<TtlCache<Slot>>,
    credentials: CredentialPool,
    invoker: RetryingInvoker<DefaultTokenManager>,
}

impl PoolManager {
    /// Create a manager with a default HTTP client.
    ///
    /// Must be called inside a tokio runtime for the cache sweep to run.
    pub fn new(config: ManagerConfig) -> Result<Self, Error> {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a manager that uses `http_client` for the token endpoint.
    ///
    /// Timeouts for token refreshes are taken from the client.
    pub fn with_http_client(
        config: ManagerConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, Error> {
        config.validate()?;
        let endpoint = config.auth_endpoint_url()?;

        // Caller data without an explicit TTL lives as long as credentials.
        let cache = Arc::new(TtlCache::new(
            config.credential_ttl(),
            config.sweep_interval(),
        ));
        let credentials = CredentialPool::new(cache.clone(), config.credential_ttl());
        let tokens = DefaultTokenManager::new(
            cache.clone(),
            credentials.clone(),
            http_client,
            endpoint,
            config.token_ttl(),
        );

        tracing::debug!(
            endpoint = %config.auth_endpoint,
            token_ttl = config.token_ttl_seconds,
            credential_ttl = config.credential_ttl_seconds,
            "Created pool manager"
        );

        Ok(Self {
            config,
            cache,
            credentials,
            invoker: RetryingInvoker::new(Arc::new(tokens)),
        })
    }

    /// Replace the token-rejection classification used by [`invoke`](Self::invoke).
    pub fn with_auth_failure_predicate(mut self, predicate: AuthFailurePredicate) -> Self {
        self.invoker = self.invoker.with_predicate(predicate);
        self
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register credentials for a pool and validate them with one refresh.
    ///
    /// Existing credentials for the pool are overwritten. If the validating
    /// refresh fails the new credentials are **not** rolled back; call
    /// [`abort_connection`](Self::abort_connection) to remove them.
    pub async fn add_connection(
        &self,
        pool: &PoolId,
        credentials: CredentialSet,
    ) -> Result<bool, Error> {
        self.credentials.insert(pool, credentials);

        match self.invoker.tokens().refresh(pool).await {
            Ok(_) => {
                tracing::info!(pool = %pool, "Connection added");
                Ok(true)
            }
            Err(source) => {
                tracing::warn!(
                    pool = %pool,
                    error = %source,
                    "Connection credentials failed validation; left registered"
                );
                Err(Error::Connection {
                    pool: pool.to_string(),
                    source,
                })
            }
        }
    }

    /// Get the credentials registered for a pool.
    ///
    /// Presence says nothing about whether the authorization server still
    /// accepts them.
    pub fn check_credentials(&self, pool: &PoolId) -> Option<CredentialSet> {
        self.credentials.get(pool)
    }

    /// Remove a pool's credentials and cached token.
    ///
    /// Calling this for an unknown pool is a no-op.
    pub fn abort_connection(&self, pool: &PoolId) {
        if self.credentials.remove(pool) {
            tracing::info!(pool = %pool, "Connection removed");
        }
    }

    /// Store caller data under `key` in the pool's namespace.
    ///
    /// Without `ttl` the data expires with the credential TTL. A zero TTL
    /// keeps it until overwritten or the manager is dropped.
    pub fn set_to_cache(&self, pool: &PoolId, key: &str, data: Value, ttl: Option<Duration>) {
        self.cache
            .set(KeyNamespace::new(pool).data(key), Slot::Data(data), ttl);
    }

    /// Read caller data stored with [`set_to_cache`](Self::set_to_cache).
    pub fn get_from_cache(&self, pool: &PoolId, key: &str) -> Option<Value> {
        match self.cache.get(&KeyNamespace::new(pool).data(key)) {
            Some(Slot::Data(data)) => Some(data),
            _ => None,
        }
    }

    /// Get the pool's access token, refreshing it on a cache miss.
    pub async fn resolve_token(&self, pool: &PoolId) -> Result<CachedToken, Error> {
        Ok(self.invoker.tokens().resolve_token(pool).await?)
    }

    /// Force a new access token for the pool, bypassing the cache.
    pub async fn refresh_token(&self, pool: &PoolId) -> Result<CachedToken, Error> {
        Ok(self.invoker.tokens().refresh(pool).await?)
    }

    /// Run a remote operation with the pool's token.
    ///
    /// See [`RetryingInvoker::invoke`] for the retry policy.
    pub async fn invoke<P, R, F, Fut>(
        &self,
        pool: &PoolId,
        params: P,
        operation: F,
    ) -> Result<R, Error>
    where
        P: Clone,
        F: Fn(Authorized<P>) -> Fut,
        Fut: Future<Output = Result<R, UpstreamError>>,
    {
        self.invoker.invoke(pool, params, operation).await
    }

    /// The invoker, for callers that wrap their own operation namespaces.
    pub fn invoker(&self) -> &RetryingInvoker<DefaultTokenManager> {
        &self.invoker
    }

    /// Stop the cache sweep task. Part of process shutdown.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PoolManager {
        let config = ManagerConfig::default()
            .with_auth_endpoint("http://127.0.0.1:9/token")
            .with_sweep_interval(Duration::ZERO);
        PoolManager::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ManagerConfig::default().with_auth_endpoint("::");
        assert!(matches!(
            PoolManager::new(config),
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_and_get_from_cache() {
        let manager = manager();
        let pool = PoolId::new("acct1");

        manager.set_to_cache(&pool, "cursor", serde_json::json!({ "page": 2 }), None);

        assert_eq!(
            manager.get_from_cache(&pool, "cursor"),
            Some(serde_json::json!({ "page": 2 }))
        );
        assert!(manager.get_from_cache(&PoolId::new("acct2"), "cursor").is_none());
        assert!(manager.get_from_cache(&pool, "other").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_data_ttl() {
        let manager = manager();
        let pool = PoolId::new("acct1");

        manager.set_to_cache(&pool, "short", Value::Bool(true), Some(Duration::from_secs(5)));
        manager.set_to_cache(&pool, "default", Value::Bool(true), None);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(manager.get_from_cache(&pool, "short").is_none());
        assert!(manager.get_from_cache(&pool, "default").is_some());

        tokio::time::advance(Duration::from_secs(43200)).await;
        assert!(manager.get_from_cache(&pool, "default").is_none());
    }

    #[tokio::test]
    async fn test_cache_data_with_huge_ttl() {
        let manager = manager();
        let pool = PoolId::new("acct1");

        manager.set_to_cache(
            &pool,
            "k",
            serde_json::json!(1),
            Some(Duration::from_secs(u64::MAX)),
        );

        assert_eq!(manager.get_from_cache(&pool, "k"), Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_data_slot_does_not_shadow_credentials() {
        let manager = manager();
        let pool = PoolId::new("acct1");

        manager.set_to_cache(&pool, "creds", Value::String("x".into()), None);
        assert!(manager.check_credentials(&pool).is_none());
    }

    #[tokio::test]
    async fn test_abort_unknown_pool_is_noop() {
        let manager = manager();
        manager.abort_connection(&PoolId::new("never-added"));
        manager.abort_connection(&PoolId::new("never-added"));
    }

    #[tokio::test]
    async fn test_add_connection_keeps_credentials_on_failure() {
        let manager = manager();
        let pool = PoolId::new("acct1");
        let credentials = CredentialSet::new("c1", "s1", "r1", "rt1");

        let err = manager
            .add_connection(&pool, credentials.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(manager.check_credentials(&pool), Some(credentials));
    }
}
