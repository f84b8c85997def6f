//! Access tokens and the token lifecycle contract.
//!
//! This module provides:
//! - [`CachedToken`] - An access token with its local expiry
//! - [`TokenError`] - Failures while obtaining a token
//! - [`TokenManager`] - Trait for resolving and refreshing tokens per pool

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PoolId;
use crate::secret::Secret;

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No credential set is registered for the pool.
    #[error("no credentials registered for pool {pool}; call add_connection first")]
    MissingCredentials { pool: String },

    /// The authorization server rejected the refresh grant.
    #[error("token refresh rejected with status {status}: {body}")]
    TokenRefresh { status: u16, body: String },

    /// The token endpoint could not be reached.
    #[error("network error during token refresh: {message}")]
    Network { message: String },

    /// The token endpoint answered with a body we could not use.
    #[error("invalid token response: {message}")]
    InvalidResponse { message: String },
}

impl TokenError {
    /// HTTP status returned by the authorization server, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenRefresh { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// An access token held in the cache.
///
/// `expires_at` is the local cache deadline, which is deliberately earlier
/// than the lifetime the authorization server grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    /// The bearer token value.
    pub value: Secret,

    /// When the cached copy stops being used.
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Create a token that expires `ttl` from now.
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value: Secret::new(value),
            expires_at,
        }
    }

    /// Check if the cached token has passed its deadline.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Value for the `Authorization` request header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value.expose())
    }
}

/// Trait for managing the access token of each pool.
///
/// Implementations look up the pool's credentials, talk to the
/// authorization server, and keep the current token in the cache.
///
/// # Concurrency
///
/// Two callers that both miss the cache for the same pool each run their
/// own refresh. Both tokens are valid and the later cache write wins; no
/// attempt is made to coalesce them.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get the cached access token, refreshing it on a miss.
    ///
    /// Fails with [`TokenError::MissingCredentials`] when the pool has no
    /// credentials, even if a token is still cached.
    async fn resolve_token(&self, pool: &PoolId) -> Result<CachedToken, TokenError>;

    /// Obtain a new access token from the authorization server.
    ///
    /// Bypasses the cache. On success the new token replaces the cached one,
    /// and a rotated refresh token replaces the stored one.
    async fn refresh(&self, pool: &PoolId) -> Result<CachedToken, TokenError>;
}
