//! Refresh credentials and their per-pool storage.
//!
//! - [`CredentialSet`] - OAuth client registration plus a refresh token
//! - [`CredentialPool`] - Maps pool identifiers to their credential sets

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::keys::{KeyNamespace, Slot};
use crate::model::PoolId;
use crate::secret::Secret;
use crate::token::CachedToken;

/// The credentials needed to run a refresh-token grant for one account.
///
/// Only `refresh_token` is ever modified after registration, when the
/// authorization server rotates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    /// OAuth client (application) ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: Secret,

    /// Redirect URI registered for the client.
    pub redirect_uri: String,

    /// Long-lived refresh token.
    pub refresh_token: Secret,
}

impl CredentialSet {
    /// Create a new credential set.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            redirect_uri: redirect_uri.into(),
            refresh_token: Secret::new(refresh_token),
        }
    }

    /// Replace the refresh token, keeping every other field.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Secret::new(refresh_token);
        self
    }
}

/// Credential sets keyed by pool, stored in the shared cache.
///
/// Credential entries expire after the configured credential TTL. Each
/// write (registration or refresh token rotation) restarts that TTL.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct CredentialPool {
    cache: Arc<TtlCache<Slot>>,
    ttl: Duration,
}

impl CredentialPool {
    /// Create a credential pool backed by `cache`.
    pub fn new(cache: Arc<TtlCache<Slot>>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Store the credential set for a pool, replacing any existing one.
    pub fn insert(&self, pool: &PoolId, credentials: CredentialSet) {
        let key = KeyNamespace::new(pool).credentials();
        self.cache
            .set(key, Slot::Credentials(credentials), Some(self.ttl));
    }

    /// Get the credential set registered for a pool.
    pub fn get(&self, pool: &PoolId) -> Option<CredentialSet> {
        match self.cache.get(&KeyNamespace::new(pool).credentials()) {
            Some(Slot::Credentials(credentials)) => Some(credentials),
            _ => None,
        }
    }

    /// Check whether a pool has credentials, without copying them.
    pub fn contains(&self, pool: &PoolId) -> bool {
        self.cache.has(&KeyNamespace::new(pool).credentials())
    }

    /// Remove a pool's credentials together with its cached access token.
    ///
    /// Returns `true` if credentials were registered.
    pub fn remove(&self, pool: &PoolId) -> bool {
        let keys = KeyNamespace::new(pool);
        self.cache.delete(&keys.token());
        self.cache.delete(&keys.credentials())
    }

    /// Overwrite the refresh token of `previous`, the set a grant was sent with.
    ///
    /// Does nothing and returns `false` unless `previous` is still the
    /// registered set, so a rotation racing with removal or re-registration
    /// cannot bring old credentials back or graft a token onto new ones.
    pub fn rotate_refresh_token(
        &self,
        pool: &PoolId,
        previous: &CredentialSet,
        refresh_token: Secret,
    ) -> bool {
        self.commit(pool, previous, Vec::new(), Some(refresh_token))
    }

    /// Store the outcome of a refresh grant sent with `sent`.
    ///
    /// Writes the access token, and the rotated refresh token if any, in
    /// one step. Nothing is written and `false` is returned when the pool's
    /// credentials changed or disappeared while the grant was in flight.
    pub fn commit_refresh(
        &self,
        pool: &PoolId,
        sent: &CredentialSet,
        token: CachedToken,
        token_ttl: Duration,
        rotated: Option<Secret>,
    ) -> bool {
        let token_write = (
            KeyNamespace::new(pool).token(),
            Slot::Token(token),
            Some(token_ttl),
        );
        self.commit(pool, sent, vec![token_write], rotated)
    }

    fn commit(
        &self,
        pool: &PoolId,
        sent: &CredentialSet,
        mut writes: Vec<(String, Slot, Option<Duration>)>,
        rotated: Option<Secret>,
    ) -> bool {
        let key = KeyNamespace::new(pool).credentials();

        if let Some(refresh_token) = rotated {
            let updated = sent.clone().with_refresh_token(refresh_token.into_inner());
            writes.push((key.clone(), Slot::Credentials(updated), Some(self.ttl)));
        }

        self.cache.set_all_if(
            &key,
            |slot| matches!(slot, Slot::Credentials(current) if current == sent),
            writes,
        )
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
