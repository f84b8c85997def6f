//! Cache key namespacing.
//!
//! Every pool owns three kinds of slots in the shared cache: its credential
//! set, its current access token, and any number of caller-defined data
//! slots. [`KeyNamespace`] derives the cache key for each of them.
//!
//! # Key Convention
//!
//! Keys follow the pattern `{slot}/{len}:{pool}[/{key}]`, where `len` is the
//! byte length of the pool identifier. The length prefix keeps keys
//! unambiguous even when pool identifiers or data keys contain `/` or `:`.

use serde_json::Value;

use crate::credentials::CredentialSet;
use crate::model::PoolId;
use crate::token::CachedToken;

const CREDENTIALS_SLOT: &str = "creds";
const TOKEN_SLOT: &str = "token";
const DATA_SLOT: &str = "data";

/// Key generator for the slots belonging to a single pool.
///
/// # Example
///
/// ```
/// use drivepool_core::{KeyNamespace, PoolId};
///
/// let keys = KeyNamespace::new(&PoolId::new("acct1"));
/// assert_eq!(keys.credentials(), "creds/5:acct1");
/// assert_eq!(keys.token(), "token/5:acct1");
/// assert_eq!(keys.data("cursor"), "data/5:acct1/cursor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    scope: String,
}

impl KeyNamespace {
    /// Create the namespace for a pool.
    pub fn new(pool: &PoolId) -> Self {
        Self {
            scope: format!("{}:{}", pool.as_str().len(), pool.as_str()),
        }
    }

    /// Key of the pool's credential set.
    pub fn credentials(&self) -> String {
        format!("{}/{}", CREDENTIALS_SLOT, self.scope)
    }

    /// Key of the pool's cached access token.
    pub fn token(&self) -> String {
        format!("{}/{}", TOKEN_SLOT, self.scope)
    }

    /// Key of a caller-defined data slot.
    pub fn data(&self, key: &str) -> String {
        format!("{}/{}/{}", DATA_SLOT, self.scope, key)
    }
}

/// Value stored in the shared cache.
///
/// One cache holds every slot kind, so each entry records which kind it is.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Refresh credentials registered through `add_connection`.
    Credentials(CredentialSet),
    /// Access token obtained from the authorization server.
    Token(CachedToken),
    /// Caller data stored through `set_to_cache`.
    Data(Value),
}
