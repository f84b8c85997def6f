//! Domain model types for drivepool.
//!
//! - [`PoolId`] - Identifier partitioning the state of one remote account

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a pool (one remote account and all of its cached state).
///
/// Pool IDs are opaque and caller-chosen. They are not normalized, so
/// `"Work"` and `"work"` name two different pools.
///
/// # Examples
///
/// ```
/// use drivepool_core::PoolId;
///
/// let personal = PoolId::new("personal");
/// assert_eq!(personal.as_str(), "personal");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Create a new pool ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the pool ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PoolId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for PoolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
