//! # drivepool Core
//!
//! Core library for managing OAuth refresh credentials across many remote
//! accounts ("pools") and calling remote APIs on their behalf.
//!
//! This crate provides:
//! - An expiring cache shared by all pools, with a background sweep
//! - Per-pool credential sets and access tokens, with refresh token rotation
//! - A token manager that refreshes lazily and on demand
//! - An invoker that retries a remote call once after a token rejection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use drivepool_core::{CredentialSet, ManagerConfig, PoolId, PoolManager};
//!
//! async fn list(manager: &PoolManager) -> Result<(), drivepool_core::Error> {
//!     let pool = PoolId::new("personal");
//!     manager
//!         .add_connection(&pool, CredentialSet::new("id", "secret", "https://app/cb", "rt"))
//!         .await?;
//!
//!     let body = manager
//!         .invoke(&pool, "root".to_string(), |req| my_api::list_children(req))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod invoker;
pub mod keys;
pub mod manager;
pub mod model;
pub mod oauth;
pub mod secret;
pub mod token;
pub mod token_manager;

// Re-export commonly used types at crate root
pub use cache::TtlCache;

pub use config::ManagerConfig;

pub use credentials::{
    CredentialPool,
    CredentialSet,
};

pub use error::{Error, Result};

pub use invoker::{
    AuthFailurePredicate,
    Authorized,
    RetryingInvoker,
    UpstreamError,
    is_invalid_authentication_token,
};

pub use keys::{KeyNamespace, Slot};

pub use manager::PoolManager;

pub use model::PoolId;

pub use secret::Secret;

pub use token::{
    CachedToken,
    TokenError,
    TokenManager,
};

pub use token_manager::DefaultTokenManager;
