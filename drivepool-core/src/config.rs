//! Pool manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::oauth::DEFAULT_AUTH_ENDPOINT;

/// Options for a [`PoolManager`](crate::PoolManager).
///
/// Every field has a default, so an empty TOML table or JSON object is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Authorization server token endpoint.
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// How long an access token is served from cache.
    ///
    /// Keep this below the lifetime the server grants so tokens are
    /// replaced before the server starts rejecting them.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,

    /// How long registered credentials, and caller data stored without an
    /// explicit TTL, stay in the cache.
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_seconds: u64,

    /// Interval of the background sweep that drops expired entries.
    /// Zero disables the sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_token_ttl() -> u64 {
    3000
}

fn default_credential_ttl() -> u64 {
    43200
}

fn default_sweep_interval() -> u64 {
    1200
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            auth_endpoint: default_auth_endpoint(),
            token_ttl_seconds: default_token_ttl(),
            credential_ttl_seconds: default_credential_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl ManagerConfig {
    /// Set the token endpoint.
    pub fn with_auth_endpoint(mut self, url: impl Into<String>) -> Self {
        self.auth_endpoint = url.into();
        self
    }

    /// Set the access token TTL.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl_seconds = ttl.as_secs();
        self
    }

    /// Set the credential TTL.
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl_seconds = ttl.as_secs();
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_seconds = interval.as_secs();
        self
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Parse and check the token endpoint.
    pub fn auth_endpoint_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.auth_endpoint).map_err(|e| Error::Config {
            message: format!("invalid auth_endpoint {:?}: {}", self.auth_endpoint, e),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config {
                message: format!("auth_endpoint must be http or https, got {}", other),
            }),
        }
    }

    /// Check the configuration for values the manager cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        self.auth_endpoint_url()?;

        if self.token_ttl_seconds == 0 {
            return Err(Error::Config {
                message: "token_ttl_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
