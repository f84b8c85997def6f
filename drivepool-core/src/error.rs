//! Top-level error types for drivepool.

use thiserror::Error;

use crate::invoker::UpstreamError;
use crate::token::TokenError;

/// Top-level error type encompassing all drivepool errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A token could not be resolved or refreshed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Credentials were stored but the validating token acquisition failed.
    ///
    /// The credentials stay registered; call `abort_connection` to drop them.
    #[error("credentials for pool {pool} were rejected: {source}")]
    Connection {
        pool: String,
        #[source]
        source: TokenError,
    },

    /// The remote operation failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Whether the pool had no registered credentials.
    pub fn is_missing_credentials(&self) -> bool {
        matches!(
            self,
            Self::Token(TokenError::MissingCredentials { .. })
                | Self::Connection {
                    source: TokenError::MissingCredentials { .. },
                    ..
                }
        )
    }

    /// The upstream failure, if this error came from the remote operation.
    pub fn as_upstream(&self) -> Option<&UpstreamError> {
        match self {
            Self::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

/// Result alias for drivepool operations.
pub type Result<T> = std::result::Result<T, Error>;
