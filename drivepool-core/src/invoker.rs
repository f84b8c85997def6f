//! Authorized invocation of remote operations with a single token retry.
//!
//! [`RetryingInvoker`] resolves a pool's access token, hands it to a remote
//! operation as an `Authorization` header, and when the upstream rejects the
//! token as invalid or expired, forces a refresh and calls the operation
//! exactly once more.
//!
//! Which failures count as "token rejected" is decided by an
//! [`AuthFailurePredicate`]. The default,
//! [`is_invalid_authentication_token`], understands Microsoft Graph error
//! payloads.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::error::Error;
use crate::model::PoolId;
use crate::token::TokenManager;

/// Graph error code for a missing, malformed or expired bearer token.
pub const INVALID_AUTHENTICATION_TOKEN: &str = "InvalidAuthenticationToken";

/// Failure reported by a remote operation.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The remote API answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: Value },

    /// The request never got a response (timeout, reset, DNS, ...).
    #[error("upstream transport error: {message}")]
    Transport { message: String },

    /// The operation refused its parameters before sending anything.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The remote API answered with a success status but an unusable body.
    #[error("invalid upstream response: {message}")]
    InvalidResponse { message: String },
}

impl UpstreamError {
    /// HTTP status of the upstream response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded error payload of the upstream response, if there was one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Decides whether an upstream failure means the access token was rejected.
pub type AuthFailurePredicate = fn(&UpstreamError) -> bool;

/// Graph classification: `error.code == "InvalidAuthenticationToken"`.
pub fn is_invalid_authentication_token(error: &UpstreamError) -> bool {
    error
        .payload()
        .and_then(|body| body.pointer("/error/code"))
        .and_then(Value::as_str)
        == Some(INVALID_AUTHENTICATION_TOKEN)
}

/// Parameters of a remote operation together with its authorization.
#[derive(Debug, Clone)]
pub struct Authorized<P> {
    /// Full `Authorization` header value, e.g. `Bearer eyJ0...`.
    pub authorization: String,

    /// Caller-supplied operation parameters.
    pub params: P,
}

/// Runs remote operations with a resolved access token.
///
/// # Retry Policy
///
/// At most one retry, and only after a token rejection:
/// 1. Resolve the pool's token (cached, or refreshed on a miss)
/// 2. Call the operation
/// 3. If the upstream rejected the token, force a refresh and call again
/// 4. Return whatever the last call produced
///
/// Transport errors and every other upstream failure propagate on first
/// occurrence. There is no backoff and no configurable retry count.
pub struct RetryingInvoker<T: ?Sized> {
    tokens: Arc<T>,
    is_auth_failure: AuthFailurePredicate,
}

impl<T: TokenManager + ?Sized> RetryingInvoker<T> {
    /// Create an invoker using the Graph token-rejection classification.
    pub fn new(tokens: Arc<T>) -> Self {
        Self {
            tokens,
            is_auth_failure: is_invalid_authentication_token,
        }
    }

    /// Replace the token-rejection classification.
    pub fn with_predicate(mut self, predicate: AuthFailurePredicate) -> Self {
        self.is_auth_failure = predicate;
        self
    }

    /// The token manager this invoker resolves tokens from.
    pub fn tokens(&self) -> &Arc<T> {
        &self.tokens
    }

    /// Invoke `operation` for `pool` with `params`.
    ///
    /// `params` is cloned for the first attempt so it can be reused on the
    /// retry.
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
        let token = self.tokens.resolve_token(pool).await?;

        let first = operation(Authorized {
            authorization: token.authorization_header(),
            params: params.clone(),
        })
        .await;

        let error = match first {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        if !(self.is_auth_failure)(&error) {
            return Err(error.into());
        }

        tracing::debug!(
            pool = %pool,
            status = ?error.status(),
            "Upstream rejected access token, refreshing and retrying once"
        );

        let token = self.tokens.refresh(pool).await?;

        operation(Authorized {
            authorization: token.authorization_header(),
            params,
        })
        .await
        .map_err(Error::from)
    }
}

impl<T: ?Sized> std::fmt::Debug for RetryingInvoker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingInvoker").finish_non_exhaustive()
    }
}
