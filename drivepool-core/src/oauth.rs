//! OAuth 2.0 refresh-token grant.
//!
//! A single POST to the authorization server's token endpoint, with the
//! client registration and refresh token sent as form data. Retry policy is
//! left to the caller.

use serde::Deserialize;
use url::Url;

use crate::credentials::CredentialSet;
use crate::secret::Secret;
use crate::token::TokenError;

/// Default token endpoint (Microsoft identity platform, multi-tenant).
pub const DEFAULT_AUTH_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Successful response from the token endpoint.
///
/// Only `access_token` is required. `refresh_token` is present when the
/// server rotates it.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret,

    #[serde(default)]
    pub refresh_token: Option<Secret>,

    /// Lifetime the server grants, in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// Run the refresh-token grant for a credential set.
///
/// Sends `client_id`, `client_secret`, `redirect_uri`, `refresh_token` and
/// `grant_type=refresh_token` as `application/x-www-form-urlencoded`.
pub async fn refresh_grant(
    client: &reqwest::Client,
    endpoint: &Url,
    credentials: &CredentialSet,
) -> Result<TokenResponse, TokenError> {
    let response = client
        .post(endpoint.clone())
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("refresh_token", credentials.refresh_token.expose()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| TokenError::Network {
            message: format!("token request failed: {}", e),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(TokenError::TokenRefresh {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| TokenError::InvalidResponse {
            message: format!("could not decode token response: {}", e),
        })
}
