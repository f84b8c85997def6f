//! HTTP call builders for Graph drive endpoints.
//!
//! Each call takes an [`Authorized`] request and reports failures as
//! [`UpstreamError`], which is the shape the pool invoker expects.

use drivepool_core::{Authorized, UpstreamError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::model::{ChildrenPage, ListChildren};

/// Base URL of the Microsoft Graph v1.0 API.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0/";

/// Thin client for the drive endpoints of Microsoft Graph.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GraphClient {
    /// Create a client for the public Graph endpoint.
    pub fn new(http: reqwest::Client) -> Result<Self, url::ParseError> {
        Self::with_base_url(http, DEFAULT_GRAPH_URL)
    }

    /// Create a client for a custom base URL (national clouds, tests).
    pub fn with_base_url(http: reqwest::Client, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {base}/{me | users/{user}}/drive/items/{item_id}/children`
    pub async fn list_children(
        &self,
        request: Authorized<ListChildren>,
    ) -> Result<ChildrenPage, UpstreamError> {
        let url = self.children_url(&request.params)?;
        tracing::debug!(url = %url, "Listing drive children");
        self.get_json(url, &request.authorization).await
    }

    /// `GET` a link returned by a previous call, such as `@odata.nextLink`.
    ///
    /// The link must point at the same origin as the base URL so the
    /// bearer token is never sent elsewhere.
    pub async fn get_by_link(
        &self,
        request: Authorized<String>,
    ) -> Result<ChildrenPage, UpstreamError> {
        let url = Url::parse(&request.params).map_err(|e| UpstreamError::InvalidRequest {
            message: format!("invalid link {:?}: {}", request.params, e),
        })?;

        if url.origin() != self.base_url.origin() {
            return Err(UpstreamError::InvalidRequest {
                message: format!(
                    "link {} is outside {}",
                    url,
                    self.base_url.origin().ascii_serialization()
                ),
            });
        }

        self.get_json(url, &request.authorization).await
    }

    /// Build the children URL, percent-encoding the item and user segments.
    pub fn children_url(&self, params: &ListChildren) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                UpstreamError::InvalidRequest {
                    message: format!("base URL {} cannot hold a path", self.base_url),
                }
            })?;
            segments.pop_if_empty();

            match (params.shared, params.user.as_deref()) {
                (true, None) => {
                    return Err(UpstreamError::InvalidRequest {
                        message: "shared is set but user is missing".to_string(),
                    });
                }
                (true, Some(user)) => {
                    segments.push("users").push(user);
                }
                (false, _) => {
                    segments.push("me");
                }
            }

            segments.extend(["drive", "items", params.item_id_or_root(), "children"]);
        }

        url.set_query(params.query.as_deref().filter(|q| !q.is_empty()));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        authorization: &str,
    ) -> Result<T, UpstreamError> {
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse {
                message: e.to_string(),
            })
    }
}
