//! Pool-aware drive operations.

use std::collections::HashSet;

use drivepool_core::{Error, PoolId, PoolManager};

use crate::client::GraphClient;
use crate::model::{ChildrenPage, DriveItem, ListChildren};

/// Drive item operations that run through a [`PoolManager`].
///
/// Every call resolves the pool's token, and repeats once with a fresh
/// token when Graph rejects the cached one.
#[derive(Debug, Clone, Copy)]
pub struct Items<'a> {
    manager: &'a PoolManager,
    client: &'a GraphClient,
}

impl<'a> Items<'a> {
    pub fn new(manager: &'a PoolManager, client: &'a GraphClient) -> Self {
        Self { manager, client }
    }

    /// List one page of children of a drive item.
    pub async fn list_children(
        &self,
        pool: &PoolId,
        params: ListChildren,
    ) -> Result<ChildrenPage, Error> {
        let client = self.client;
        self.manager
            .invoke(pool, params, move |req| client.list_children(req))
            .await
    }

    /// Fetch a page from a link returned by an earlier listing.
    pub async fn get_by_link(&self, pool: &PoolId, link: &str) -> Result<ChildrenPage, Error> {
        let client = self.client;
        self.manager
            .invoke(pool, link.to_string(), move |req| client.get_by_link(req))
            .await
    }

    /// List all children, following `@odata.nextLink` until the last page.
    ///
    /// Stops early if the server hands out a link it already returned.
    pub async fn list_all_children(
        &self,
        pool: &PoolId,
        params: ListChildren,
    ) -> Result<Vec<DriveItem>, Error> {
        let mut page = self.list_children(pool, params).await?;
        let mut items = std::mem::take(&mut page.value);
        let mut followed = HashSet::new();

        while let Some(link) = page.next_link.take() {
            if !followed.insert(link.clone()) {
                tracing::warn!(
                    pool = %pool,
                    fetched = items.len(),
                    "Next link repeats an earlier page, stopping"
                );
                break;
            }

            tracing::debug!(pool = %pool, fetched = items.len(), "Following next link");
            page = self.get_by_link(pool, &link).await?;
            items.append(&mut page.value);
        }

        Ok(items)
    }
}
