//! # drivepool Graph
//!
//! Microsoft Graph drive operations for pools managed by
//! [`drivepool_core::PoolManager`].
//!
//! [`GraphClient`] builds and sends the HTTP calls. [`Items`] runs them
//! through a manager so each call carries the pool's bearer token and is
//! retried once if Graph reports `InvalidAuthenticationToken`.
//!
//! ```rust,no_run
//! # async fn example() -> anyhow::Result<()> {
//! use drivepool_core::{ManagerConfig, PoolId, PoolManager};
//! use drivepool_graph::{GraphClient, Items, ListChildren};
//!
//! let manager = PoolManager::new(ManagerConfig::default())?;
//! let client = GraphClient::new(reqwest::Client::new())?;
//! let items = Items::new(&manager, &client);
//!
//! let page = items
//!     .list_children(&PoolId::new("personal"), ListChildren::root())
//!     .await?;
//! for item in page.value {
//!     println!("{}", item.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod items;
pub mod model;

pub use client::{GraphClient, DEFAULT_GRAPH_URL};
pub use items::Items;
pub use model::{ChildrenPage, DriveItem, File, Folder, ListChildren};
