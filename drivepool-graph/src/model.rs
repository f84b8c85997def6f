//! Drive item types and operation parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters for listing the children of a drive item.
///
/// # Examples
///
/// ```
/// use drivepool_graph::ListChildren;
///
/// let root = ListChildren::root();
/// let shared = ListChildren::item("01ABCDEF").shared_by("someone@example.com");
/// let paged = ListChildren::root().with_query("$top=50&$select=id,name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListChildren {
    /// Parent item ID. `None` lists the drive root.
    #[serde(default)]
    pub item_id: Option<String>,

    /// Whether the item lives in another user's drive.
    ///
    /// Requires `user` to be set.
    #[serde(default)]
    pub shared: bool,

    /// Owner of the shared drive.
    #[serde(default)]
    pub user: Option<String>,

    /// Raw OData query options, without the leading `?`.
    #[serde(default)]
    pub query: Option<String>,
}

impl ListChildren {
    /// List the root of the signed-in user's drive.
    pub fn root() -> Self {
        Self::default()
    }

    /// List the children of a specific item.
    pub fn item(item_id: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            ..Self::default()
        }
    }

    /// Read from a drive shared by `user`.
    pub fn shared_by(mut self, user: impl Into<String>) -> Self {
        self.shared = true;
        self.user = Some(user.into());
        self
    }

    /// Attach OData query options such as `$top=10`.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// The item ID to list, defaulting to `root`.
    pub fn item_id_or_root(&self) -> &str {
        self.item_id.as_deref().unwrap_or("root")
    }
}

/// One page of a children listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildrenPage {
    #[serde(default)]
    pub value: Vec<DriveItem>,

    /// Link to the next page, passed to `get_by_link`.
    #[serde(rename = "@odata.nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// A file or folder in a drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub size: Option<u64>,

    #[serde(default)]
    pub web_url: Option<String>,

    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,

    /// Present when the item is a folder.
    #[serde(default)]
    pub folder: Option<Folder>,

    /// Present when the item is a file.
    #[serde(default)]
    pub file: Option<File>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(default)]
    pub child_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(default)]
    pub mime_type: Option<String>,
}
