use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Plain-data identity of a repository item.
///
/// This is what crosses request boundaries (deferred jobs, CLI arguments); the item
/// itself is re-resolved from the repository whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub workspace: String,
}

impl ItemRef {
    pub fn new(id: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace: workspace.into(),
        }
    }
}

impl Display for ItemRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.workspace, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A concrete file carrying a binary content stream.
    File,
    Folder,
    /// A pointer to content stored elsewhere; has no readable stream of its own.
    Reference,
}

/// Snapshot of a repository item as seen by the thumbnail pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub reference: ItemRef,
    pub path: String,
    pub name: String,
    pub node_type: NodeType,
    pub mime_type: Option<String>,
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
}

impl SourceItem {
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    /// A file node without any content, e.g. an upload that has not completed yet.
    pub fn is_placeholder(&self) -> bool {
        self.is_file() && self.content_length == 0
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}
