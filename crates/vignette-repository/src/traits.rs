//! Repository abstraction trait
//!
//! This module defines the ContentRepository trait that all repository backends must
//! implement. The thumbnail pipeline only talks to the repository through this trait.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use vignette_core::{ItemRef, RepositoryBackend, RepositoryError, SourceItem, ThumbnailArtifact};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Handle on the thumbnail child of an item.
///
/// A node may exist without data (freshly added); [`ContentRepository::write_artifact`]
/// fills it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNode {
    pub item: ItemRef,
    pub name: String,
    pub path: String,
}

/// Encoded thumbnail and the metadata stored along with it.
#[derive(Debug, Clone)]
pub struct ArtifactWrite {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Content repository abstraction
///
/// Items are addressed by [`ItemRef`]. Every item may carry named thumbnail children;
/// each (item, name) pair has at most one child.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Look up an item by identity.
    async fn resolve(&self, item: &ItemRef) -> RepositoryResult<SourceItem>;

    /// Read the full binary content of a file item.
    async fn read_content(&self, item: &SourceItem) -> RepositoryResult<Bytes>;

    /// Make the item writable. Must be called before any thumbnail child is changed.
    async fn checkout(&self, item: &SourceItem) -> RepositoryResult<()>;

    /// Existing thumbnail child with the given name, if any.
    async fn find_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> RepositoryResult<Option<ArtifactNode>>;

    /// Create an empty thumbnail child.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] if a child with that name already
    /// exists, including one created concurrently since the last `find_child`.
    async fn add_image_child(&self, item: &SourceItem, name: &str)
        -> RepositoryResult<ArtifactNode>;

    /// Replace the data and metadata of a thumbnail child.
    async fn write_artifact(
        &self,
        node: &ArtifactNode,
        write: ArtifactWrite,
    ) -> RepositoryResult<ThumbnailArtifact>;

    /// Update the last-modified timestamp of the item itself.
    async fn set_last_modified(
        &self,
        item: &SourceItem,
        last_modified: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// All thumbnails written for an item, ordered by name.
    async fn list_artifacts(&self, item: &ItemRef) -> RepositoryResult<Vec<ThumbnailArtifact>>;

    /// Encoded data of a stored thumbnail.
    async fn read_artifact(&self, item: &ItemRef, name: &str) -> RepositoryResult<Bytes>;

    /// Get the repository backend type
    fn backend_type(&self) -> RepositoryBackend;
}

/// Check that `name` can be used as a thumbnail child name.
pub fn validate_child_name(name: &str) -> RepositoryResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(RepositoryError::InvalidPath(format!(
            "Invalid thumbnail name: '{}'",
            name
        )));
    }
    Ok(())
}
