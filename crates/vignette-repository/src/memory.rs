//! In-memory content repository
//!
//! Keeps items and their thumbnails in process memory. Used by tests and by the CLI
//! when no persistent backend is configured.

use crate::traits::{
    validate_child_name, ArtifactNode, ArtifactWrite, ContentRepository, RepositoryResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use vignette_core::{
    ItemRef, NodeType, RepositoryBackend, RepositoryError, SourceItem, ThumbnailArtifact,
};

struct StoredArtifact {
    node: ArtifactNode,
    data: Option<Bytes>,
    artifact: Option<ThumbnailArtifact>,
}

struct StoredItem {
    item: SourceItem,
    content: Bytes,
    checked_out: bool,
    children: BTreeMap<String, StoredArtifact>,
}

#[derive(Default)]
struct State {
    items: HashMap<ItemRef, StoredItem>,
    locked: HashSet<ItemRef>,
}

/// Repository implementation that stores everything in memory
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add (or replace) a file item. The name is the last segment of `path`.
    pub fn insert_file(
        &self,
        reference: ItemRef,
        path: &str,
        mime_type: Option<&str>,
        content: impl Into<Bytes>,
    ) -> SourceItem {
        let content = content.into();
        let item = SourceItem {
            reference,
            path: path.to_string(),
            name: name_from_path(path),
            node_type: NodeType::File,
            mime_type: mime_type.map(String::from),
            content_length: content.len() as u64,
            last_modified: Utc::now(),
        };
        self.insert_item(item.clone(), content);
        item
    }

    /// Add (or replace) a folder item.
    pub fn insert_folder(&self, reference: ItemRef, path: &str) -> SourceItem {
        let item = SourceItem {
            reference,
            path: path.to_string(),
            name: name_from_path(path),
            node_type: NodeType::Folder,
            mime_type: None,
            content_length: 0,
            last_modified: Utc::now(),
        };
        self.insert_item(item.clone(), Bytes::new());
        item
    }

    /// Add (or replace) an arbitrary item snapshot with the given content.
    pub fn insert_item(&self, item: SourceItem, content: Bytes) {
        self.state().items.insert(
            item.reference.clone(),
            StoredItem {
                item,
                content,
                checked_out: false,
                children: BTreeMap::new(),
            },
        );
    }

    pub fn remove_item(&self, reference: &ItemRef) {
        self.state().items.remove(reference);
    }

    /// Make checkout of the item fail, as if another session held a lock on it.
    pub fn lock_item(&self, reference: &ItemRef) {
        self.state().locked.insert(reference.clone());
    }

    pub fn unlock_item(&self, reference: &ItemRef) {
        self.state().locked.remove(reference);
    }

    /// Make every artifact write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current snapshot of an item.
    pub fn item(&self, reference: &ItemRef) -> Option<SourceItem> {
        self.state().items.get(reference).map(|s| s.item.clone())
    }

    /// Stored thumbnail metadata, if the child exists and has been written.
    pub fn artifact(&self, reference: &ItemRef, name: &str) -> Option<ThumbnailArtifact> {
        self.state()
            .items
            .get(reference)
            .and_then(|s| s.children.get(name))
            .and_then(|c| c.artifact.clone())
    }

    /// Number of thumbnail children of an item, written or not.
    pub fn child_count(&self, reference: &ItemRef) -> usize {
        self.state()
            .items
            .get(reference)
            .map(|s| s.children.len())
            .unwrap_or(0)
    }
}

fn name_from_path(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn resolve(&self, item: &ItemRef) -> RepositoryResult<SourceItem> {
        self.state()
            .items
            .get(item)
            .map(|s| s.item.clone())
            .ok_or_else(|| RepositoryError::NotFound(item.to_string()))
    }

    async fn read_content(&self, item: &SourceItem) -> RepositoryResult<Bytes> {
        let state = self.state();
        let stored = state
            .items
            .get(&item.reference)
            .ok_or_else(|| RepositoryError::NotFound(item.path.clone()))?;

        if stored.item.node_type != NodeType::File {
            return Err(RepositoryError::ReadFailed(format!(
                "{} has no content stream",
                item.path
            )));
        }

        Ok(stored.content.clone())
    }

    async fn checkout(&self, item: &SourceItem) -> RepositoryResult<()> {
        let mut state = self.state();
        if state.locked.contains(&item.reference) {
            return Err(RepositoryError::CheckoutFailed(format!(
                "{} is locked",
                item.path
            )));
        }

        let stored = state
            .items
            .get_mut(&item.reference)
            .ok_or_else(|| RepositoryError::NotFound(item.path.clone()))?;
        stored.checked_out = true;

        tracing::trace!(path = %item.path, "Item checked out");
        Ok(())
    }

    async fn find_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> RepositoryResult<Option<ArtifactNode>> {
        validate_child_name(name)?;
        let state = self.state();
        let stored = state
            .items
            .get(&item.reference)
            .ok_or_else(|| RepositoryError::NotFound(item.path.clone()))?;

        Ok(stored.children.get(name).map(|c| c.node.clone()))
    }

    async fn add_image_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> RepositoryResult<ArtifactNode> {
        validate_child_name(name)?;
        let mut state = self.state();
        let stored = state
            .items
            .get_mut(&item.reference)
            .ok_or_else(|| RepositoryError::NotFound(item.path.clone()))?;

        if !stored.checked_out {
            return Err(RepositoryError::WriteFailed(format!(
                "{} is not checked out",
                item.path
            )));
        }
        if stored.children.contains_key(name) {
            return Err(RepositoryError::AlreadyExists(format!(
                "{} already has a child named '{}'",
                item.path, name
            )));
        }

        let node = ArtifactNode {
            item: item.reference.clone(),
            name: name.to_string(),
            path: format!("{}/{}", stored.item.path.trim_end_matches('/'), name),
        };
        stored.children.insert(
            name.to_string(),
            StoredArtifact {
                node: node.clone(),
                data: None,
                artifact: None,
            },
        );

        Ok(node)
    }

    async fn write_artifact(
        &self,
        node: &ArtifactNode,
        write: ArtifactWrite,
    ) -> RepositoryResult<ThumbnailArtifact> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::WriteFailed(format!(
                "Write rejected for {}",
                node.path
            )));
        }

        let mut state = self.state();
        let stored = state
            .items
            .get_mut(&node.item)
            .ok_or_else(|| RepositoryError::NotFound(node.item.to_string()))?;

        if !stored.checked_out {
            return Err(RepositoryError::WriteFailed(format!(
                "{} is not checked out",
                stored.item.path
            )));
        }

        let child = stored
            .children
            .get_mut(&node.name)
            .ok_or_else(|| RepositoryError::NotFound(node.path.clone()))?;

        let artifact = ThumbnailArtifact {
            item: node.item.clone(),
            name: node.name.clone(),
            path: node.path.clone(),
            width: write.width,
            height: write.height,
            mime_type: write.mime_type,
            size_bytes: write.data.len() as u64,
            last_modified: write.last_modified,
        };

        child.data = Some(Bytes::from(write.data));
        child.artifact = Some(artifact.clone());

        Ok(artifact)
    }

    async fn set_last_modified(
        &self,
        item: &SourceItem,
        last_modified: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        let stored = state
            .items
            .get_mut(&item.reference)
            .ok_or_else(|| RepositoryError::NotFound(item.path.clone()))?;

        if !stored.checked_out {
            return Err(RepositoryError::WriteFailed(format!(
                "{} is not checked out",
                item.path
            )));
        }

        stored.item.last_modified = last_modified;
        Ok(())
    }

    async fn list_artifacts(&self, item: &ItemRef) -> RepositoryResult<Vec<ThumbnailArtifact>> {
        let state = self.state();
        let stored = state
            .items
            .get(item)
            .ok_or_else(|| RepositoryError::NotFound(item.to_string()))?;

        Ok(stored
            .children
            .values()
            .filter_map(|c| c.artifact.clone())
            .collect())
    }

    async fn read_artifact(&self, item: &ItemRef, name: &str) -> RepositoryResult<Bytes> {
        let state = self.state();
        state
            .items
            .get(item)
            .and_then(|s| s.children.get(name))
            .and_then(|c| c.data.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("{}/{}", item, name)))
    }

    fn backend_type(&self) -> RepositoryBackend {
        RepositoryBackend::Memory
    }
}
