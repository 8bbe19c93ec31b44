use crate::traits::{
    validate_child_name, ArtifactNode, ArtifactWrite, ContentRepository, RepositoryResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;
use vignette_core::{
    ItemRef, NodeType, RepositoryBackend, RepositoryError, SourceItem, ThumbnailArtifact,
};

/// Directory, inside each workspace, holding thumbnails and item metadata.
const META_DIR: &str = ".vignette";
const ITEM_META_FILE: &str = ".item.json";
const ARTIFACT_DATA_FILE: &str = "data";
const ARTIFACT_META_FILE: &str = "meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct ItemMeta {
    last_modified: DateTime<Utc>,
}

/// Contents of an artifact's `meta.json`.
///
/// `data_file` names the data file the metadata describes, so replacing the metadata
/// switches both at once.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactMeta {
    #[serde(flatten)]
    artifact: ThumbnailArtifact,
    #[serde(default = "default_data_file")]
    data_file: String,
}

fn default_data_file() -> String {
    ARTIFACT_DATA_FILE.to_string()
}

impl ArtifactMeta {
    fn data_path(&self, dir: &Path) -> RepositoryResult<PathBuf> {
        if !is_single_normal_component(Path::new(&self.data_file)) {
            return Err(RepositoryError::Metadata(format!(
                "Invalid data file '{}' for {}",
                self.data_file, self.artifact.path
            )));
        }
        Ok(dir.join(&self.data_file))
    }
}

/// Local filesystem repository implementation
///
/// Items are plain files below `<base>/<workspace>/`; the item id is the path relative
/// to the workspace directory. Thumbnails of `<workspace>/<id>` live in
/// `<workspace>/.vignette/<id>/<name>/` as a data file plus a JSON metadata file naming
/// it. A write lands in a fresh data file first; renaming the new metadata into place
/// commits it, so readers see either the old thumbnail or the new one.
#[derive(Clone)]
pub struct LocalRepository {
    base_path: PathBuf,
}

impl LocalRepository {
    /// Create a new LocalRepository instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory holding one directory per workspace
    pub async fn new(base_path: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            RepositoryError::ConfigError(format!(
                "Failed to create repository directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalRepository { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert an item reference to its filesystem path with security validation
    ///
    /// Rejects workspaces and ids that could escape the base directory or reach into
    /// the metadata directory.
    fn item_path(&self, item: &ItemRef) -> RepositoryResult<PathBuf> {
        let workspace = Path::new(&item.workspace);
        let id = Path::new(&item.id);

        if item.workspace.is_empty() || !is_single_normal_component(workspace) {
            return Err(RepositoryError::InvalidPath(format!(
                "Invalid workspace: '{}'",
                item.workspace
            )));
        }

        if item.id.is_empty()
            || item.id.contains('\0')
            || !id.components().all(|c| matches!(c, Component::Normal(_)))
            || id
                .components()
                .next()
                .is_some_and(|c| c.as_os_str() == META_DIR)
        {
            return Err(RepositoryError::InvalidPath(format!(
                "Invalid item id: '{}'",
                item.id
            )));
        }

        let path = self.base_path.join(workspace).join(id);

        if let (Ok(base), Ok(canonical)) = (self.base_path.canonicalize(), path.canonicalize()) {
            if canonical.strip_prefix(&base).is_err() {
                return Err(RepositoryError::InvalidPath(format!(
                    "Item id resolves outside repository: '{}'",
                    item.id
                )));
            }
        }

        Ok(path)
    }

    /// Directory holding all thumbnails of an item.
    fn meta_dir(&self, item: &ItemRef) -> RepositoryResult<PathBuf> {
        self.item_path(item)?;
        Ok(self
            .base_path
            .join(&item.workspace)
            .join(META_DIR)
            .join(&item.id))
    }

    fn artifact_dir(&self, item: &ItemRef, name: &str) -> RepositoryResult<PathBuf> {
        validate_child_name(name)?;
        Ok(self.meta_dir(item)?.join(name))
    }

    fn artifact_path(item: &SourceItem, name: &str) -> String {
        format!("{}/{}", item.path.trim_end_matches('/'), name)
    }

    async fn read_item_meta(&self, item: &ItemRef) -> RepositoryResult<Option<ItemMeta>> {
        let path = self.meta_dir(item)?.join(ITEM_META_FILE);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_artifact_meta(
        &self,
        item: &ItemRef,
        name: &str,
    ) -> RepositoryResult<Option<ArtifactMeta>> {
        let path = self.artifact_dir(item, name)?.join(ARTIFACT_META_FILE);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write thumbnail data under a name no reader references yet.
    async fn stage_data(&self, dir: &Path, data: &[u8]) -> RepositoryResult<String> {
        let data_file = format!("{}-{}", ARTIFACT_DATA_FILE, Uuid::new_v4());
        write_atomic(&dir.join(&data_file), data).await?;
        Ok(data_file)
    }

    /// Point the metadata at a staged data file and drop the data it replaces.
    async fn commit_meta(
        &self,
        node: &ArtifactNode,
        dir: &Path,
        meta: &ArtifactMeta,
    ) -> RepositoryResult<()> {
        let previous = self.read_artifact_meta(&node.item, &node.name).await.ok().flatten();

        write_atomic(&dir.join(ARTIFACT_META_FILE), &serde_json::to_vec_pretty(meta)?).await?;

        let stale = previous
            .filter(|p| p.data_file != meta.data_file)
            .and_then(|p| p.data_path(dir).ok());
        if let Some(stale) = stale {
            if let Err(e) = fs::remove_file(&stale).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %stale.display(),
                        error = %e,
                        "Failed to remove replaced thumbnail data"
                    );
                }
            }
        }
        Ok(())
    }
}

fn is_single_normal_component(path: &Path) -> bool {
    let mut components = path.components();
    matches!(components.next(), Some(Component::Normal(c)) if c != META_DIR)
        && components.next().is_none()
}

/// Write `data` next to `path` under a temporary name, then rename it into place.
async fn write_atomic(path: &Path, data: &[u8]) -> RepositoryResult<()> {
    let parent = path.parent().ok_or_else(|| {
        RepositoryError::WriteFailed(format!("No parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(parent).await?;

    let tmp = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(RepositoryError::WriteFailed(format!(
            "Failed to write {}: {}",
            tmp.display(),
            e
        )));
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(RepositoryError::WriteFailed(format!(
            "Failed to replace {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

#[async_trait]
impl ContentRepository for LocalRepository {
    async fn resolve(&self, item: &ItemRef) -> RepositoryResult<SourceItem> {
        let path = self.item_path(item)?;

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound(item.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let node_type = if metadata.is_symlink() {
            NodeType::Reference
        } else if metadata.is_dir() {
            NodeType::Folder
        } else {
            NodeType::File
        };

        let (mime_type, content_length) = match node_type {
            NodeType::File => (
                mime_guess::from_path(&path).first_raw().map(String::from),
                metadata.len(),
            ),
            _ => (None, 0),
        };

        let last_modified = match self.read_item_meta(item).await? {
            Some(meta) => meta.last_modified,
            None => metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now()),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(SourceItem {
            reference: item.clone(),
            path: format!("/{}", item.id.trim_start_matches('/')),
            name,
            node_type,
            mime_type,
            content_length,
            last_modified,
        })
    }

    async fn read_content(&self, item: &SourceItem) -> RepositoryResult<Bytes> {
        if !item.is_file() {
            return Err(RepositoryError::ReadFailed(format!(
                "{} has no content stream",
                item.path
            )));
        }

        let path = self.item_path(&item.reference)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RepositoryError::NotFound(item.path.clone()),
            _ => RepositoryError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            )),
        })?;

        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local repository read successful"
        );

        Ok(Bytes::from(data))
    }

    async fn checkout(&self, item: &SourceItem) -> RepositoryResult<()> {
        let path = self.item_path(&item.reference)?;
        let metadata = fs::symlink_metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RepositoryError::NotFound(item.path.clone()),
            _ => RepositoryError::CheckoutFailed(format!("{}: {}", item.path, e)),
        })?;

        if metadata.permissions().readonly() {
            return Err(RepositoryError::CheckoutFailed(format!(
                "{} is read-only",
                item.path
            )));
        }

        fs::create_dir_all(self.meta_dir(&item.reference)?)
            .await
            .map_err(|e| RepositoryError::CheckoutFailed(format!("{}: {}", item.path, e)))?;

        Ok(())
    }

    async fn find_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> RepositoryResult<Option<ArtifactNode>> {
        let dir = self.artifact_dir(&item.reference, name)?;
        if !fs::try_exists(&dir).await? {
            return Ok(None);
        }

        Ok(Some(ArtifactNode {
            item: item.reference.clone(),
            name: name.to_string(),
            path: Self::artifact_path(item, name),
        }))
    }

    async fn add_image_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> RepositoryResult<ArtifactNode> {
        let dir = self.artifact_dir(&item.reference, name)?;
        fs::create_dir(&dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => RepositoryError::AlreadyExists(format!(
                "{} already has a child named '{}'",
                item.path, name
            )),
            _ => RepositoryError::WriteFailed(format!(
                "Failed to add thumbnail '{}' to {}: {}",
                name, item.path, e
            )),
        })?;

        Ok(ArtifactNode {
            item: item.reference.clone(),
            name: name.to_string(),
            path: Self::artifact_path(item, name),
        })
    }

    async fn write_artifact(
        &self,
        node: &ArtifactNode,
        write: ArtifactWrite,
    ) -> RepositoryResult<ThumbnailArtifact> {
        let dir = self.artifact_dir(&node.item, &node.name)?;
        if !fs::try_exists(&dir).await? {
            return Err(RepositoryError::NotFound(node.path.clone()));
        }

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

        let start = std::time::Instant::now();
        let data_file = self.stage_data(&dir, &write.data).await?;
        let meta = ArtifactMeta {
            artifact,
            data_file,
        };
        if let Err(e) = self.commit_meta(node, &dir, &meta).await {
            let _ = fs::remove_file(dir.join(&meta.data_file)).await;
            return Err(e);
        }
        let artifact = meta.artifact;

        tracing::debug!(
            path = %dir.display(),
            size_bytes = artifact.size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local repository thumbnail written"
        );

        Ok(artifact)
    }

    async fn set_last_modified(
        &self,
        item: &SourceItem,
        last_modified: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let path = self.meta_dir(&item.reference)?.join(ITEM_META_FILE);
        let meta = ItemMeta { last_modified };
        write_atomic(&path, &serde_json::to_vec_pretty(&meta)?).await
    }

    async fn list_artifacts(&self, item: &ItemRef) -> RepositoryResult<Vec<ThumbnailArtifact>> {
        let dir = self.meta_dir(item)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_child_name(&name).is_err() {
                continue;
            }
            if let Some(meta) = self.read_artifact_meta(item, &name).await? {
                artifacts.push(meta.artifact);
            }
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    async fn read_artifact(&self, item: &ItemRef, name: &str) -> RepositoryResult<Bytes> {
        let meta = self
            .read_artifact_meta(item, name)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("{}/{}", item, name)))?;
        let path = meta.data_path(&self.artifact_dir(item, name)?)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepositoryError::NotFound(
                format!("{}/{}", item, name),
            )),
            Err(e) => Err(RepositoryError::ReadFailed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn backend_type(&self) -> RepositoryBackend {
        RepositoryBackend::Local
    }
}
