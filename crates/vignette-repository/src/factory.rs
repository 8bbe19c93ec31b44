#[cfg(feature = "repository-local")]
use crate::LocalRepository;
#[cfg(feature = "repository-memory")]
use crate::InMemoryRepository;
use crate::{ContentRepository, RepositoryResult};
use std::sync::Arc;
#[allow(unused_imports)]
use vignette_core::{RepositoryBackend, RepositoryConfig, RepositoryError};

/// Create a repository backend based on configuration
pub async fn create_repository(
    config: &RepositoryConfig,
) -> RepositoryResult<Arc<dyn ContentRepository>> {
    match config.backend {
        #[cfg(feature = "repository-local")]
        RepositoryBackend::Local => {
            let base_path = config.path.clone().ok_or_else(|| {
                RepositoryError::ConfigError("REPOSITORY_PATH not configured".to_string())
            })?;

            let repository = LocalRepository::new(base_path).await?;
            Ok(Arc::new(repository))
        }

        #[cfg(not(feature = "repository-local"))]
        RepositoryBackend::Local => Err(RepositoryError::ConfigError(
            "Local repository backend not available (repository-local feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "repository-memory")]
        RepositoryBackend::Memory => Ok(Arc::new(InMemoryRepository::new())),

        #[cfg(not(feature = "repository-memory"))]
        RepositoryBackend::Memory => Err(RepositoryError::ConfigError(
            "Memory repository backend not available (repository-memory feature not enabled)"
                .to_string(),
        )),
    }
}

#[cfg(all(test, feature = "repository-local", feature = "repository-memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_repository() {
        let config = RepositoryConfig {
            backend: RepositoryBackend::Memory,
            path: None,
        };
        let repo = create_repository(&config).await.unwrap();
        assert_eq!(repo.backend_type(), RepositoryBackend::Memory);
    }

    #[tokio::test]
    async fn test_create_local_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RepositoryConfig {
            backend: RepositoryBackend::Local,
            path: Some(dir.path().join("content").to_string_lossy().into_owned()),
        };
        let repo = create_repository(&config).await.unwrap();
        assert_eq!(repo.backend_type(), RepositoryBackend::Local);
        assert!(dir.path().join("content").is_dir());
    }

    #[tokio::test]
    async fn test_local_repository_requires_path() {
        let config = RepositoryConfig {
            backend: RepositoryBackend::Local,
            path: None,
        };
        assert!(matches!(
            create_repository(&config).await,
            Err(RepositoryError::ConfigError(_))
        ));
    }
}
