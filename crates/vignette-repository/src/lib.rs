//! Vignette Repository Library
//!
//! This crate provides the content repository abstraction used by the thumbnail
//! pipeline, and two implementations: an in-memory store and a local filesystem tree.
//!
//! # Thumbnail layout
//!
//! A thumbnail is a named child of its source item. There is at most one child per
//! (item, name); writing a thumbnail under an existing name replaces it. Names must be
//! a single path segment and must not start with `.`.

pub mod factory;
#[cfg(feature = "repository-local")]
pub mod local;
#[cfg(feature = "repository-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_repository;
#[cfg(feature = "repository-local")]
pub use local::LocalRepository;
#[cfg(feature = "repository-memory")]
pub use memory::InMemoryRepository;
pub use traits::{
    validate_child_name, ArtifactNode, ArtifactWrite, ContentRepository, RepositoryResult,
};
pub use vignette_core::{RepositoryBackend, RepositoryError};
