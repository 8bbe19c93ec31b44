//! Vignette Core Library
//!
//! This crate provides the domain models, mime group matching, configuration and
//! error types shared by every Vignette component.

pub mod config;
pub mod error;
pub mod job_error;
pub mod mime;
pub mod models;

// Re-export commonly used types
pub use config::{
    ConverterConfig, DocumentThumbnailConfig, QueueConfig, RepositoryBackend, RepositoryConfig,
    VideoThumbnailConfig, VignetteConfig,
};
pub use error::{ConversionError, LogLevel, RepositoryError, ThumbnailError};
pub use job_error::JobError;
pub use mime::MimeGroups;
pub use models::{
    GenerationParams, ItemRef, JobKey, NodeType, SourceItem, ThumbnailArtifact,
    ThumbnailDimensions, ThumbnailFormat, ThumbnailJob,
};
