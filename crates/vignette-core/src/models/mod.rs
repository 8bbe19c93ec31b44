pub mod artifact;
pub mod item;
pub mod job;

pub use artifact::{ThumbnailArtifact, ThumbnailDimensions, ThumbnailFormat};
pub use item::{ItemRef, NodeType, SourceItem};
pub use job::{GenerationParams, JobKey, ThumbnailJob};
