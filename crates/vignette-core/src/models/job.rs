use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::artifact::ThumbnailDimensions;
use super::item::ItemRef;

/// Size parameters of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationParams {
    /// First page of a document, scaled into a `size x size` square.
    Document { size: u32 },
    /// Frame at `offset_seconds` from the start, scaled into `size`.
    Video {
        offset_seconds: i64,
        size: ThumbnailDimensions,
    },
}

impl GenerationParams {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationParams::Document { .. } => "document",
            GenerationParams::Video { .. } => "video",
        }
    }
}

impl Display for GenerationParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GenerationParams::Document { size } => write!(f, "document {}x{}", size, size),
            GenerationParams::Video {
                offset_seconds,
                size,
            } => write!(f, "video {} @{}s", size, offset_seconds),
        }
    }
}

/// Key under which generation runs are deduplicated and serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub item: ItemRef,
    pub thumbnail_name: String,
}

impl Display for JobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.item, self.thumbnail_name)
    }
}

/// Deferred unit of work: an immutable snapshot of a generation request.
///
/// Only identifiers and primitives are stored. The session that created the job is
/// usually gone by the time it runs, so the item is resolved again on execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailJob {
    pub id: Uuid,
    pub display_name: String,
    pub item: ItemRef,
    pub thumbnail_name: String,
    pub params: GenerationParams,
    pub created_at: DateTime<Utc>,
    pub retry_count: i32,
}

impl ThumbnailJob {
    pub fn new(
        item: ItemRef,
        item_name: &str,
        thumbnail_name: impl Into<String>,
        params: GenerationParams,
    ) -> Self {
        let display_name = match params {
            GenerationParams::Document { .. } => format!("Document thumbnail for {}", item_name),
            GenerationParams::Video { .. } => format!("Video thumbnail for {}", item_name),
        };

        Self {
            id: Uuid::new_v4(),
            display_name,
            item,
            thumbnail_name: thumbnail_name.into(),
            params,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            item: self.item.clone(),
            thumbnail_name: self.thumbnail_name.clone(),
        }
    }

    pub fn can_retry(&self, max_retries: i32) -> bool {
        self.retry_count < max_retries
    }

    /// Copy of this job for the next attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}
