use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::item::ItemRef;

/// Encoding used for stored thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Png,
    Jpeg,
}

impl ThumbnailFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl Display for ThumbnailFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for ThumbnailFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(anyhow::anyhow!("Invalid thumbnail image format: {}", other)),
        }
    }
}

/// Explicit bounding box, written as `WxH` (e.g. `320x240`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailDimensions {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    /// Parse dimensions from `WxH`. Both sides are required and must be positive.
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.trim().split(['x', 'X']).collect();

        if parts.len() != 2 {
            return Err(format!("Invalid dimensions '{}'. Expected: WxH", s));
        }

        let width = parts[0]
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: {}", parts[0]))?;
        let height = parts[1]
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: {}", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be greater than zero".to_string());
        }

        Ok(Self { width, height })
    }
}

impl Display for ThumbnailDimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ThumbnailDimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A stored thumbnail, as reported back by the repository after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailArtifact {
    pub item: ItemRef,
    pub name: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}
