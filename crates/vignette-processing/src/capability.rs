//! Format capability gate
//!
//! Decides, without touching content, whether an item is eligible for a thumbnail.

use vignette_core::{DocumentThumbnailConfig, MimeGroups, SourceItem, VideoThumbnailConfig};

#[derive(Debug, Clone)]
pub struct CapabilityGate {
    enabled: bool,
    supported_formats: Vec<String>,
    mime_groups: MimeGroups,
    reject_placeholders: bool,
}

impl CapabilityGate {
    pub fn new(enabled: bool, supported_formats: Vec<String>, mime_groups: MimeGroups) -> Self {
        Self {
            enabled,
            supported_formats,
            mime_groups,
            reject_placeholders: false,
        }
    }

    pub fn for_documents(config: &DocumentThumbnailConfig, mime_groups: MimeGroups) -> Self {
        Self::new(
            config.enabled,
            config.supported_formats.clone(),
            mime_groups,
        )
    }

    /// Video items additionally need actual content to seek in.
    pub fn for_videos(config: &VideoThumbnailConfig, mime_groups: MimeGroups) -> Self {
        Self::new(
            config.enabled,
            config.supported_formats.clone(),
            mime_groups,
        )
        .with_reject_placeholders(true)
    }

    pub fn with_reject_placeholders(mut self, reject: bool) -> Self {
        self.reject_placeholders = reject;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mime_groups(&self) -> &MimeGroups {
        &self.mime_groups
    }

    pub fn can_handle(&self, item: &SourceItem) -> bool {
        if !self.enabled || self.supported_formats.is_empty() || !item.is_file() {
            return false;
        }

        if self.reject_placeholders && item.is_placeholder() {
            return false;
        }

        item.mime_type()
            .map(|mime| self.mime_groups.matches_any(mime, &self.supported_formats))
            .unwrap_or(false)
    }
}
