//! Mime groups
//!
//! A mime group is a named set of mime types ("pdf", "word", "video", ...). Services
//! declare the groups they accept and items are matched against those groups by their
//! mime type. Group entries may use a `type/*` wildcard.

use std::collections::BTreeMap;

pub const PDF_GROUP: &str = "pdf";
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Named mime type groups used for capability matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl Default for MimeGroups {
    fn default() -> Self {
        let mut groups = Self::empty();
        groups.insert(PDF_GROUP, ["application/pdf", "application/x-pdf"]);
        groups.insert(
            "word",
            [
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
                "application/vnd.ms-word.document.macroenabled.12",
            ],
        );
        groups.insert("rtf", ["application/rtf", "text/rtf"]);
        groups.insert(
            "excel",
            [
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/vnd.ms-excel.sheet.macroenabled.12",
            ],
        );
        groups.insert(
            "powerpoint",
            [
                "application/vnd.ms-powerpoint",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/vnd.ms-powerpoint.presentation.macroenabled.12",
            ],
        );
        groups.insert(
            "openoffice",
            [
                "application/vnd.oasis.opendocument.text",
                "application/vnd.oasis.opendocument.spreadsheet",
                "application/vnd.oasis.opendocument.presentation",
                "application/vnd.oasis.opendocument.graphics",
            ],
        );
        groups.insert("video", ["video/*"]);
        groups.insert("image", ["image/*"]);
        groups
    }
}

impl MimeGroups {
    pub fn empty() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    /// Add or replace a group.
    pub fn insert<I, S>(&mut self, name: &str, mime_types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types = mime_types
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        self.groups.insert(name.trim().to_lowercase(), types);
    }

    pub fn with_group<I, S>(mut self, name: &str, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert(name, mime_types);
        self
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(&name.trim().to_lowercase())
    }

    /// Returns true if `mime_type` belongs to the group `group`.
    ///
    /// Unknown groups never match.
    pub fn is_mime_type_group(&self, mime_type: &str, group: &str) -> bool {
        let mime = normalize(mime_type);
        if mime.is_empty() {
            return false;
        }

        self.groups
            .get(&group.trim().to_lowercase())
            .map(|entries| entries.iter().any(|entry| entry_matches(entry, &mime)))
            .unwrap_or(false)
    }

    /// Returns true if `mime_type` belongs to at least one of `groups`.
    pub fn matches_any<S: AsRef<str>>(&self, mime_type: &str, groups: &[S]) -> bool {
        groups
            .iter()
            .any(|group| self.is_mime_type_group(mime_type, group.as_ref()))
    }
}

/// Lowercase and strip parameters (`text/rtf; charset=utf-8` -> `text/rtf`).
fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn entry_matches(entry: &str, mime: &str) -> bool {
    match entry.strip_suffix("/*") {
        Some(prefix) => mime
            .split_once('/')
            .map(|(major, _)| major == prefix)
            .unwrap_or(false),
        None => entry == mime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_group() {
        let groups = MimeGroups::default();
        assert!(groups.is_mime_type_group("application/pdf", "pdf"));
        assert!(groups.is_mime_type_group("Application/PDF", "PDF"));
        assert!(!groups.is_mime_type_group("application/msword", "pdf"));
    }

    #[test]
    fn test_parameters_are_ignored() {
        let groups = MimeGroups::default();
        assert!(groups.is_mime_type_group("text/rtf; charset=utf-8", "rtf"));
    }

    #[test]
    fn test_wildcard_group() {
        let groups = MimeGroups::default();
        assert!(groups.is_mime_type_group("video/mp4", "video"));
        assert!(groups.is_mime_type_group("video/quicktime", "video"));
        assert!(!groups.is_mime_type_group("audio/mpeg", "video"));
        assert!(!groups.is_mime_type_group("videos", "video"));
    }

    #[test]
    fn test_unknown_group_never_matches() {
        let groups = MimeGroups::default();
        assert!(!groups.is_mime_type_group("application/pdf", "spreadsheets"));
        assert!(!groups.is_mime_type_group("", "pdf"));
    }

    #[test]
    fn test_matches_any() {
        let groups = MimeGroups::default();
        let supported = ["pdf", "word"];
        assert!(groups.matches_any(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            &supported
        ));
        assert!(!groups.matches_any("video/mp4", &supported));
        let none: [&str; 0] = [];
        assert!(!groups.matches_any("application/pdf", &none));
    }

    #[test]
    fn test_custom_group_overrides_default() {
        let groups = MimeGroups::default().with_group("video", ["video/mp4"]);
        assert!(groups.is_mime_type_group("video/mp4", "video"));
        assert!(!groups.is_mime_type_group("video/webm", "video"));
    }
}
