use anyhow::{anyhow, Result};
use clap::ValueEnum;
use vignette_core::{GenerationParams, ItemRef, ThumbnailArtifact, ThumbnailDimensions};

/// Workspace used when an item argument has no `workspace:` prefix.
pub const DEFAULT_WORKSPACE: &str = "default";

const DEFAULT_DOCUMENT_SIZE: u32 = 150;
const DEFAULT_VIDEO_SIZE: &str = "320x240";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ThumbnailKind {
    Document,
    Video,
}

/// Parse `workspace:id` or a bare `id`.
pub fn parse_item_ref(arg: &str) -> Result<ItemRef> {
    let (workspace, id) = match arg.split_once(':') {
        Some((workspace, id)) => (workspace, id),
        None => (DEFAULT_WORKSPACE, arg),
    };

    if workspace.is_empty() || id.is_empty() {
        return Err(anyhow!("Invalid item '{}', expected [workspace:]id", arg));
    }
    Ok(ItemRef::new(id, workspace))
}

/// Generation parameters from command line values.
///
/// Documents take a single edge length, videos a `WxH` box.
pub fn generation_params(
    kind: ThumbnailKind,
    size: Option<&str>,
    offset_seconds: i64,
) -> Result<GenerationParams> {
    match kind {
        ThumbnailKind::Document => {
            let size = match size {
                Some(size) => size
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| anyhow!("Invalid document thumbnail size '{}'", size))?,
                None => DEFAULT_DOCUMENT_SIZE,
            };
            Ok(GenerationParams::Document { size })
        }
        ThumbnailKind::Video => {
            let size = ThumbnailDimensions::parse(size.unwrap_or(DEFAULT_VIDEO_SIZE))
                .map_err(|e| anyhow!(e))?;
            Ok(GenerationParams::Video {
                offset_seconds,
                size,
            })
        }
    }
}

/// Plain-text table of stored thumbnails.
pub fn format_artifact_table(artifacts: &[ThumbnailArtifact]) -> String {
    if artifacts.is_empty() {
        return "No thumbnails".to_string();
    }

    let mut out = format!(
        "{:<20} {:>11} {:<12} {:>10}  {}\n",
        "NAME", "SIZE", "TYPE", "BYTES", "MODIFIED"
    );
    for artifact in artifacts {
        out.push_str(&format!(
            "{:<20} {:>11} {:<12} {:>10}  {}\n",
            artifact.name,
            format!("{}x{}", artifact.width, artifact.height),
            artifact.mime_type,
            artifact.size_bytes,
            artifact.last_modified.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    out
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_item_ref_with_workspace() {
        let item = parse_item_ref("live:files/report.pdf").unwrap();
        assert_eq!(item, ItemRef::new("files/report.pdf", "live"));
    }

    #[test]
    fn parse_item_ref_defaults_workspace() {
        let item = parse_item_ref("files/report.pdf").unwrap();
        assert_eq!(item.workspace, DEFAULT_WORKSPACE);
    }

    #[test]
    fn parse_item_ref_rejects_empty_parts() {
        assert!(parse_item_ref("").is_err());
        assert!(parse_item_ref(":a.pdf").is_err());
        assert!(parse_item_ref("default:").is_err());
    }

    #[test]
    fn document_params() {
        assert_eq!(
            generation_params(ThumbnailKind::Document, None, 0).unwrap(),
            GenerationParams::Document { size: 150 }
        );
        assert_eq!(
            generation_params(ThumbnailKind::Document, Some("300"), 0).unwrap(),
            GenerationParams::Document { size: 300 }
        );
        assert!(generation_params(ThumbnailKind::Document, Some("300x200"), 0).is_err());
    }

    #[test]
    fn video_params() {
        assert_eq!(
            generation_params(ThumbnailKind::Video, Some("640x360"), 5).unwrap(),
            GenerationParams::Video {
                offset_seconds: 5,
                size: ThumbnailDimensions::new(640, 360),
            }
        );
        assert!(generation_params(ThumbnailKind::Video, Some("wide"), 5).is_err());
    }

    #[test]
    fn empty_artifact_table() {
        assert_eq!(format_artifact_table(&[]), "No thumbnails");
    }
}
