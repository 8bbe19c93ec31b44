//! Configuration module
//!
//! Configuration is read once at startup (environment variables, optionally from a
//! `.env` file) and then shared read-only between all components.

use std::collections::HashMap;
use std::env;

use crate::mime::MimeGroups;
use crate::models::ThumbnailFormat;

const DOCUMENT_SUPPORTED_FORMATS: &str = "pdf,word,rtf,excel,powerpoint,openoffice";
const VIDEO_SUPPORTED_FORMATS: &str = "video";
const CONVERTER_TIMEOUT_SECS: u64 = 120;
const QUEUE_MAX_WORKERS: usize = 2;
const QUEUE_MAX_RETRIES: i32 = 2;
const JOB_TIMEOUT_SECS: u64 = 300;
const MIME_GROUP_PREFIX: &str = "MIME_GROUP_";

/// Document thumbnail service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentThumbnailConfig {
    pub enabled: bool,
    /// Mime group names accepted by the service. Empty means nothing is accepted.
    pub supported_formats: Vec<String>,
    pub use_background_job: bool,
    pub image_format: ThumbnailFormat,
}

impl Default for DocumentThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_formats: split_list(DOCUMENT_SUPPORTED_FORMATS),
            use_background_job: true,
            image_format: ThumbnailFormat::Png,
        }
    }
}

/// Video thumbnail service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoThumbnailConfig {
    pub enabled: bool,
    pub supported_formats: Vec<String>,
    pub use_background_job: bool,
    pub image_format: ThumbnailFormat,
}

impl Default for VideoThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_formats: split_list(VIDEO_SUPPORTED_FORMATS),
            use_background_job: true,
            image_format: ThumbnailFormat::Jpeg,
        }
    }
}

/// External conversion engines
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConverterConfig {
    pub document_converter_enabled: bool,
    pub soffice_path: String,
    pub pdf_renderer_enabled: bool,
    /// Directory or file of the pdfium shared library. `None` binds the system library.
    pub pdfium_library_path: Option<String>,
    pub ffmpeg_path: String,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            document_converter_enabled: false,
            soffice_path: "soffice".to_string(),
            pdf_renderer_enabled: true,
            pdfium_library_path: None,
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_secs: CONVERTER_TIMEOUT_SECS,
        }
    }
}

/// Background job queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_workers: usize,
    pub max_retries: i32,
    pub job_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: QUEUE_MAX_WORKERS,
            max_retries: QUEUE_MAX_RETRIES,
            job_timeout_secs: JOB_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepositoryBackend {
    Local,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub backend: RepositoryBackend,
    pub path: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: RepositoryBackend::Local,
            path: Some("./content".to_string()),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VignetteConfig {
    pub document: DocumentThumbnailConfig,
    pub video: VideoThumbnailConfig,
    pub converters: ConverterConfig,
    pub queue: QueueConfig,
    pub repository: RepositoryConfig,
    pub mime_groups: MimeGroups,
}

impl VignetteConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build the configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let document = DocumentThumbnailConfig {
            enabled: parse_bool(get("DOCUMENT_THUMBNAILS_ENABLED"), true),
            supported_formats: split_list(
                get("DOCUMENT_THUMBNAILS_SUPPORTED_FORMATS").unwrap_or(DOCUMENT_SUPPORTED_FORMATS),
            ),
            use_background_job: parse_bool(get("DOCUMENT_THUMBNAILS_BACKGROUND_JOB"), true),
            image_format: get("DOCUMENT_THUMBNAIL_IMAGE_FORMAT")
                .map(str::parse::<ThumbnailFormat>)
                .transpose()?
                .unwrap_or(ThumbnailFormat::Png),
        };

        let video = VideoThumbnailConfig {
            enabled: parse_bool(get("VIDEO_THUMBNAILS_ENABLED"), true),
            supported_formats: split_list(
                get("VIDEO_THUMBNAILS_SUPPORTED_FORMATS").unwrap_or(VIDEO_SUPPORTED_FORMATS),
            ),
            use_background_job: parse_bool(get("VIDEO_THUMBNAILS_BACKGROUND_JOB"), true),
            image_format: get("VIDEO_THUMBNAIL_IMAGE_FORMAT")
                .map(str::parse::<ThumbnailFormat>)
                .transpose()?
                .unwrap_or(ThumbnailFormat::Jpeg),
        };

        let converters = ConverterConfig {
            document_converter_enabled: parse_bool(get("DOCUMENT_CONVERTER_ENABLED"), false),
            soffice_path: get("SOFFICE_PATH").unwrap_or("soffice").to_string(),
            pdf_renderer_enabled: parse_bool(get("PDF_RENDERER_ENABLED"), true),
            pdfium_library_path: get("PDFIUM_LIBRARY_PATH").map(String::from),
            ffmpeg_path: get("FFMPEG_PATH").unwrap_or("ffmpeg").to_string(),
            timeout_secs: get("CONVERTER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONVERTER_TIMEOUT_SECS),
        };

        let queue = QueueConfig {
            max_workers: get("THUMBNAIL_QUEUE_MAX_WORKERS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(QUEUE_MAX_WORKERS),
            max_retries: get("THUMBNAIL_QUEUE_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(QUEUE_MAX_RETRIES),
            job_timeout_secs: get("THUMBNAIL_JOB_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(JOB_TIMEOUT_SECS),
        };

        let backend = match get("REPOSITORY_BACKEND").map(str::to_lowercase).as_deref() {
            None | Some("local") => RepositoryBackend::Local,
            Some("memory") => RepositoryBackend::Memory,
            Some(other) => {
                return Err(anyhow::anyhow!(
                    "REPOSITORY_BACKEND must be 'local' or 'memory', got '{}'",
                    other
                ))
            }
        };
        let repository = RepositoryConfig {
            backend,
            path: get("REPOSITORY_PATH")
                .map(String::from)
                .or_else(|| Some("./content".to_string())),
        };

        let mut mime_groups = MimeGroups::default();
        let mut overrides: Vec<(&String, &String)> = vars
            .iter()
            .filter(|(key, _)| key.starts_with(MIME_GROUP_PREFIX))
            .collect();
        overrides.sort();
        for (key, value) in overrides {
            let name = &key[MIME_GROUP_PREFIX.len()..];
            if !name.is_empty() {
                mime_groups.insert(name, split_list(value));
            }
        }

        let config = VignetteConfig {
            document,
            video,
            converters,
            queue,
            repository,
            mime_groups,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for format in self
            .document
            .supported_formats
            .iter()
            .chain(self.video.supported_formats.iter())
        {
            if !self.mime_groups.contains_group(format) {
                return Err(anyhow::anyhow!(
                    "Supported format '{}' does not name a configured mime group",
                    format
                ));
            }
        }

        for (name, path) in [
            ("SOFFICE_PATH", &self.converters.soffice_path),
            ("FFMPEG_PATH", &self.converters.ffmpeg_path),
        ] {
            validate_executable_path(path)
                .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e))?;
        }

        if self.queue.max_workers == 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_QUEUE_MAX_WORKERS must be at least 1"
            ));
        }

        if self.queue.max_retries < 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_QUEUE_MAX_RETRIES must not be negative"
            ));
        }

        if self.repository.backend == RepositoryBackend::Local && self.repository.path.is_none() {
            return Err(anyhow::anyhow!(
                "REPOSITORY_PATH must be set when using the local repository backend"
            ));
        }

        Ok(())
    }
}

/// Reject executable paths that could be abused when handed to a process spawner.
pub fn validate_executable_path(path: &str) -> Result<(), String> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.is_empty() {
        return Err("path is empty".to_string());
    }
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err("contains dangerous characters".to_string());
    }
    Ok(())
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    value
        .map(|v| v.to_lowercase().parse().unwrap_or(default))
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
