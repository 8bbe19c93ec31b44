//! FFmpeg frame extractor

use super::{resolve_executable, run_with_timeout, FrameExtractor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vignette_core::{ConversionError, ThumbnailDimensions};

const ENGINE: &str = "ffmpeg";

pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
    /// `ffmpeg_path` resolved when the extractor was built.
    executable: Option<PathBuf>,
    timeout_secs: u64,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: &str, timeout_secs: u64) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            executable: resolve_executable(ENGINE, ffmpeg_path),
            timeout_secs,
        }
    }

    fn build_args(
        video: &Path,
        output: &Path,
        offset_seconds: i64,
        size: Option<ThumbnailDimensions>,
    ) -> Vec<String> {
        let mut args = vec![
            "-ss".to_string(),
            offset_seconds.to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
        ];

        if let Some(dims) = size {
            args.extend_from_slice(&[
                "-vf".to_string(),
                format!(
                    "scale={}:{}:force_original_aspect_ratio=decrease",
                    dims.width, dims.height
                ),
            ]);
        }

        args.extend_from_slice(&[
            "-f".to_string(),
            "image2".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    fn is_available(&self) -> bool {
        self.executable.is_some()
    }

    async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        offset_seconds: i64,
        size: Option<ThumbnailDimensions>,
    ) -> Result<(), ConversionError> {
        if offset_seconds < 0 {
            return Err(ConversionError::InvalidOffset(offset_seconds));
        }
        let Some(executable) = &self.executable else {
            return Err(ConversionError::EngineUnavailable(format!(
                "{} not found at {}",
                ENGINE, self.ffmpeg_path
            )));
        };

        let args = Self::build_args(video, output, offset_seconds, size);

        let mut command = Command::new(executable);
        command
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        run_with_timeout(ENGINE, &mut command, self.timeout_secs).await?;

        // FFmpeg exits successfully without writing anything when the seek lands past
        // the end of the stream.
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {
                tracing::debug!(
                    video = %video.display(),
                    offset_seconds,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Frame extracted"
                );
                Ok(())
            }
            _ => Err(ConversionError::NoOutput(format!(
                "no frame at {}s in {}",
                offset_seconds,
                video.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_with_size() {
        let args = FfmpegFrameExtractor::build_args(
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out.jpg"),
            5,
            Some(ThumbnailDimensions::new(320, 240)),
        );
        assert_eq!(&args[0..4], &["-ss", "5", "-i", "/tmp/in.mp4"]);
        assert!(args.contains(&"scale=320:240:force_original_aspect_ratio=decrease".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.jpg"));
    }

    #[test]
    fn test_build_args_native_size() {
        let args = FfmpegFrameExtractor::build_args(
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out.jpg"),
            0,
            None,
        );
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[tokio::test]
    async fn test_negative_offset_rejected() {
        let extractor = FfmpegFrameExtractor::new("ffmpeg", 5);
        let result = extractor
            .extract_frame(Path::new("/tmp/in.mp4"), Path::new("/tmp/out.jpg"), -1, None)
            .await;
        assert!(matches!(result, Err(ConversionError::InvalidOffset(-1))));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let extractor = FfmpegFrameExtractor::new("/nonexistent/ffmpeg-binary", 5);
        assert!(!extractor.is_available());
        assert!(extractor.executable.is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_extraction() {
        let extractor = FfmpegFrameExtractor::new("/nonexistent/ffmpeg-binary", 5);
        let result = extractor
            .extract_frame(Path::new("/tmp/in.mp4"), Path::new("/tmp/out.jpg"), 1, None)
            .await;
        assert!(matches!(result, Err(ConversionError::EngineUnavailable(_))));
    }
}
