//! LibreOffice document converter

use super::{resolve_executable, run_with_timeout, ConvertedDocument, DocumentConverter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vignette_core::mime::PDF_MIME_TYPE;
use vignette_core::ConversionError;

const ENGINE: &str = "soffice";

/// Converts documents to PDF by running `soffice --headless --convert-to pdf`.
///
/// Every conversion gets its own output directory and LibreOffice user profile, so
/// several conversions may run at the same time.
pub struct SofficeConverter {
    soffice_path: String,
    /// `soffice_path` resolved when the converter was built.
    executable: Option<PathBuf>,
    timeout_secs: u64,
}

impl SofficeConverter {
    pub fn new(soffice_path: &str, timeout_secs: u64) -> Self {
        Self {
            soffice_path: soffice_path.to_string(),
            executable: resolve_executable(ENGINE, soffice_path),
            timeout_secs,
        }
    }
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    fn is_available(&self) -> bool {
        self.executable.is_some()
    }

    async fn convert(
        &self,
        input: &Path,
        source_mime: &str,
        target_mime: &str,
    ) -> Result<ConvertedDocument, ConversionError> {
        if target_mime != PDF_MIME_TYPE {
            return Err(ConversionError::engine_failed(
                ENGINE,
                format!("unsupported target type {}", target_mime),
            ));
        }
        let Some(executable) = &self.executable else {
            return Err(ConversionError::EngineUnavailable(format!(
                "{} not found at {}",
                ENGINE, self.soffice_path
            )));
        };

        let dir = tempfile::Builder::new()
            .prefix("doc-thumbnail-pdf")
            .tempdir()?;
        let out_dir = dir.path().join("out");
        let profile_dir = dir.path().join("profile");
        tokio::fs::create_dir_all(&out_dir).await?;

        let profile_url = format!("-env:UserInstallation=file://{}", profile_dir.display());

        tracing::debug!(
            input = %input.display(),
            source_mime = %source_mime,
            "Converting document to PDF"
        );

        let mut command = Command::new(executable);
        command
            .arg(profile_url)
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(&out_dir)
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        run_with_timeout(ENGINE, &mut command, self.timeout_secs).await?;

        let stem = input
            .file_stem()
            .ok_or_else(|| ConversionError::InvalidSource(input.display().to_string()))?;
        let output = out_dir.join(format!("{}.pdf", stem.to_string_lossy()));

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Ok(ConvertedDocument::new(dir, output)),
            Ok(_) => Err(ConversionError::NoOutput(format!(
                "{} wrote an empty PDF",
                ENGINE
            ))),
            Err(_) => Err(ConversionError::NoOutput(format!(
                "{} wrote no PDF for {}",
                ENGINE,
                input.display()
            ))),
        }
    }
}
