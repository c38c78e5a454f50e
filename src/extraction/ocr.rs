//! Optical character recognition through an external `tesseract`-compatible command.

use super::ExtractError;
use crate::config::OcrConfig;
use std::time::Duration;
use tokio::process::Command;

/// Runs `<command> <image> stdout -l <language>` and captures standard output.
#[derive(Debug, Clone)]
pub struct OcrEngine {
    command: String,
    language: String,
    timeout: Duration,
}

impl OcrEngine {
    /// Build an engine from configuration.
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Recognize the text in an encoded image.
    pub async fn recognize(&self, image: &[u8], extension: &str) -> Result<String, ExtractError> {
        let file = tempfile::Builder::new()
            .prefix("docmind-ocr-")
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(|err| ExtractError::Ocr(format!("failed to create temp file: {err}")))?;
        tokio::fs::write(file.path(), image)
            .await
            .map_err(|err| ExtractError::Ocr(format!("failed to write temp file: {err}")))?;

        tracing::debug!(command = %self.command, language = %self.language, "Running OCR");
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .arg(file.path())
                .arg("stdout")
                .arg("-l")
                .arg(&self.language)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ExtractError::Ocr(format!("timed out after {}s", self.timeout.as_secs()))
        })?
        .map_err(|err| ExtractError::Ocr(format!("failed to run {}: {err}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the configured command can be launched.
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.command).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}
