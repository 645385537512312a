use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::ExtractError;

/// Turns a single raster image on disk into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, ExtractError>;
}

/// Runs the `tesseract` executable, reading the recognised text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    languages: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            program: config.tesseract_path.clone(),
            languages: config.languages.clone(),
            timeout: config.timeout,
        }
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Recognizer for TesseractCli {
    async fn recognize(&self, image: &Path) -> Result<String, ExtractError> {
        debug!(image = %image.display(), languages = %self.languages, "running tesseract");

        let output = tokio::time::timeout(self.timeout, self.command(image).output())
            .await
            .map_err(|_| ExtractError::OcrTimeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ExtractError::Ocr {
                detail: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr {
                detail: format!("tesseract exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
