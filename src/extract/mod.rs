//! Document → text.
//!
//! Images go straight to the recogniser and come back whitespace-normalised.
//! Paginated documents are rasterised page by page; each page is written to a
//! scratch PNG, recognised, and the scratch file removed. Page texts are joined
//! with `\n` as-is, without the single-image normalisation.

pub mod ocr;
pub mod raster;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::ExtractError;

pub use ocr::{Recognizer, TesseractCli};
pub use raster::{PdfiumRasterizer, Rasterizer};

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Paginated,
    Image,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => DocumentKind::Paginated,
            _ => DocumentKind::Image,
        }
    }
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

pub struct TextExtractor {
    recognizer: Arc<dyn Recognizer>,
    rasterizer: Arc<dyn Rasterizer>,
    scratch_dir: PathBuf,
}

impl TextExtractor {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        rasterizer: Arc<dyn Rasterizer>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recognizer,
            rasterizer,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Tesseract for recognition, pdfium for rasterisation.
    pub fn from_config(config: &OcrConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(TesseractCli::new(config)),
            Arc::new(PdfiumRasterizer::new(config)),
            scratch_dir,
        )
    }

    pub async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        match DocumentKind::from_path(path) {
            DocumentKind::Paginated => self.extract_pages(path).await,
            DocumentKind::Image => {
                let raw = self.recognizer.recognize(path).await?;
                Ok(normalize_whitespace(&raw))
            }
        }
    }

    async fn extract_pages(&self, path: &Path) -> Result<String, ExtractError> {
        let pages = self.rasterizer.rasterize(path).await?;
        info!(pages = pages.len(), "running OCR over rendered pages");

        let mut text = String::new();
        for (idx, page) in pages.into_iter().enumerate() {
            // Removed on drop, including early returns below.
            let scratch = tempfile::Builder::new()
                .prefix(&format!("page_{}_", idx + 1))
                .suffix(".png")
                .tempfile_in(&self.scratch_dir)?;

            let target = scratch.path().to_path_buf();
            tokio::task::spawn_blocking(move || page.save_with_format(&target, ImageFormat::Png))
                .await
                .map_err(|e| ExtractError::Task(format!("page encode task failed: {}", e)))??;

            let page_text = self.recognizer.recognize(scratch.path()).await?;
            debug!(page = idx + 1, chars = page_text.len(), "page recognised");
            text.push_str(&page_text);
            text.push('\n');
        }

        Ok(text)
    }
}
