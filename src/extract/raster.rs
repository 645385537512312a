//! PDF rasterisation via pdfium.
//!
//! pdfium is a blocking C library, so every call runs on the blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::ExtractError;

/// Renders every page of a paginated document, in page order.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &Path) -> Result<Vec<DynamicImage>, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    lib_dir: Option<PathBuf>,
    target_width: u32,
}

impl PdfiumRasterizer {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            lib_dir: config.pdfium_lib_path.clone(),
            target_width: config.render_width,
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, document: &Path) -> Result<Vec<DynamicImage>, ExtractError> {
        let path = document.to_path_buf();
        let lib_dir = self.lib_dir.clone();
        let width = self.target_width;

        tokio::task::spawn_blocking(move || rasterize_blocking(&path, lib_dir.as_deref(), width))
            .await
            .map_err(|e| ExtractError::Task(format!("render task panicked: {}", e)))?
    }
}

fn bind(lib_dir: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let bindings = match lib_dir {
        Some(dir) => {
            let dir = dir.to_string_lossy();
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&*dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfOpen(format!("pdfium library unavailable: {:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn rasterize_blocking(
    path: &Path,
    lib_dir: Option<&Path>,
    target_width: u32,
) -> Result<Vec<DynamicImage>, ExtractError> {
    let pdfium = bind(lib_dir)?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ExtractError::PdfOpen(format!("{:?}", e)))?;

    let pages = document.pages();
    info!(pages = pages.len(), path = %path.display(), "PDF loaded");

    let render_config = PdfRenderConfig::new().set_target_width(target_width as i32);

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ExtractError::Rasterize {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image();
        debug!(page = idx + 1, width = image.width(), height = image.height(), "rendered page");
        images.push(image);
    }

    Ok(images)
}
