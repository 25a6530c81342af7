use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageFormat};
use log::debug;

use super::Rasterizer;

/// Renders single pages by shelling out to Ghostscript's PNG device.
#[derive(Debug, Clone)]
pub struct GhostscriptRasterizer {
    program: String,
}

impl Default for GhostscriptRasterizer {
    fn default() -> Self {
        let program = if cfg!(windows) { "gswin64c" } else { "gs" };
        Self::new(program)
    }
}

impl GhostscriptRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Rasterizer for GhostscriptRasterizer {
    fn rasterize(&self, pdf_path: &Path, page_index: usize, dpi: f32) -> Result<DynamicImage> {
        // Ghostscript counts pages from 1.
        let page = page_index + 1;
        debug!("gs: page {} at {:.1} DPI", page, dpi);

        let output = Command::new(&self.program)
            .args([
                "-q",
                "-dSAFER",
                "-dBATCH",
                "-dNOPAUSE",
                "-sDEVICE=png16m",
                "-dTextAlphaBits=4",
                "-dGraphicsAlphaBits=4",
            ])
            .arg(format!("-r{:.3}", dpi))
            .arg(format!("-dFirstPage={}", page))
            .arg(format!("-dLastPage={}", page))
            .arg("-sOutputFile=-")
            .arg(pdf_path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to run Ghostscript ({})", self.program))?;

        if !output.status.success() {
            bail!(
                "Ghostscript failed on page {}: {}",
                page,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            bail!("Ghostscript produced no image for page {}", page);
        }

        image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .context("Failed to decode rasterized page")
    }
}
