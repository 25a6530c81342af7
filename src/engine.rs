//! Seams to the external document and imaging engines.
//!
//! The core never parses PDF, rasterizes or runs a codec itself. A source
//! document renders its own pages; an [`Engine`] encodes bitmaps and builds the
//! output document.

use anyhow::Result;
use image::DynamicImage;

pub const JPEG_MIME: &str = "image/jpeg";

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };
}

pub struct RenderedPage {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub bitmap: DynamicImage,
}

impl RenderedPage {
    pub fn new(bitmap: DynamicImage) -> Self {
        Self {
            pixel_width: bitmap.width(),
            pixel_height: bitmap.height(),
            bitmap,
        }
    }
}

/// An already-loaded paginated document owned by the caller.
pub trait SourceDocument {
    fn page_count(&self) -> Result<usize>;

    fn original_bytes(&self) -> &[u8];

    fn original_size(&self) -> u64 {
        self.original_bytes().len() as u64
    }

    /// Discrete text runs on a page. Only the count matters to the core.
    fn page_text_fragments(&self, index: usize) -> Result<Vec<String>>;

    fn page_size(&self, index: usize) -> Result<PageSize>;

    /// Rasterize one page; `scale` 1.0 means 72 DPI.
    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage>;
}

/// Builder for the re-encoded output document.
pub trait DocumentAssembler {
    type Page: Copy;
    type Image: Copy;

    fn append_page(&mut self, width: f32, height: f32) -> Result<Self::Page>;

    fn embed_image(&mut self, bytes: Vec<u8>) -> Result<Self::Image>;

    fn draw_image(
        &mut self,
        page: Self::Page,
        image: Self::Image,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()>;

    fn serialize(self) -> Result<Vec<u8>>;
}

pub trait Engine {
    type Output: DocumentAssembler;

    fn encode_bitmap(&self, bitmap: &DynamicImage, mime: &str, quality: f32) -> Result<Vec<u8>>;

    fn create_blank_document(&self) -> Result<Self::Output>;

    /// Turn encoded bytes back into pixels for side-by-side previews.
    fn decode_preview(&self, bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }
}
