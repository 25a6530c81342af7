#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adaptive_pdf_compressor::{DocumentAssembler, Engine, PageSize, RenderedPage, SourceDocument};
use anyhow::{bail, Result};
use image::DynamicImage;

/// In-memory document whose pages render as blank bitmaps.
pub struct FakeDocument {
    pub pages: Vec<PageSize>,
    pub fragments_per_page: usize,
    pub bytes: Vec<u8>,
    pub fail_render_on: Option<usize>,
    pub render_calls: Cell<usize>,
    pub text_calls: Cell<usize>,
    pub rendered: RefCell<Vec<(usize, f32)>>,
}

impl FakeDocument {
    pub fn new(page_count: usize, original_size: usize) -> Self {
        Self {
            pages: vec![PageSize::LETTER; page_count],
            fragments_per_page: 2,
            bytes: fake_pdf_bytes(original_size),
            fail_render_on: None,
            render_calls: Cell::new(0),
            text_calls: Cell::new(0),
            rendered: RefCell::new(Vec::new()),
        }
    }

    pub fn text_heavy(mut self) -> Self {
        self.fragments_per_page = 50;
        self
    }

    pub fn failing_on(mut self, page: usize) -> Self {
        self.fail_render_on = Some(page);
        self
    }

    pub fn with_pages(mut self, pages: Vec<PageSize>) -> Self {
        self.pages = pages;
        self
    }

    pub fn rendered_pages(&self) -> Vec<usize> {
        self.rendered.borrow().iter().map(|(page, _)| *page).collect()
    }
}

fn fake_pdf_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len.max(bytes.len()), b'x');
    bytes.truncate(len);
    bytes
}

impl SourceDocument for FakeDocument {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn original_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn page_text_fragments(&self, index: usize) -> Result<Vec<String>> {
        self.text_calls.set(self.text_calls.get() + 1);
        if index >= self.pages.len() {
            bail!("no page {}", index);
        }
        Ok(vec!["text".to_string(); self.fragments_per_page])
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        match self.pages.get(index) {
            Some(size) => Ok(*size),
            None => bail!("no page {}", index),
        }
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage> {
        self.render_calls.set(self.render_calls.get() + 1);
        self.rendered.borrow_mut().push((index, scale));
        if self.fail_render_on == Some(index) {
            bail!("renderer crashed");
        }
        let size = self.page_size(index)?;
        let width = (size.width * scale).round().max(1.0) as u32;
        let height = (size.height * scale).round().max(1.0) as u32;
        Ok(RenderedPage::new(DynamicImage::new_luma8(width, height)))
    }
}

/// Engine whose "JPEG" size is proportional to pixels times quality, so pass
/// sizes are predictable.
pub struct FakeEngine {
    pub bytes_per_pixel: f64,
    pub assembled: Rc<RefCell<Vec<Vec<(PageSize, Placement)>>>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub const PAGE_OVERHEAD: usize = 100;
pub const DOCUMENT_OVERHEAD: usize = 200;

impl FakeEngine {
    pub fn new(bytes_per_pixel: f64) -> Self {
        Self {
            bytes_per_pixel,
            assembled: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

pub struct FakeAssembler {
    pages: Vec<PageSize>,
    images: Vec<usize>,
    draws: Vec<(PageSize, Placement)>,
    sink: Rc<RefCell<Vec<Vec<(PageSize, Placement)>>>>,
}

impl DocumentAssembler for FakeAssembler {
    type Page = usize;
    type Image = usize;

    fn append_page(&mut self, width: f32, height: f32) -> Result<usize> {
        self.pages.push(PageSize { width, height });
        Ok(self.pages.len() - 1)
    }

    fn embed_image(&mut self, bytes: Vec<u8>) -> Result<usize> {
        self.images.push(bytes.len());
        Ok(self.images.len() - 1)
    }

    fn draw_image(
        &mut self,
        page: usize,
        _image: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()> {
        self.draws.push((
            self.pages[page],
            Placement {
                x,
                y,
                width,
                height,
            },
        ));
        Ok(())
    }

    fn serialize(self) -> Result<Vec<u8>> {
        let total = self.images.iter().sum::<usize>()
            + self.pages.len() * PAGE_OVERHEAD
            + DOCUMENT_OVERHEAD;
        self.sink.borrow_mut().push(self.draws);
        Ok(vec![0u8; total])
    }
}

impl Engine for FakeEngine {
    type Output = FakeAssembler;

    fn encode_bitmap(&self, bitmap: &DynamicImage, _mime: &str, quality: f32) -> Result<Vec<u8>> {
        let pixels = bitmap.width() as f64 * bitmap.height() as f64;
        let len = (pixels * quality as f64 * self.bytes_per_pixel) as usize;
        Ok(vec![0u8; len.max(1)])
    }

    fn create_blank_document(&self) -> Result<FakeAssembler> {
        Ok(FakeAssembler {
            pages: Vec::new(),
            images: Vec::new(),
            draws: Vec::new(),
            sink: Rc::clone(&self.assembled),
        })
    }

    fn decode_preview(&self, _bytes: &[u8]) -> Result<DynamicImage> {
        Ok(DynamicImage::new_luma8(1, 1))
    }
}
