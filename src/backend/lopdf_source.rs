use std::cell::OnceCell;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::DynamicImage;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::engine::{PageSize, RenderedPage, SourceDocument};
use crate::types::BASE_DPI;

/// Something that can turn one page of a PDF on disk into pixels.
pub trait Rasterizer {
    fn rasterize(&self, pdf_path: &Path, page_index: usize, dpi: f32) -> Result<DynamicImage>;
}

/// Source document backed by lopdf for structure and text, with page
/// rendering handed to a pluggable [`Rasterizer`].
pub struct LopdfSource {
    bytes: Vec<u8>,
    doc: Document,
    pages: Vec<ObjectId>,
    rasterizer: Option<Box<dyn Rasterizer>>,
    spool: OnceCell<NamedTempFile>,
}

impl LopdfSource {
    pub fn load(bytes: Vec<u8>) -> Result<Self> {
        let mut doc = Document::load_mem(&bytes).context("Failed to load PDF")?;

        if doc.is_encrypted() {
            debug!("PDF is encrypted, trying the empty password");
            if let Err(e) = doc.decrypt(b"") {
                warn!("Failed to decrypt with empty password: {:?}", e);
            }
        }

        let pages = doc.get_pages().into_values().collect();
        Ok(Self {
            bytes,
            doc,
            pages,
            rasterizer: None,
            spool: OnceCell::new(),
        })
    }

    pub fn with_rasterizer<R: Rasterizer + 'static>(mut self, rasterizer: R) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("page {} out of range ({} pages)", index, self.pages.len()))
    }

    /// Look up a page attribute, walking up the page tree for inherited ones.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            let dict = self.doc.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return self.doc.dereference(value).ok().map(|(_, object)| object);
            }
            depth += 1;
            if depth > 64 {
                break;
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    /// Path of the original bytes on disk, written once on first use.
    fn spooled(&self) -> Result<&Path> {
        if self.spool.get().is_none() {
            let mut file = tempfile::Builder::new()
                .prefix("adaptive-pdf-")
                .suffix(".pdf")
                .tempfile()
                .context("Failed to create spool file")?;
            file.write_all(&self.bytes)
                .context("Failed to write spool file")?;
            file.flush()?;
            let _ = self.spool.set(file);
        }
        self.spool
            .get()
            .map(|file| file.path())
            .ok_or_else(|| anyhow!("spool file unavailable"))
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn push_text(fragments: &mut Vec<String>, object: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = object {
        if !bytes.is_empty() {
            fragments.push(String::from_utf8_lossy(bytes).into_owned());
        }
    }
}

impl SourceDocument for LopdfSource {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn original_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn page_text_fragments(&self, index: usize) -> Result<Vec<String>> {
        let page_id = self.page_id(index)?;
        let raw = self
            .doc
            .get_page_content(page_id)
            .with_context(|| format!("Failed to read content of page {}", index))?;
        let content = Content::decode(&raw).context("Failed to decode content stream")?;

        let mut fragments = Vec::new();
        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tj" | "'" | "\"" => push_text(&mut fragments, operation.operands.last()),
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first() {
                        let text: Vec<u8> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(bytes.as_slice()),
                                _ => None,
                            })
                            .flatten()
                            .copied()
                            .collect();
                        if !text.is_empty() {
                            fragments.push(String::from_utf8_lossy(&text).into_owned());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(fragments)
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page_id = self.page_id(index)?;
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|object| object.as_array().ok())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| self.doc.dereference(value).ok())
                    .filter_map(|(_, object)| number(object))
                    .collect::<Vec<_>>()
            });

        let mut size = match media_box.as_deref() {
            // Zero-area boxes are treated like a missing one.
            Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
                PageSize {
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                }
            }
            _ => {
                debug!("page {}: no usable MediaBox, assuming Letter", index);
                PageSize::LETTER
            }
        };

        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(|object| object.as_i64().ok())
            .unwrap_or(0);
        if rotate.rem_euclid(180) == 90 {
            std::mem::swap(&mut size.width, &mut size.height);
        }
        Ok(size)
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage> {
        let rasterizer = match self.rasterizer.as_deref() {
            Some(rasterizer) => rasterizer,
            None => bail!("No rasterizer configured for this document"),
        };
        self.page_id(index)?;
        let path = self.spooled()?;
        let bitmap = rasterizer.rasterize(path, index, scale * BASE_DPI)?;
        Ok(RenderedPage::new(bitmap))
    }
}
