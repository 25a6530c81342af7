use std::io::{Cursor, Write};

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, DynamicImage, ImageDecoder};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::engine::{DocumentAssembler, Engine, JPEG_MIME};
use crate::types::jpeg_quality;

/// JPEG encoding through `image`, document assembly through `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl Engine for LopdfEngine {
    type Output = LopdfAssembler;

    fn encode_bitmap(&self, bitmap: &DynamicImage, mime: &str, quality: f32) -> Result<Vec<u8>> {
        if mime != JPEG_MIME {
            bail!("Unsupported output type {}", mime);
        }
        // JPEG has no alpha; flatten everything to RGB first.
        let rgb = bitmap.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
        encoder
            .encode_image(&rgb)
            .context("JPEG encoding failed")?;
        Ok(buffer)
    }

    fn create_blank_document(&self) -> Result<LopdfAssembler> {
        Ok(LopdfAssembler::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(ObjectId);

struct PendingPage {
    width: f32,
    height: f32,
    operations: Vec<Operation>,
    xobjects: Dictionary,
}

/// Accumulates image-only pages; the page tree is written on `serialize`.
pub struct LopdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    pages: Vec<PendingPage>,
}

impl Default for LopdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfAssembler {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            pages: Vec::new(),
        }
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

impl DocumentAssembler for LopdfAssembler {
    type Page = PageRef;
    type Image = ImageRef;

    fn append_page(&mut self, width: f32, height: f32) -> Result<PageRef> {
        if !(width > 0.0 && height > 0.0) {
            bail!("Invalid page size {}x{}", width, height);
        }
        self.pages.push(PendingPage {
            width,
            height,
            operations: Vec::new(),
            xobjects: Dictionary::new(),
        });
        Ok(PageRef(self.pages.len() - 1))
    }

    fn embed_image(&mut self, bytes: Vec<u8>) -> Result<ImageRef> {
        let (width, height, color_type) = {
            let decoder =
                JpegDecoder::new(Cursor::new(&bytes)).context("Embedded image is not a JPEG")?;
            let (width, height) = decoder.dimensions();
            (width, height, decoder.color_type())
        };
        let color_space = match color_type {
            ColorType::L8 => "DeviceGray",
            ColorType::Rgb8 => "DeviceRGB",
            other => bail!("Unsupported JPEG color type {:?}", other),
        };

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes,
        );
        Ok(ImageRef(self.doc.add_object(stream)))
    }

    fn draw_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()> {
        let pending = self
            .pages
            .get_mut(page.0)
            .ok_or_else(|| anyhow!("Unknown page {}", page.0))?;
        let name = format!("Im{}", pending.xobjects.len());
        pending
            .xobjects
            .set(name.clone(), Object::Reference(image.0));
        // The raster is stretched back to the page's point size.
        pending.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(height),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn serialize(mut self) -> Result<Vec<u8>> {
        let pages = std::mem::take(&mut self.pages);
        let mut kids = Vec::with_capacity(pages.len());

        for page in pages {
            let content = Content {
                operations: page.operations,
            }
            .encode()
            .context("Failed to encode page content")?;
            let content_id = self.doc.add_object(Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                deflate(&content)?,
            ));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(page.width),
                    Object::Real(page.height),
                ],
                "Resources" => dictionary! { "XObject" => page.xobjects },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .context("Failed to save PDF")?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn encodes_jpeg_and_rejects_other_types() {
        let engine = LopdfEngine;
        let jpeg = engine.encode_bitmap(&gradient(64, 48), JPEG_MIME, 0.6).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(engine.encode_bitmap(&gradient(8, 8), "image/png", 0.6).is_err());
    }

    #[test]
    fn lower_quality_is_smaller() {
        let engine = LopdfEngine;
        let image = gradient(256, 256);
        let high = engine.encode_bitmap(&image, JPEG_MIME, 0.95).unwrap();
        let low = engine.encode_bitmap(&image, JPEG_MIME, 0.2).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn decode_preview_roundtrips_dimensions() {
        let engine = LopdfEngine;
        let jpeg = engine.encode_bitmap(&gradient(30, 20), JPEG_MIME, 0.8).unwrap();
        let decoded = engine.decode_preview(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn assembles_pages_at_point_size() {
        let engine = LopdfEngine;
        let mut out = engine.create_blank_document().unwrap();
        for (w, h) in [(612.0_f32, 792.0_f32), (300.0, 200.0)] {
            let jpeg = engine
                .encode_bitmap(&gradient((w * 1.5) as u32, (h * 1.5) as u32), JPEG_MIME, 0.5)
                .unwrap();
            let page = out.append_page(w, h).unwrap();
            let image = out.embed_image(jpeg).unwrap();
            out.draw_image(page, image, 0.0, 0.0, w, h).unwrap();
        }
        let bytes = out.serialize().unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let doc = Document::load_mem(&bytes).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);

        let page = doc.get_dictionary(pages[1]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let dims: Vec<f32> = media_box
            .iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r as f32,
                _ => f32::NAN,
            })
            .collect();
        assert_eq!(dims, vec![0.0, 0.0, 300.0, 200.0]);

        let content = Content::decode(&doc.get_page_content(pages[1]).unwrap()).unwrap();
        let operators: Vec<_> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert_eq!(operators, vec!["q", "cm", "Do", "Q"]);

        let images = doc
            .objects
            .values()
            .filter(|object| match object {
                Object::Stream(stream) => stream
                    .dict
                    .get(b"Filter")
                    .and_then(Object::as_name)
                    .map(|name| name == b"DCTDecode")
                    .unwrap_or(false),
                _ => false,
            })
            .count();
        assert_eq!(images, 2);
    }

    #[test]
    fn rejects_non_jpeg_images_and_bad_pages() {
        let mut out = LopdfAssembler::new();
        assert!(out.embed_image(b"not a jpeg".to_vec()).is_err());
        assert!(out.append_page(0.0, 100.0).is_err());
        let jpeg = LopdfEngine
            .encode_bitmap(&gradient(4, 4), JPEG_MIME, 0.5)
            .unwrap();
        let image = out.embed_image(jpeg).unwrap();
        assert!(out
            .draw_image(PageRef(3), image, 0.0, 0.0, 10.0, 10.0)
            .is_err());
    }
}
