//! One rasterize-encode-reassemble traversal of every page.
//!
//! A pass is a lazy iterator: nothing happens until `next()` is called, each
//! call handles exactly one page, and dropping the iterator between pages is
//! how a caller abandons the work.

use anyhow::anyhow;
use log::debug;

use crate::engine::{DocumentAssembler, Engine, SourceDocument, JPEG_MIME};
use crate::error::CompressError;
use crate::types::AdaptiveConfig;

/// Slice of the overall progress bar owned by one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSpan {
    pub start: f32,
    pub end: f32,
}

impl ProgressSpan {
    pub const FULL: ProgressSpan = ProgressSpan {
        start: 0.0,
        end: 1.0,
    };

    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn at(&self, done: usize, total: usize) -> f32 {
        if total == 0 {
            return self.end;
        }
        self.start + (self.end - self.start) * (done as f32 / total as f32)
    }
}

#[derive(Debug)]
pub enum PassEvent {
    Page { index: usize, progress: f32 },
    Assembled(Vec<u8>),
}

enum State<O> {
    Pending,
    Running { output: O, next: usize, pages: usize },
    Done,
}

pub struct RasterPass<'a, D: ?Sized, E: Engine> {
    doc: &'a D,
    engine: &'a E,
    config: AdaptiveConfig,
    span: ProgressSpan,
    state: State<E::Output>,
}

impl<'a, D, E> RasterPass<'a, D, E>
where
    D: SourceDocument + ?Sized,
    E: Engine,
{
    pub fn new(doc: &'a D, engine: &'a E, config: AdaptiveConfig, span: ProgressSpan) -> Self {
        Self {
            doc,
            engine,
            config,
            span,
            state: State::Pending,
        }
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Drive the pass to completion, forwarding per-page progress.
    pub fn run_to_end(self, on_progress: &mut dyn FnMut(f32)) -> Result<Vec<u8>, CompressError> {
        for event in self {
            match event? {
                PassEvent::Page { progress, .. } => on_progress(progress),
                PassEvent::Assembled(bytes) => return Ok(bytes),
            }
        }
        Err(CompressError::assembly("serialize")(anyhow!(
            "pass ended without output"
        )))
    }

    fn start(&self) -> Result<State<E::Output>, CompressError> {
        let pages = self
            .doc
            .page_count()
            .map_err(|reason| CompressError::PageCount { reason })?;
        if pages == 0 {
            return Err(CompressError::EmptyDocument);
        }
        let output = self
            .engine
            .create_blank_document()
            .map_err(CompressError::assembly("create document"))?;
        Ok(State::Running {
            output,
            next: 0,
            pages,
        })
    }

    fn page(&self, output: &mut E::Output, index: usize) -> Result<(), CompressError> {
        let size = self
            .doc
            .page_size(index)
            .map_err(|reason| CompressError::Render { page: index, reason })?;
        let rendered = self
            .doc
            .render_page(index, self.config.scale())
            .map_err(|reason| CompressError::Render { page: index, reason })?;
        let encoded = self
            .engine
            .encode_bitmap(&rendered.bitmap, JPEG_MIME, self.config.quality())
            .map_err(|reason| CompressError::Encode { page: index, reason })?;
        debug!(
            "page {}: {}x{} px -> {} bytes",
            index,
            rendered.pixel_width,
            rendered.pixel_height,
            encoded.len()
        );
        // Only the encoded bytes survive past this point.
        drop(rendered);

        let page = output
            .append_page(size.width, size.height)
            .map_err(CompressError::assembly("append page"))?;
        let image = output
            .embed_image(encoded)
            .map_err(CompressError::assembly("embed image"))?;
        output
            .draw_image(page, image, 0.0, 0.0, size.width, size.height)
            .map_err(CompressError::assembly("draw image"))
    }
}

impl<'a, D, E> Iterator for RasterPass<'a, D, E>
where
    D: SourceDocument + ?Sized,
    E: Engine,
{
    type Item = Result<PassEvent, CompressError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending = self.state {
            match self.start() {
                Ok(running) => self.state = running,
                Err(e) => {
                    self.state = State::Done;
                    return Some(Err(e));
                }
            }
        }

        match std::mem::replace(&mut self.state, State::Done) {
            State::Running {
                mut output,
                next,
                pages,
            } if next < pages => match self.page(&mut output, next) {
                Ok(()) => {
                    self.state = State::Running {
                        output,
                        next: next + 1,
                        pages,
                    };
                    Some(Ok(PassEvent::Page {
                        index: next,
                        progress: self.span.at(next + 1, pages),
                    }))
                }
                Err(e) => Some(Err(e)),
            },
            State::Running { output, .. } => Some(
                output
                    .serialize()
                    .map(PassEvent::Assembled)
                    .map_err(CompressError::assembly("serialize")),
            ),
            State::Pending | State::Done => None,
        }
    }
}
