//! Concrete adapters over lopdf, image and Ghostscript.

mod ghostscript;
mod lopdf_engine;
mod lopdf_source;

pub use ghostscript::GhostscriptRasterizer;
pub use lopdf_engine::{ImageRef, LopdfAssembler, LopdfEngine, PageRef};
pub use lopdf_source::{LopdfSource, Rasterizer};
