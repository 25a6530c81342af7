//! Adaptive, size-targeted PDF rasterization compressor.
//!
//! Pages are rendered to bitmaps, re-encoded as JPEG and reassembled into a
//! new document. Resolution and quality come from a preset or a slider value,
//! adjusted for text-heavy documents, checked against a legibility floor and
//! escalated when the first pass does not shrink the file. The result is
//! never larger than the input.
//!
//! ```no_run
//! use adaptive_pdf_compressor::backend::{GhostscriptRasterizer, LopdfEngine, LopdfSource};
//! use adaptive_pdf_compressor::{CompressRequest, CompressionLevel, Compressor};
//!
//! let bytes = std::fs::read("input.pdf").unwrap();
//! let doc = LopdfSource::load(bytes)
//!     .unwrap()
//!     .with_rasterizer(GhostscriptRasterizer::default());
//! let compressor = Compressor::new(LopdfEngine);
//! let request = CompressRequest::new(CompressionLevel::Recommended);
//! let result = compressor.compress(&doc, &request, |p| println!("{:.0}%", p * 100.0));
//! ```

pub mod analyzer;
pub mod backend;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod ladder;
pub mod orchestrator;
pub mod pass;
pub mod policy;
pub mod safety;
pub mod types;
pub mod wasm;

pub use engine::{DocumentAssembler, Engine, PageSize, RenderedPage, SourceDocument};
pub use error::CompressError;
pub use estimator::{EstimateDebouncer, PreviewMetrics, PreviewPair};
pub use orchestrator::CompressRequest;
pub use policy::{Policy, Tuning};
pub use safety::SafetyVerdict;
pub use types::{
    AdaptiveConfig, CompressionLevel, CompressionMeta, CompressionResult, ContentProfile, Strategy,
};

/// Entry point bundling an engine with the policy table.
#[derive(Debug, Clone, Default)]
pub struct Compressor<E> {
    engine: E,
    policy: Policy,
}

impl<E: Engine> Compressor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            policy: Policy::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn analyze_content<D: SourceDocument + ?Sized>(&self, doc: &D) -> ContentProfile {
        analyzer::analyze(doc)
    }

    pub fn resolve_config(&self, tuning: Tuning, is_text_heavy: bool) -> AdaptiveConfig {
        self.policy.resolve(tuning, is_text_heavy)
    }

    pub fn check_safety(&self, config: &AdaptiveConfig, override_safety: bool) -> SafetyVerdict {
        self.policy.gate(config, override_safety)
    }

    pub fn estimate_target_size(
        &self,
        original_size: u64,
        level: CompressionLevel,
        is_text_heavy: bool,
    ) -> u64 {
        self.policy
            .estimate_target_size(original_size, level, is_text_heavy)
    }

    pub fn preview_pair<D: SourceDocument + ?Sized>(
        &self,
        doc: &D,
        config: &AdaptiveConfig,
    ) -> Result<PreviewPair, CompressError> {
        estimator::preview_pair(doc, &self.engine, &self.policy, config)
    }

    pub fn compress<D, F>(&self, doc: &D, request: &CompressRequest, on_progress: F) -> CompressionResult
    where
        D: SourceDocument + ?Sized,
        F: FnMut(f32),
    {
        orchestrator::compress(doc, &self.engine, &self.policy, request, on_progress)
    }
}
