//! Control loop for full-document compression.

use log::{info, warn};

use crate::analyzer;
use crate::engine::{Engine, SourceDocument};
use crate::error::CompressError;
use crate::ladder::{self, Action, Candidate, LadderContext, LadderState, PassKind, Verdict};
use crate::pass::{ProgressSpan, RasterPass};
use crate::policy::Policy;
use crate::types::{
    AdaptiveConfig, CompressionLevel, CompressionMeta, CompressionResult, ContentProfile, Strategy,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressRequest {
    pub level: CompressionLevel,
    pub override_safety: bool,
    pub custom_config: Option<AdaptiveConfig>,
    /// Skips re-analysis when the caller already profiled the document.
    pub content_profile: Option<ContentProfile>,
}

impl CompressRequest {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            override_safety: false,
            custom_config: None,
            content_profile: None,
        }
    }

    pub fn override_safety(mut self, override_safety: bool) -> Self {
        self.override_safety = override_safety;
        self
    }

    pub fn custom_config(mut self, config: AdaptiveConfig) -> Self {
        self.custom_config = Some(config);
        self
    }

    pub fn content_profile(mut self, profile: ContentProfile) -> Self {
        self.content_profile = Some(profile);
        self
    }
}

/// Keeps the caller's progress bar from ever moving backwards.
struct Progress<'f> {
    last: f32,
    sink: &'f mut dyn FnMut(f32),
}

impl Progress<'_> {
    fn report(&mut self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        if value > self.last {
            self.last = value;
            (self.sink)(value);
        }
    }
}

fn span_for(kind: PassKind, custom: bool) -> ProgressSpan {
    match kind {
        PassKind::Primary if custom => ProgressSpan::FULL,
        PassKind::Primary => ProgressSpan::new(0.0, 0.5),
        PassKind::Fallback | PassKind::Squeeze => ProgressSpan::new(0.5, 1.0),
    }
}

pub fn compress<D, E, F>(
    doc: &D,
    engine: &E,
    policy: &Policy,
    request: &CompressRequest,
    mut on_progress: F,
) -> CompressionResult
where
    D: SourceDocument + ?Sized,
    E: Engine,
    F: FnMut(f32),
{
    let original_size = doc.original_size();
    let primary = match request.custom_config {
        Some(config) => config,
        None => {
            let profile = request
                .content_profile
                .unwrap_or_else(|| analyzer::analyze(doc));
            policy.resolve_level(request.level, profile.is_text_heavy)
        }
    };
    let ctx = LadderContext {
        original_size,
        level: request.level,
        primary,
        custom: request.custom_config.is_some(),
        override_safety: request.override_safety,
    };
    info!(
        "Compressing {} bytes at {} (scale {:.3}, quality {:.2}, {} DPI)",
        original_size,
        request.level,
        primary.scale(),
        primary.quality(),
        primary.projected_dpi()
    );

    let mut progress = Progress {
        last: 0.0,
        sink: &mut on_progress,
    };
    let mut outputs: Vec<(PassKind, Vec<u8>)> = Vec::new();
    let mut iterations = 0u32;
    let mut state = LadderState::Init;

    let verdict = loop {
        match ladder::next_action(&state, &ctx, policy) {
            Action::Run { kind, config } => {
                iterations += 1;
                info!(
                    "Pass {} ({:?}): scale {:.3}, quality {:.2}, {} DPI",
                    iterations,
                    kind,
                    config.scale(),
                    config.quality(),
                    config.projected_dpi()
                );
                let pass = RasterPass::new(doc, engine, config, span_for(kind, ctx.custom));
                let bytes = match pass.run_to_end(&mut |p| progress.report(p)) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        let mut meta = CompressionMeta::for_config(
                            original_size,
                            &config,
                            ladder::candidate_strategy(kind, &ctx),
                        );
                        meta.iterations = iterations;
                        return CompressionResult::Error { error, meta };
                    }
                };
                let candidate = Candidate {
                    kind,
                    config,
                    size: bytes.len() as u64,
                };
                info!(
                    "Pass {} produced {} bytes (original {})",
                    iterations, candidate.size, original_size
                );
                outputs.push((kind, bytes));
                state = ladder::after_pass(&state, &ctx, candidate);
            }
            Action::Advance(next) => state = next,
            Action::Finish(verdict) => break verdict,
        }
    };

    let strategy = verdict.strategy(&ctx);
    let result = match verdict {
        Verdict::Blocked {
            projected_dpi,
            floor_dpi,
        } => {
            warn!(
                "Blocked: {} DPI is below the {} DPI floor",
                projected_dpi, floor_dpi
            );
            CompressionResult::Blocked {
                projected_dpi,
                floor_dpi,
                meta: CompressionMeta::for_config(original_size, &primary, strategy),
            }
        }
        Verdict::Adopt(candidate) => match take_output(&mut outputs, candidate.kind) {
            Some(data) => {
                let mut meta = CompressionMeta::for_config(original_size, &candidate.config, strategy);
                meta.compressed_size = data.len() as u64;
                meta.iterations = iterations;
                CompressionResult::Success { data, meta }
            }
            None => keep_original(doc, &primary, Strategy::NoReductionPossible, iterations),
        },
        Verdict::KeepOriginal(strategy) => keep_original(doc, &primary, strategy, iterations),
    };

    progress.report(1.0);
    if let CompressionResult::Success { meta, .. } = &result {
        info!(
            "Finished with '{}': {} -> {} bytes ({:.1}% reduction, {} passes)",
            meta.strategy,
            meta.original_size,
            meta.compressed_size,
            meta.reduction_percent(),
            meta.iterations
        );
    }
    result
}

fn take_output(outputs: &mut Vec<(PassKind, Vec<u8>)>, kind: PassKind) -> Option<Vec<u8>> {
    let position = outputs.iter().position(|(k, _)| *k == kind)?;
    Some(outputs.swap_remove(position).1)
}

/// Final guard: hand back the untouched input rather than a larger file.
fn keep_original<D: SourceDocument + ?Sized>(
    doc: &D,
    primary: &AdaptiveConfig,
    strategy: Strategy,
    iterations: u32,
) -> CompressionResult {
    let data = doc.original_bytes().to_vec();
    let mut meta = CompressionMeta::for_config(data.len() as u64, primary, strategy);
    meta.iterations = iterations;
    info!("No candidate beat the original; returning input unchanged ({})", strategy);
    CompressionResult::Success { data, meta }
}
