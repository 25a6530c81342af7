//! Cheap, advisory size estimates from a single rendered page.

use std::time::{Duration, Instant};

use image::DynamicImage;
use log::debug;

use crate::engine::{Engine, SourceDocument, JPEG_MIME};
use crate::error::CompressError;
use crate::policy::Policy;
use crate::types::AdaptiveConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewMetrics {
    pub estimated_total_size: u64,
    pub per_page_bytes: u64,
    pub page_count: usize,
    pub original_size: u64,
    pub projected_dpi: u32,
    pub quality: f32,
    /// Percent saved according to the estimate.
    pub estimated_reduction: f64,
}

pub struct PreviewPair {
    pub original: DynamicImage,
    pub compressed: DynamicImage,
    pub metrics: PreviewMetrics,
}

/// Extrapolate a whole-document size from one encoded page, clamped to
/// `[0, original_size]`.
pub fn extrapolate(policy: &Policy, per_page_bytes: u64, page_count: usize, original_size: u64) -> u64 {
    let pages = page_count as u64;
    let total = per_page_bytes
        .saturating_mul(pages)
        .saturating_add(pages.saturating_mul(policy.per_page_overhead))
        .saturating_add(policy.document_overhead);
    total.min(original_size)
}

/// Render page 1 at reference fidelity and at `config`, and estimate the
/// output size from the encoded candidate.
pub fn preview_pair<D, E>(
    doc: &D,
    engine: &E,
    policy: &Policy,
    config: &AdaptiveConfig,
) -> Result<PreviewPair, CompressError>
where
    D: SourceDocument + ?Sized,
    E: Engine,
{
    let page_count = doc
        .page_count()
        .map_err(|reason| CompressError::PageCount { reason })?;
    if page_count == 0 {
        return Err(CompressError::EmptyDocument);
    }

    let original = doc
        .render_page(0, policy.preview_reference_scale)
        .map_err(|reason| CompressError::Render { page: 0, reason })?
        .bitmap;
    let candidate = doc
        .render_page(0, config.scale())
        .map_err(|reason| CompressError::Render { page: 0, reason })?;
    let encoded = engine
        .encode_bitmap(&candidate.bitmap, JPEG_MIME, config.quality())
        .map_err(|reason| CompressError::Encode { page: 0, reason })?;
    drop(candidate);
    let compressed = engine
        .decode_preview(&encoded)
        .map_err(|reason| CompressError::Preview { reason })?;

    let original_size = doc.original_size();
    let per_page_bytes = encoded.len() as u64;
    let estimated_total_size = extrapolate(policy, per_page_bytes, page_count, original_size);
    let estimated_reduction = if original_size == 0 {
        0.0
    } else {
        100.0 - estimated_total_size as f64 / original_size as f64 * 100.0
    };
    debug!(
        "preview: {} bytes/page x {} pages -> ~{} of {} bytes",
        per_page_bytes, page_count, estimated_total_size, original_size
    );

    Ok(PreviewPair {
        original,
        compressed,
        metrics: PreviewMetrics {
            estimated_total_size,
            per_page_bytes,
            page_count,
            original_size,
            projected_dpi: config.projected_dpi(),
            quality: config.quality(),
            estimated_reduction,
        },
    })
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Coalesces slider movements so a preview is recomputed only once the user
/// pauses, not on every intermediate drag event.
///
/// Time is passed in explicitly; the debouncer never reads the clock.
#[derive(Debug, Clone)]
pub struct EstimateDebouncer {
    delay: Duration,
    pending: Option<(AdaptiveConfig, Instant)>,
    last_issued: Option<AdaptiveConfig>,
}

impl Default for EstimateDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl EstimateDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            last_issued: None,
        }
    }

    pub fn submit(&mut self, config: AdaptiveConfig, now: Instant) {
        self.pending = Some((config, now));
    }

    /// The config to estimate now, if the quiet period has elapsed and it
    /// differs from the last one handed out.
    pub fn poll(&mut self, now: Instant) -> Option<AdaptiveConfig> {
        let (config, submitted) = self.pending?;
        if now.saturating_duration_since(submitted) < self.delay {
            return None;
        }
        self.pending = None;
        if self.last_issued == Some(config) {
            return None;
        }
        self.last_issued = Some(config);
        Some(config)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrapolation_adds_overheads() {
        let policy = Policy::default();
        assert_eq!(extrapolate(&policy, 10_000, 10, u64::MAX), 10_000 * 10 + 400 * 10 + 1500);
    }

    #[test]
    fn extrapolation_is_bounded_by_original() {
        let policy = Policy::default();
        assert_eq!(extrapolate(&policy, 10_000, 10, 50_000), 50_000);
        assert_eq!(extrapolate(&policy, 0, 0, 0), 0);
        assert_eq!(extrapolate(&policy, u64::MAX, usize::MAX, 7), 7);
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let policy = Policy::default();
        let mut debouncer = EstimateDebouncer::new(Duration::from_millis(300));

        for (i, value) in [10.0, 20.0, 30.0].into_iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            debouncer.submit(policy.resolve_slider(value, false), at);
            assert_eq!(debouncer.poll(at), None);
        }

        assert_eq!(debouncer.poll(start + Duration::from_millis(450)), None);
        let issued = debouncer.poll(start + Duration::from_millis(500));
        assert_eq!(issued, Some(policy.resolve_slider(30.0, false)));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn debouncer_skips_repeat_of_last_estimate() {
        let start = Instant::now();
        let config = Policy::default().resolve_slider(40.0, true);
        let mut debouncer = EstimateDebouncer::default();

        debouncer.submit(config, start);
        assert_eq!(debouncer.poll(start + DEFAULT_DEBOUNCE), Some(config));

        let later = start + Duration::from_secs(1);
        debouncer.submit(config, later);
        assert_eq!(debouncer.poll(later + DEFAULT_DEBOUNCE), None);
    }
}
