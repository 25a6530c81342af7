//! Tunable policy table and the level/slider resolvers built on it.
//!
//! The numbers are product policy, not derived constants. What must hold is
//! the ordering: Extreme < Recommended < Less in scale, quality and DPI.

use crate::safety::{self, SafetyVerdict};
use crate::types::{AdaptiveConfig, CompressionLevel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub scale: f32,
    pub quality: f32,
}

/// How the caller expressed the desired trade-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tuning {
    Level(CompressionLevel),
    /// 0 is the most aggressive setting, 100 the gentlest.
    Slider(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub extreme: Band,
    pub recommended: Band,
    pub less: Band,
    /// Scale multiplier for text-heavy documents.
    pub text_scale_damping: f32,
    /// Quality multiplier for text-heavy documents; milder than the scale one.
    pub text_quality_damping: f32,
    pub slider_min: Band,
    pub slider_max: Band,
    pub dpi_floor: u32,
    pub escalation_scale_factor: f32,
    pub escalation_quality_step: f32,
    pub min_scale: f32,
    pub min_quality: f32,
    pub squeeze_scale_factor: f32,
    /// Pass 1 output above this share of the original triggers a squeeze.
    pub squeeze_trigger_ratio: f64,
    pub preview_reference_scale: f32,
    pub per_page_overhead: u64,
    pub document_overhead: u64,
    pub target_ratios: [f64; 3],
    pub text_target_bonus: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            extreme: Band {
                scale: 1.3,
                quality: 0.5,
            },
            recommended: Band {
                scale: 1.6,
                quality: 0.7,
            },
            less: Band {
                scale: 2.0,
                quality: 0.85,
            },
            text_scale_damping: 0.85,
            text_quality_damping: 0.95,
            slider_min: Band {
                scale: 0.75,
                quality: 0.3,
            },
            slider_max: Band {
                scale: 2.0,
                quality: 0.92,
            },
            dpi_floor: safety::DEFAULT_DPI_FLOOR,
            escalation_scale_factor: 0.7,
            escalation_quality_step: 0.2,
            min_scale: 0.5,
            min_quality: 0.1,
            squeeze_scale_factor: 0.8,
            squeeze_trigger_ratio: 0.8,
            preview_reference_scale: 2.0,
            per_page_overhead: 400,
            document_overhead: 1500,
            target_ratios: [0.30, 0.50, 0.75],
            text_target_bonus: 0.10,
        }
    }
}

impl Policy {
    pub fn band(&self, level: CompressionLevel) -> Band {
        match level {
            CompressionLevel::Extreme => self.extreme,
            CompressionLevel::Recommended => self.recommended,
            CompressionLevel::Less => self.less,
        }
    }

    pub fn resolve_level(&self, level: CompressionLevel, is_text_heavy: bool) -> AdaptiveConfig {
        let band = self.band(level);
        self.damped(band.scale, band.quality, is_text_heavy)
    }

    /// Interpolate scale and quality independently between the slider bounds.
    pub fn resolve_slider(&self, value: f64, is_text_heavy: bool) -> AdaptiveConfig {
        let t = if value.is_nan() {
            0.0
        } else {
            (value.clamp(0.0, 100.0) / 100.0) as f32
        };
        let scale = lerp(self.slider_min.scale, self.slider_max.scale, t);
        let quality = lerp(self.slider_min.quality, self.slider_max.quality, t);
        self.damped(scale, quality, is_text_heavy)
    }

    pub fn resolve(&self, tuning: Tuning, is_text_heavy: bool) -> AdaptiveConfig {
        match tuning {
            Tuning::Level(level) => self.resolve_level(level, is_text_heavy),
            Tuning::Slider(value) => self.resolve_slider(value, is_text_heavy),
        }
    }

    /// Harsher settings for a second pass after the first failed to shrink.
    pub fn escalate(&self, config: &AdaptiveConfig) -> AdaptiveConfig {
        AdaptiveConfig::new(
            (config.scale() * self.escalation_scale_factor).max(self.min_scale),
            (config.quality() - self.escalation_quality_step).max(self.min_quality),
        )
    }

    /// Lower resolution at unchanged quality.
    pub fn squeeze(&self, config: &AdaptiveConfig) -> AdaptiveConfig {
        AdaptiveConfig::new(
            (config.scale() * self.squeeze_scale_factor).max(self.min_scale),
            config.quality(),
        )
    }

    pub fn gate(&self, config: &AdaptiveConfig, override_safety: bool) -> SafetyVerdict {
        safety::check(config, override_safety, self.dpi_floor)
    }

    /// Table-driven guess at the output size, without rendering anything.
    pub fn estimate_target_size(
        &self,
        original_size: u64,
        level: CompressionLevel,
        is_text_heavy: bool,
    ) -> u64 {
        let mut ratio = match level {
            CompressionLevel::Extreme => self.target_ratios[0],
            CompressionLevel::Recommended => self.target_ratios[1],
            CompressionLevel::Less => self.target_ratios[2],
        };
        if is_text_heavy {
            ratio += self.text_target_bonus;
        }
        let estimate = (original_size as f64 * ratio.clamp(0.0, 1.0)).round();
        (estimate.max(0.0) as u64).min(original_size)
    }

    fn damped(&self, scale: f32, quality: f32, is_text_heavy: bool) -> AdaptiveConfig {
        if is_text_heavy {
            AdaptiveConfig::new(
                scale * self.text_scale_damping,
                quality * self.text_quality_damping,
            )
        } else {
            AdaptiveConfig::new(scale, quality)
        }
    }
}

fn lerp(min: f32, max: f32, t: f32) -> f32 {
    min * (1.0 - t) + max * t
}
