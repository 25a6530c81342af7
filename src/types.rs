use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::error::CompressError;

/// Points per inch. A scale of 1.0 renders one pixel per point.
pub const BASE_DPI: f32 = 72.0;

pub const MIN_SCALE: f32 = 0.05;
pub const MIN_QUALITY: f32 = 0.01;

/// Coarse compression preset picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionLevel {
    Extreme,
    Recommended,
    Less,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Extreme,
        CompressionLevel::Recommended,
        CompressionLevel::Less,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Extreme => "extreme",
            CompressionLevel::Recommended => "recommended",
            CompressionLevel::Less => "less",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extreme" => Ok(CompressionLevel::Extreme),
            "recommended" => Ok(CompressionLevel::Recommended),
            "less" => Ok(CompressionLevel::Less),
            other => Err(anyhow!("unknown compression level '{}'", other)),
        }
    }
}

/// Raster scale and JPEG quality for one pass.
///
/// The projected DPI is always derived from the scale, so the fields stay
/// private and the only way in is [`AdaptiveConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    scale: f32,
    quality: f32,
    projected_dpi: u32,
}

impl AdaptiveConfig {
    /// Builds a config, clamping scale to at least [`MIN_SCALE`] and quality
    /// into `[MIN_QUALITY, 1.0]`. Non-finite inputs fall back to the minimums.
    pub fn new(scale: f32, quality: f32) -> Self {
        let scale = if scale.is_finite() {
            scale.max(MIN_SCALE)
        } else {
            MIN_SCALE
        };
        let quality = if quality.is_finite() {
            quality.clamp(MIN_QUALITY, 1.0)
        } else {
            MIN_QUALITY
        };
        Self {
            scale,
            quality,
            projected_dpi: projected_dpi(scale),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn projected_dpi(&self) -> u32 {
        self.projected_dpi
    }

    /// Quality on the 1-100 scale JPEG encoders take.
    pub fn jpeg_quality(&self) -> u8 {
        jpeg_quality(self.quality)
    }
}

pub fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 1;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

pub fn projected_dpi(scale: f32) -> u32 {
    (scale * BASE_DPI).round().max(0.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentProfile {
    pub is_text_heavy: bool,
    pub page_count: usize,
}

/// Which path of the escalation ladder produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Primary,
    Custom,
    AdaptiveFallback,
    Squeeze,
    NoReductionPossible,
    Pass2UnsafeSkipped,
    Blocked,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Primary => "Primary",
            Strategy::Custom => "Custom Config",
            Strategy::AdaptiveFallback => "Adaptive Fallback",
            Strategy::Squeeze => "Extreme Squeeze",
            Strategy::NoReductionPossible => "No Reduction Possible",
            Strategy::Pass2UnsafeSkipped => "Pass 2 Unsafe (Skipped)",
            Strategy::Blocked => "Blocked (Unsafe DPI)",
        }
    }

    /// True when the payload is the untouched original.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Strategy::NoReductionPossible | Strategy::Pass2UnsafeSkipped
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionMeta {
    pub original_size: u64,
    pub compressed_size: u64,
    pub effective_scale: f32,
    pub effective_quality: f32,
    pub iterations: u32,
    pub strategy: Strategy,
    pub projected_dpi: u32,
}

impl CompressionMeta {
    pub(crate) fn for_config(original_size: u64, config: &AdaptiveConfig, strategy: Strategy) -> Self {
        Self {
            original_size,
            compressed_size: original_size,
            effective_scale: config.scale(),
            effective_quality: config.quality(),
            iterations: 0,
            strategy,
            projected_dpi: config.projected_dpi(),
        }
    }

    /// Size reduction relative to the original, in percent.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        100.0 - (self.compressed_size as f64 / self.original_size as f64 * 100.0)
    }
}

/// Outcome of a full compression request.
#[derive(Debug)]
pub enum CompressionResult {
    Success {
        data: Vec<u8>,
        meta: CompressionMeta,
    },
    Blocked {
        projected_dpi: u32,
        floor_dpi: u32,
        meta: CompressionMeta,
    },
    Error {
        error: CompressError,
        meta: CompressionMeta,
    },
}

impl CompressionResult {
    pub fn meta(&self) -> &CompressionMeta {
        match self {
            CompressionResult::Success { meta, .. }
            | CompressionResult::Blocked { meta, .. }
            | CompressionResult::Error { meta, .. } => meta,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompressionResult::Success { .. })
    }

    pub fn into_result(self) -> Result<(Vec<u8>, CompressionMeta), CompressError> {
        match self {
            CompressionResult::Success { data, meta } => Ok((data, meta)),
            CompressionResult::Blocked {
                projected_dpi,
                floor_dpi,
                ..
            } => Err(CompressError::Blocked {
                projected_dpi,
                floor_dpi,
            }),
            CompressionResult::Error { error, .. } => Err(error),
        }
    }
}
