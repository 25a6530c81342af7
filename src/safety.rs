//! Legibility floor checked before any page is rasterized.

use crate::types::AdaptiveConfig;

pub const DEFAULT_DPI_FLOOR: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed,
    Blocked { projected_dpi: u32, floor_dpi: u32 },
}

impl SafetyVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SafetyVerdict::Allowed)
    }
}

pub fn check(config: &AdaptiveConfig, override_safety: bool, floor_dpi: u32) -> SafetyVerdict {
    if override_safety || config.projected_dpi() >= floor_dpi {
        SafetyVerdict::Allowed
    } else {
        SafetyVerdict::Blocked {
            projected_dpi: config.projected_dpi(),
            floor_dpi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_only_below_floor() {
        for dpi in 40..160u32 {
            let config = AdaptiveConfig::new(dpi as f32 / 72.0, 0.6);
            assert_eq!(config.projected_dpi(), dpi);
            let verdict = check(&config, false, DEFAULT_DPI_FLOOR);
            assert_eq!(verdict.is_allowed(), dpi >= DEFAULT_DPI_FLOOR, "dpi {}", dpi);
        }
    }

    #[test]
    fn override_never_blocks() {
        for scale in [0.05_f32, 0.5, 1.0, 1.2] {
            let config = AdaptiveConfig::new(scale, 0.4);
            assert_eq!(check(&config, true, DEFAULT_DPI_FLOOR), SafetyVerdict::Allowed);
        }
    }

    #[test]
    fn blocked_carries_dpi() {
        let config = AdaptiveConfig::new(1.0, 0.5);
        assert_eq!(
            check(&config, false, DEFAULT_DPI_FLOOR),
            SafetyVerdict::Blocked {
                projected_dpi: 72,
                floor_dpi: 90
            }
        );
    }
}
