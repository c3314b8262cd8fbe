//! Device capability bounds for playback validation.
//!
//! High-frame-rate editing only works within the resolution and frame-rate
//! envelope the device's decoder tier supports. The bounds are injected as
//! plain values so hosts can supply their own instead of relying on any
//! device-model lookup.

use serde::{Deserialize, Serialize};

/// Resolution and frame-rate bounds a source must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceCaps {
    /// Maximum supported frame width in pixels.
    pub max_width: u32,
    /// Maximum supported frame height in pixels.
    pub max_height: u32,
    /// Minimum source frame rate in frames per second.
    pub min_frame_rate: f64,
    /// Maximum source frame rate in frames per second.
    pub max_frame_rate: f64,
}

impl DeviceCaps {
    /// Bounds for high-tier devices: 1080p sources at 60-240 fps.
    pub fn high_tier() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            min_frame_rate: 60.0,
            max_frame_rate: 240.0,
        }
    }

    /// Bounds for standard devices: 720p sources at 60-240 fps.
    pub fn standard() -> Self {
        Self {
            max_width: 1280,
            max_height: 720,
            min_frame_rate: 60.0,
            max_frame_rate: 240.0,
        }
    }

    /// Check whether a source's dimensions and frame rate fit these bounds.
    pub fn allows(&self, width: u32, height: u32, frame_rate: f64) -> bool {
        width <= self.max_width
            && height <= self.max_height
            && frame_rate >= self.min_frame_rate
            && frame_rate <= self.max_frame_rate
    }
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tier_bounds() {
        let caps = DeviceCaps::standard();
        assert!(caps.allows(1280, 720, 120.0));
        assert!(caps.allows(1280, 720, 60.0));
        assert!(caps.allows(1280, 720, 240.0));
    }

    #[test]
    fn test_low_frame_rate_rejected() {
        // 24 fps content is below the 60 fps floor even when the
        // resolution fits.
        let caps = DeviceCaps::standard();
        assert!(!caps.allows(1280, 720, 24.0));
    }

    #[test]
    fn test_oversized_source_rejected() {
        let caps = DeviceCaps::standard();
        assert!(!caps.allows(1920, 1080, 120.0));
    }

    #[test]
    fn test_high_tier_accepts_1080p() {
        let caps = DeviceCaps::high_tier();
        assert!(caps.allows(1920, 1080, 240.0));
        assert!(!caps.allows(1920, 1080, 480.0));
    }
}
