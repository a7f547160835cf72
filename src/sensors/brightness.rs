//! Raw average → 0–255 brightness.
//!
//! A column LED discharges faster in bright light, so a *low* raw reading
//! means *high* brightness.  The average is clamped into the calibrated
//! `[min, max]` window, inverted and rescaled to a byte.

/// `read(true)` result when no valid round has completed.
pub const NO_READING: i16 = -1;

/// Which stored average a read should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Latest fully valid round only; nothing until one exists.
    ValidOnly,
    /// Latest round whether valid or not.
    Latest,
}

impl ReadMode {
    pub fn from_valid_only(valid_only: bool) -> Self {
        if valid_only { Self::ValidOnly } else { Self::Latest }
    }
}

/// Calibrated raw window.  `min < max` is guaranteed by
/// [`SensorConfig::validate`](crate::config::SensorConfig::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u16,
    pub max: u16,
}

/// Map a raw average onto 0 (dark) ..= 255 (very bright).
pub fn normalise(average: u16, bounds: Bounds) -> u8 {
    let min = u32::from(bounds.min);
    let max = u32::from(bounds.max);
    if max <= min {
        return 0;
    }
    let clamped = u32::from(average).clamp(min, max);
    let inverted = (max - clamped) + min;
    ((inverted - min) * 255 / (max - min)) as u8
}
