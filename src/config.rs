//! Light sensor configuration parameters
//!
//! All tunable parameters for the matrix light sensor.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Upper bound on interleaved sensing sites.  The sample set is sized to
/// this; [`SensorConfig::channel_count`] selects how many are used.
pub const MAX_CHANNELS: usize = 3;

/// Core sensor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    // --- Sequencing ---
    /// Number of columns sampled per round (1..=MAX_CHANNELS)
    pub channel_count: u8,
    /// Delay between preparing a column and trusting its reading (µs)
    pub settle_interval_us: u32,

    // --- Converter ---
    /// ADC resolution the raw samples are expressed in (bits)
    pub adc_resolution_bits: u8,
    /// Largest raw reading treated as physically plausible
    pub validity_threshold: u16,

    // --- Normalisation ---
    /// Raw average mapped to full brightness (255)
    pub min_value: u16,
    /// Raw average mapped to darkness (0)
    pub max_value: u16,

    // --- Display cadence ---
    /// Display frames between two sensing requests
    pub sense_every_frames: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            // Sequencing
            channel_count: MAX_CHANNELS as u8,
            settle_interval_us: 4_000,

            // Converter
            adc_resolution_bits: 10,
            validity_threshold: 450,

            // Normalisation
            min_value: 75,
            max_value: 338,

            // Display cadence
            sense_every_frames: 5,
        }
    }
}

impl SensorConfig {
    /// Largest value the converter can report at the configured resolution.
    pub fn full_scale(&self) -> u16 {
        let bits = self.adc_resolution_bits.clamp(1, 16);
        (((1u32) << bits) - 1) as u16
    }

    /// Range-check every field.  Returns a description of the first
    /// violation found.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.channel_count == 0 || self.channel_count as usize > MAX_CHANNELS {
            return Err("channel_count must be 1–3");
        }
        if !(100..=50_000).contains(&self.settle_interval_us) {
            return Err("settle_interval_us must be 100–50000");
        }
        if !(8..=12).contains(&self.adc_resolution_bits) {
            return Err("adc_resolution_bits must be 8–12");
        }
        if self.validity_threshold > self.full_scale() {
            return Err("validity_threshold exceeds ADC full scale");
        }
        if self.min_value >= self.max_value {
            return Err("min_value must be < max_value");
        }
        if self.max_value > self.full_scale() {
            return Err("max_value exceeds ADC full scale");
        }
        if self.sense_every_frames == 0 {
            return Err("sense_every_frames must be >= 1");
        }
        Ok(())
    }
}
