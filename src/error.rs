//! Unified error types for the light-sensing firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! main loop's error handling uniform.  All variants are `Copy` so they can
//! be passed out of the sensor state machine without allocation.
//!
//! Note that ordinary bad readings are *not* errors: an out-of-range or
//! missing sample only demotes the current round to invalid.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The sensing state machine refused a request.
    Sense(SenseError),
    /// A hardware primitive (GPIO, ADC, timer) failed.
    Hw(HwError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sense(e) => write!(f, "sense: {e}"),
            Self::Hw(e) => write!(f, "hw: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Failures reported by the platform adapters.  The raw `i32` is the
/// ESP-IDF `esp_err_t` (always `-1` in simulation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// ADC unit could not be created or the pin has no ADC channel.
    AdcUnavailable(i32),
    /// GPIO direction / level / pull configuration failed.
    GpioFailed(i32),
    /// One-shot timer could not be armed.
    TimerFailed(i32),
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcUnavailable(rc) => write!(f, "ADC unavailable (rc={rc})"),
            Self::GpioFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::TimerFailed(rc) => write!(f, "timer arm failed (rc={rc})"),
        }
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Self::Hw(e)
    }
}

// ---------------------------------------------------------------------------
// Sensing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseError {
    /// A sensing pass is already in flight; the trigger was dropped.
    Busy,
    /// The pass could not be started because a primitive failed.
    Hw(HwError),
}

impl fmt::Display for SenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "sensing pass already in flight"),
            Self::Hw(e) => write!(f, "{e}"),
        }
    }
}

impl From<HwError> for SenseError {
    fn from(e: HwError) -> Self {
        Self::Hw(e)
    }
}

impl From<SenseError> for Error {
    fn from(e: SenseError) -> Self {
        Self::Sense(e)
    }
}

impl core::error::Error for Error {}
impl core::error::Error for HwError {}
impl core::error::Error for SenseError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
