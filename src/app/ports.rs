//! Port traits: the hexagonal boundary between the sensing core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LightSensor (domain)
//! ```
//!
//! Driven adapters (GPIO, ADC, one-shot timer, message bus, storage)
//! implement these traits.  The [`LightSensor`](crate::sensors::LightSensor)
//! consumes them via generics, so the sensing core never touches hardware
//! directly.
//!
//! Pin and converter primitives are assumed to succeed when invoked in the
//! documented sequence; only the calls that can genuinely fail on target
//! (ADC open, timer arm) return a `Result`.

use crate::config::SensorConfig;
use crate::error::HwError;

// ───────────────────────────────────────────────────────────────
// Pin vocabulary
// ───────────────────────────────────────────────────────────────

/// Physical GPIO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinId(pub u8);

/// Direction of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    Input,
}

/// Digital output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

// ───────────────────────────────────────────────────────────────
// Digital port (driven adapter: domain → GPIO)
// ───────────────────────────────────────────────────────────────

/// Digital pin control shared with the display driver.
pub trait DigitalPort {
    /// Switch a pin between output and input.
    fn set_mode(&mut self, pin: PinId, mode: PinMode);

    /// Drive an output pin.
    fn write(&mut self, pin: PinId, level: Level);

    /// Disable both pull-up and pull-down resistors on a pin.
    fn clear_pull(&mut self, pin: PinId);
}

// ───────────────────────────────────────────────────────────────
// Analog port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Analog sampling on one pin at a time.
///
/// `close` detaches a single pin; `power_down` disables the whole
/// converter peripheral.  Both are required on release; a converter that
/// is merely closed keeps the GPIO muxed to analog and the display loses
/// the column.
pub trait AnalogPort {
    /// Connect `pin` to the converter.
    fn open(&mut self, pin: PinId) -> Result<(), HwError>;

    /// Take one raw sample at the configured resolution.
    fn read_raw(&mut self, pin: PinId) -> u16;

    /// Disconnect `pin` from the converter.
    fn close(&mut self, pin: PinId);

    /// Fully disable the converter peripheral.
    fn power_down(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Timer port
// ───────────────────────────────────────────────────────────────

/// Identifies one armed settle timer.  Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub core::num::NonZeroU32);

impl TimerToken {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// One-shot deferred callback.  The adapter delivers expiry back to the
/// main loop, which hands the token to
/// [`LightSensor::on_settle_elapsed`](crate::sensors::LightSensor::on_settle_elapsed).
pub trait OneShotTimer {
    fn schedule(&mut self, delay_us: u32, token: TimerToken) -> Result<(), HwError>;
}

// ───────────────────────────────────────────────────────────────
// Event bus port
// ───────────────────────────────────────────────────────────────

/// Bus events relevant to light sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    /// Display asks for a sensing pass (raised within its refresh tick).
    LightSense = 1,
    /// A fully valid round has updated the brightness.
    LightSenseReady = 2,
}

/// Identity of a bus subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u8);

impl ListenerId {
    pub const LIGHT_SENSOR: Self = Self(1);
    pub const APPLICATION: Self = Self(2);
}

/// Notification bus.  Takes `&self` because the bus is shared between the
/// display, the sensor and the timer task; implementations use interior
/// mutability.
pub trait EventBus {
    /// Register `listener` for `event`.  Returns `false` if the table is full.
    fn subscribe(&self, event: Event, listener: ListenerId) -> bool;

    /// Remove a registration.  No-op if absent.
    fn unsubscribe(&self, event: Event, listener: ListenerId);

    /// Raise `event`.  Returns `true` if at least one listener was queued.
    fn publish(&self, event: Event) -> bool;
}

impl<B: EventBus + ?Sized> EventBus for &B {
    fn subscribe(&self, event: Event, listener: ListenerId) -> bool {
        (**self).subscribe(event, listener)
    }

    fn unsubscribe(&self, event: Event, listener: ListenerId) {
        (**self).unsubscribe(event, listener);
    }

    fn publish(&self, event: Event) -> bool {
        (**self).publish(event)
    }
}

/// Stand-in for running without a bus: every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBus;

impl EventBus for NoBus {
    fn subscribe(&self, _event: Event, _listener: ListenerId) -> bool {
        false
    }

    fn unsubscribe(&self, _event: Event, _listener: ListenerId) {}

    fn publish(&self, _event: Event) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists sensor configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SensorConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SensorConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SensorConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.  Keys are namespaced to prevent
/// collisions between subsystems.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for StorageError {}
