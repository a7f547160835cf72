//! Scoped analog borrow of a display column.
//!
//! The display owns every column pin as a digital output.  For one
//! conversion the sensor takes a column into analog-input mode through an
//! [`AnalogBorrow`]; the guard holds `&mut` to the hardware adapter, so no
//! second pin can be in analog mode while it lives.
//!
//! Release runs on every exit path (explicit [`AnalogBorrow::release`] or
//! `Drop`) and always in this order:
//!
//! 1. close the pin on the converter
//! 2. power the converter down entirely; on this silicon a converter left
//!    enabled keeps the GPIO muxed to analog and the display loses the column
//! 3. switch the pin back to digital output
//! 4. drive it high (column off)

use log::{debug, error};

use crate::app::ports::{AnalogPort, DigitalPort, Level, PinId, PinMode};
use crate::error::HwError;

/// Exclusive analog ownership of one pin for one conversion.
pub struct AnalogBorrow<'a, H: DigitalPort + AnalogPort> {
    hw: &'a mut H,
    pin: PinId,
    released: bool,
}

impl<'a, H: DigitalPort + AnalogPort> AnalogBorrow<'a, H> {
    /// Connect `pin` to the converter.
    ///
    /// If the converter refuses the pin, the pin is handed straight back to
    /// the display before the error is returned.
    pub fn acquire(hw: &'a mut H, pin: PinId) -> Result<Self, HwError> {
        if let Err(e) = hw.open(pin) {
            error!("borrow: ADC open failed on GPIO{}: {}", pin.0, e);
            restore(hw, pin);
            return Err(e);
        }
        debug!("borrow: GPIO{} -> analog", pin.0);
        Ok(Self {
            hw,
            pin,
            released: false,
        })
    }

    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// Take one raw sample from the borrowed pin.
    pub fn sample(&mut self) -> u16 {
        self.hw.read_raw(self.pin)
    }

    /// Return the pin to the display now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.hw.close(self.pin);
        restore(&mut *self.hw, self.pin);
        debug!("borrow: GPIO{} -> digital high", self.pin.0);
    }
}

impl<H: DigitalPort + AnalogPort> Drop for AnalogBorrow<'_, H> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Power the converter down and give `pin` back to the display as a
/// high output.  Also used to force-release a reservation that was never
/// converted.
pub fn restore<H: DigitalPort + AnalogPort>(hw: &mut H, pin: PinId) {
    hw.power_down();
    hw.set_mode(pin, PinMode::Output);
    hw.write(pin, Level::High);
}
