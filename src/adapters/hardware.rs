//! Hardware adapter: bridges the matrix GPIOs and ADC1 to the port traits.
//!
//! Implements [`DigitalPort`] and [`AnalogPort`] for the LED matrix.  This
//! is the only module in the system that touches GPIO and ADC registers.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: raw `gpio_*` calls and the ADC oneshot driver.  The ADC unit
//! is created on [`AnalogPort::open`] and deleted on
//! [`AnalogPort::power_down`], which hands the pad back to the GPIO matrix.
//! On host/test: pin state and ADC values live in memory; tests inject
//! readings with [`MatrixHardware::sim_set_adc`].
//!
//! The S3's ADC only converts at 12 bits, so readings are shifted down to
//! the configured resolution before they leave the adapter.

use crate::app::ports::{AnalogPort, DigitalPort, Level, PinId, PinMode};
use crate::error::HwError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{error, info};

/// Resolution the converter natively produces.
pub const NATIVE_ADC_BITS: u8 = 12;

/// Shift a native 12-bit reading down to `bits`.
pub fn scale_to_resolution(native: u16, bits: u8) -> u16 {
    let shift = NATIVE_ADC_BITS.saturating_sub(bits);
    native >> shift
}

/// Simulated state of one GPIO.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPin {
    pub mode: PinMode,
    pub level: Level,
    pub pull_cleared: bool,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimPin {
    fn default() -> Self {
        Self {
            mode: PinMode::Output,
            level: Level::High,
            pull_cleared: false,
        }
    }
}

/// Concrete matrix adapter.
pub struct MatrixHardware {
    resolution_bits: u8,
    #[cfg(target_os = "espidf")]
    adc: adc_oneshot_unit_handle_t,
    #[cfg(target_os = "espidf")]
    channel: Option<adc_channel_t>,
    #[cfg(not(target_os = "espidf"))]
    pins: HashMap<u8, SimPin>,
    #[cfg(not(target_os = "espidf"))]
    sim_adc: HashMap<u8, u16>,
    #[cfg(not(target_os = "espidf"))]
    open: Option<PinId>,
    #[cfg(not(target_os = "espidf"))]
    adc_powered: bool,
}

impl MatrixHardware {
    pub fn new(resolution_bits: u8) -> Self {
        #[cfg(target_os = "espidf")]
        info!("MatrixHardware: ADC1 oneshot, {}-bit output", resolution_bits);

        #[cfg(not(target_os = "espidf"))]
        log::info!("MatrixHardware: simulation backend");

        Self {
            resolution_bits,
            #[cfg(target_os = "espidf")]
            adc: core::ptr::null_mut(),
            #[cfg(target_os = "espidf")]
            channel: None,
            #[cfg(not(target_os = "espidf"))]
            pins: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_adc: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            open: None,
            #[cfg(not(target_os = "espidf"))]
            adc_powered: false,
        }
    }

    pub fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl DigitalPort for MatrixHardware {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        let mode = match mode {
            PinMode::Output => gpio_mode_t_GPIO_MODE_OUTPUT,
            PinMode::Input => gpio_mode_t_GPIO_MODE_INPUT,
        };
        // SAFETY: pin numbers come from the board map and are valid GPIOs.
        let ret = unsafe { gpio_set_direction(i32::from(pin.0), mode) };
        if ret != ESP_OK {
            error!("gpio_set_direction(GPIO{}) failed (rc={})", pin.0, ret);
        }
    }

    fn write(&mut self, pin: PinId, level: Level) {
        let level = u32::from(level == Level::High);
        // SAFETY: see set_mode.
        let ret = unsafe { gpio_set_level(i32::from(pin.0), level) };
        if ret != ESP_OK {
            error!("gpio_set_level(GPIO{}) failed (rc={})", pin.0, ret);
        }
    }

    fn clear_pull(&mut self, pin: PinId) {
        // SAFETY: see set_mode.
        let ret = unsafe { gpio_set_pull_mode(i32::from(pin.0), gpio_pull_mode_t_GPIO_FLOATING) };
        if ret != ESP_OK {
            error!("gpio_set_pull_mode(GPIO{}) failed (rc={})", pin.0, ret);
        }
    }
}

#[cfg(target_os = "espidf")]
impl AnalogPort for MatrixHardware {
    fn open(&mut self, pin: PinId) -> Result<(), HwError> {
        let mut unit: adc_unit_t = 0;
        let mut channel: adc_channel_t = 0;
        // SAFETY: out-pointers reference locals.
        let ret = unsafe { adc_oneshot_io_to_channel(i32::from(pin.0), &mut unit, &mut channel) };
        if ret != ESP_OK {
            return Err(HwError::AdcUnavailable(ret));
        }

        if self.adc.is_null() {
            let init_cfg = adc_oneshot_unit_init_cfg_t {
                unit_id: unit,
                ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..Default::default()
            };
            // SAFETY: self.adc is only written here and in power_down(),
            // both from the main task.
            let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut self.adc) };
            if ret != ESP_OK {
                self.adc = core::ptr::null_mut();
                return Err(HwError::AdcUnavailable(ret));
            }
        }

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
        };
        // SAFETY: self.adc is a live unit handle (checked above).
        let ret = unsafe { adc_oneshot_config_channel(self.adc, channel, &chan_cfg) };
        if ret != ESP_OK {
            return Err(HwError::AdcUnavailable(ret));
        }
        self.channel = Some(channel);
        Ok(())
    }

    fn read_raw(&mut self, pin: PinId) -> u16 {
        let Some(channel) = self.channel else {
            error!("adc read on GPIO{} without open channel", pin.0);
            return 0;
        };
        let mut raw: i32 = 0;
        // SAFETY: channel is only Some while self.adc is a live handle.
        let ret = unsafe { adc_oneshot_read(self.adc, channel, &mut raw) };
        if ret != ESP_OK {
            error!("adc_oneshot_read(GPIO{}) failed (rc={})", pin.0, ret);
            return u16::MAX;
        }
        scale_to_resolution(raw.max(0) as u16, self.resolution_bits)
    }

    fn close(&mut self, _pin: PinId) {
        self.channel = None;
    }

    fn power_down(&mut self) {
        self.channel = None;
        if self.adc.is_null() {
            return;
        }
        // SAFETY: handle created by adc_oneshot_new_unit and not yet deleted.
        let ret = unsafe { adc_oneshot_del_unit(self.adc) };
        if ret != ESP_OK {
            error!("adc_oneshot_del_unit failed (rc={})", ret);
        }
        self.adc = core::ptr::null_mut();
    }
}

// ── Simulation backend ────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MatrixHardware {
    /// Inject the native 12-bit reading the ADC will return for `pin`.
    pub fn sim_set_adc(&mut self, pin: PinId, native: u16) {
        self.sim_adc.insert(pin.0, native);
    }

    /// Current simulated state of `pin` (untouched pins read as display
    /// default: output, high).
    pub fn pin(&self, pin: PinId) -> SimPin {
        self.pins.get(&pin.0).copied().unwrap_or_default()
    }

    /// Pin currently connected to the converter.
    pub fn open_pin(&self) -> Option<PinId> {
        self.open
    }

    pub fn adc_powered(&self) -> bool {
        self.adc_powered
    }
}

#[cfg(not(target_os = "espidf"))]
impl DigitalPort for MatrixHardware {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        self.pins.entry(pin.0).or_default().mode = mode;
    }

    fn write(&mut self, pin: PinId, level: Level) {
        self.pins.entry(pin.0).or_default().level = level;
    }

    fn clear_pull(&mut self, pin: PinId) {
        self.pins.entry(pin.0).or_default().pull_cleared = true;
    }
}

#[cfg(not(target_os = "espidf"))]
impl AnalogPort for MatrixHardware {
    fn open(&mut self, pin: PinId) -> Result<(), HwError> {
        // GPIO1..=GPIO10 are the S3's ADC1 pads.
        if !(1..=10).contains(&pin.0) {
            return Err(HwError::AdcUnavailable(-1));
        }
        if self.open.is_some() {
            return Err(HwError::AdcUnavailable(-1));
        }
        self.open = Some(pin);
        self.adc_powered = true;
        Ok(())
    }

    fn read_raw(&mut self, pin: PinId) -> u16 {
        let native = self.sim_adc.get(&pin.0).copied().unwrap_or(0);
        scale_to_resolution(native, self.resolution_bits)
    }

    fn close(&mut self, _pin: PinId) {
        self.open = None;
    }

    fn power_down(&mut self) {
        self.open = None;
        self.adc_powered = false;
    }
}
