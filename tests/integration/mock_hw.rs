//! Mock adapters for integration tests.
//!
//! [`MockHardware`] records every pin and converter call so tests can
//! assert on the full hardware history without touching real registers.
//! It also panics if a second pin is opened on the converter while one is
//! still connected.

use std::cell::Cell;
use std::collections::VecDeque;

use matrixlight::app::ports::{
    AnalogPort, DigitalPort, Event, EventBus, Level, ListenerId, OneShotTimer, PinId, PinMode,
    TimerToken,
};
use matrixlight::error::HwError;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    Mode(u8, PinMode),
    Write(u8, Level),
    ClearPull(u8),
    Open(u8),
    Read(u8),
    Close(u8),
    PowerDown,
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<HwCall>,
    /// Raw readings handed out in order; `0` once exhausted.
    pub readings: VecDeque<u16>,
    pub refuse_open: bool,
    open: Option<PinId>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn with_readings(readings: &[u16]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
            ..Default::default()
        }
    }

    /// Hardware whose converter refuses every open.
    pub fn refusing() -> Self {
        Self {
            refuse_open: true,
            ..Default::default()
        }
    }

    pub fn push_readings(&mut self, readings: &[u16]) {
        self.readings.extend(readings.iter().copied());
    }

    pub fn open_pin(&self) -> Option<PinId> {
        self.open
    }

    /// Pins opened on the converter, in order.
    pub fn opened(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Open(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl DigitalPort for MockHardware {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        self.calls.push(HwCall::Mode(pin.0, mode));
    }

    fn write(&mut self, pin: PinId, level: Level) {
        self.calls.push(HwCall::Write(pin.0, level));
    }

    fn clear_pull(&mut self, pin: PinId) {
        self.calls.push(HwCall::ClearPull(pin.0));
    }
}

impl AnalogPort for MockHardware {
    fn open(&mut self, pin: PinId) -> Result<(), HwError> {
        if self.refuse_open {
            return Err(HwError::AdcUnavailable(-1));
        }
        assert!(
            self.open.is_none(),
            "GPIO{} opened while GPIO{} still analog",
            pin.0,
            self.open.map_or(0, |p| p.0)
        );
        self.open = Some(pin);
        self.calls.push(HwCall::Open(pin.0));
        Ok(())
    }

    fn read_raw(&mut self, pin: PinId) -> u16 {
        self.calls.push(HwCall::Read(pin.0));
        self.readings.pop_front().unwrap_or(0)
    }

    fn close(&mut self, pin: PinId) {
        self.open = None;
        self.calls.push(HwCall::Close(pin.0));
    }

    fn power_down(&mut self) {
        self.open = None;
        self.calls.push(HwCall::PowerDown);
    }
}

// ── MockTimer ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTimer {
    pub scheduled: Vec<(u32, TimerToken)>,
    pub fail: bool,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn last_token(&self) -> Option<TimerToken> {
        self.scheduled.last().map(|&(_, t)| t)
    }
}

impl OneShotTimer for MockTimer {
    fn schedule(&mut self, delay_us: u32, token: TimerToken) -> Result<(), HwError> {
        if self.fail {
            return Err(HwError::TimerFailed(-1));
        }
        self.scheduled.push((delay_us, token));
        Ok(())
    }
}

// ── CountingBus ───────────────────────────────────────────────

/// Bus that only counts calls, for lifecycle assertions.
#[derive(Default)]
pub struct CountingBus {
    pub subscribes: Cell<u32>,
    pub unsubscribes: Cell<u32>,
    pub ready_published: Cell<u32>,
}

impl EventBus for CountingBus {
    fn subscribe(&self, _event: Event, _listener: ListenerId) -> bool {
        self.subscribes.set(self.subscribes.get() + 1);
        true
    }

    fn unsubscribe(&self, _event: Event, _listener: ListenerId) {
        self.unsubscribes.set(self.unsubscribes.get() + 1);
    }

    fn publish(&self, event: Event) -> bool {
        if event == Event::LightSenseReady {
            self.ready_published.set(self.ready_published.get() + 1);
        }
        true
    }
}
