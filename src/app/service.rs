//! Application service: routes bus traffic and timer expiries into the sensor.
//!
//! [`SensingService`] is the piece the main loop talks to.  It owns the
//! [`LightSensor`], listens for readiness on behalf of the application, and
//! caches the last published brightness so consumers never have to touch
//! the sensor directly.
//!
//! ```text
//!  MessageBus ──▶ ┌──────────────────────┐
//!                 │   SensingService     │ ──▶ last_brightness()
//!  timer token ──▶│   LightSensor        │
//!                 └──────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::app::ports::{
    AnalogPort, DigitalPort, Event, EventBus, ListenerId, OneShotTimer, TimerToken,
};
use crate::error::SenseError;
use crate::events::{Delivery, MessageBus};
use crate::sensors::LightSensor;
use crate::sensors::brightness::ReadMode;

/// Main-loop facade over the light sensor.
pub struct SensingService<'b, H, T>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
{
    sensor: LightSensor<H, T, &'b MessageBus>,
    bus: &'b MessageBus,
    last_brightness: Option<u8>,
    ready_events: u32,
}

impl<'b, H, T> SensingService<'b, H, T>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
{
    /// Wrap `sensor` and subscribe the application to readiness events.
    pub fn new(sensor: LightSensor<H, T, &'b MessageBus>, bus: &'b MessageBus) -> Self {
        if !bus.subscribe(Event::LightSenseReady, ListenerId::APPLICATION) {
            warn!("SensingService: cannot subscribe to readiness, brightness cache disabled");
        }
        info!("SensingService started");
        Self {
            sensor,
            bus,
            last_brightness: None,
            ready_events: 0,
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Handle every pending bus delivery.  Returns how many were handled.
    pub fn dispatch(&mut self) -> usize {
        let bus = self.bus;
        let mut handled = 0;
        bus.drain(|delivery| {
            self.handle(delivery);
            handled += 1;
        });
        handled
    }

    /// Feed an expired settle timer into the sensor, then deliver anything
    /// the conversion published.
    pub fn on_timer(&mut self, token: TimerToken) {
        if let Some(outcome) = self.sensor.on_settle_elapsed(token) {
            debug!(
                "SensingService: conversion avg={} valid={}",
                outcome.running_average, outcome.valid
            );
        }
        self.dispatch();
    }

    // ── Queries ───────────────────────────────────────────────

    /// Brightness cached at the last readiness event.
    pub fn last_brightness(&self) -> Option<u8> {
        self.last_brightness
    }

    /// Number of readiness events received.
    pub fn ready_events(&self) -> u32 {
        self.ready_events
    }

    /// Same contract as [`LightSensor::read`].
    pub fn read(&self, valid_only: bool) -> i16 {
        self.sensor.read(valid_only)
    }

    pub fn sensor(&self) -> &LightSensor<H, T, &'b MessageBus> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut LightSensor<H, T, &'b MessageBus> {
        &mut self.sensor
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle(&mut self, delivery: Delivery) {
        match (delivery.event, delivery.listener) {
            (Event::LightSense, ListenerId::LIGHT_SENSOR) => match self.sensor.start_sensing() {
                Ok(channel) => debug!("SensingService: sensing channel {}", channel),
                Err(SenseError::Busy) => {}
                Err(e) => warn!("SensingService: sensing pass not started: {}", e),
            },
            (Event::LightSenseReady, ListenerId::APPLICATION) => {
                self.ready_events = self.ready_events.saturating_add(1);
                self.last_brightness = self.sensor.brightness(ReadMode::ValidOnly);
            }
            (event, listener) => {
                debug!("SensingService: no route for {:?} -> {:?}", event, listener);
            }
        }
    }
}

impl<H, T> Drop for SensingService<'_, H, T>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
{
    fn drop(&mut self) {
        self.bus
            .unsubscribe(Event::LightSenseReady, ListenerId::APPLICATION);
    }
}
