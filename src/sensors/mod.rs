//! Matrix light sensor: interleaves light sensing with the LED display.
//!
//! There is no photodiode on the board.  Instead a few LED columns are
//! briefly taken away from the display, charged, left to discharge through
//! ambient light for a settle interval, and read on the ADC.
//!
//! ```text
//!            start_sensing()                 on_settle_elapsed(token)
//!   Idle ──────────────────▶ Preparing(ch) ──▶ AwaitingConversion(ch, token)
//!    ▲                                                   │
//!    └──── borrow · sample · release · ch += 1 · average ┘
//! ```
//!
//! [`LightSensor`] owns the hardware and timer adapters through the port
//! traits and is driven entirely from the outside: the main loop calls
//! [`LightSensor::start_sensing`] for each light-sense request from the
//! display and [`LightSensor::on_settle_elapsed`] for each expired settle
//! timer.  [`LightSensor::read`] never starts sampling.

pub mod averager;
pub mod borrow;
pub mod brightness;
pub mod sequencer;

use heapless::Vec;
use log::{error, info, warn};

use crate::app::ports::{
    AnalogPort, DigitalPort, Event, EventBus, ListenerId, NoBus, OneShotTimer, PinId, TimerToken,
};
use crate::config::{MAX_CHANNELS, SensorConfig};
use crate::error::{Error, SenseError};
use crate::pins::MatrixMap;
use crate::scheduler::SettleScheduler;
use averager::{Averager, AveragingState, RoundOutcome};
use borrow::AnalogBorrow;
use brightness::{Bounds, NO_READING, ReadMode};

/// Where the sensing cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseState {
    Idle,
    /// Column is being isolated; only observable if preparation is interrupted.
    Preparing(usize),
    /// Settle timer armed; waiting for `token` to expire.
    AwaitingConversion { channel: usize, token: TimerToken },
}

/// Counters for field diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorStats {
    pub conversions: u32,
    /// Completed rounds, split by validity.
    pub valid_rounds: u32,
    pub invalid_rounds: u32,
    /// Triggers dropped because a pass was already in flight.
    pub rejected_triggers: u32,
    /// Timer expiries that did not match the armed token.
    pub stale_callbacks: u32,
    /// Prepared columns handed back to the display without a conversion.
    pub forced_releases: u32,
}

/// Interleaved light sensor over the display's LED columns.
pub struct LightSensor<H, T, B = NoBus>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
    B: EventBus,
{
    hw: H,
    timer: T,
    bus: Option<B>,
    subscribed: bool,
    rows: &'static [PinId],
    sense_pins: Vec<PinId, MAX_CHANNELS>,
    config: SensorConfig,
    channel: usize,
    state: SenseState,
    reserved: Option<PinId>,
    scheduler: SettleScheduler,
    averager: Averager,
    stats: SensorStats,
}

impl<H, T> LightSensor<H, T, NoBus>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
{
    /// Build a sensor that is driven manually and publishes nothing.
    pub fn standalone(
        hw: H,
        timer: T,
        map: MatrixMap,
        config: SensorConfig,
    ) -> Result<Self, Error> {
        Self::new(hw, timer, None, map, config)
    }
}

impl<H, T, B> LightSensor<H, T, B>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
    B: EventBus,
{
    /// Construct the sensor and, if a bus is given, subscribe to
    /// [`Event::LightSense`].
    ///
    /// Fails if `config` is out of range or `map` has fewer columns than
    /// `config.channel_count`.
    pub fn new(
        hw: H,
        timer: T,
        bus: Option<B>,
        map: MatrixMap,
        config: SensorConfig,
    ) -> Result<Self, Error> {
        config.validate().map_err(Error::Config)?;

        let channels = config.channel_count as usize;
        let mut sense_pins = Vec::new();
        for ch in 0..channels {
            let pin = map
                .sense_pin(ch)
                .ok_or(Error::Config("matrix map has fewer columns than channel_count"))?;
            // channels <= MAX_CHANNELS after validate()
            let _ = sense_pins.push(pin);
        }

        let subscribed = match &bus {
            Some(bus) => {
                let ok = bus.subscribe(Event::LightSense, ListenerId::LIGHT_SENSOR);
                if !ok {
                    warn!("LightSensor: bus subscription table full, manual triggering only");
                }
                ok
            }
            None => false,
        };

        info!(
            "LightSensor: {} channels, settle={}us, threshold={}, window={}..{}",
            channels,
            config.settle_interval_us,
            config.validity_threshold,
            config.min_value,
            config.max_value
        );

        Ok(Self {
            hw,
            timer,
            bus,
            subscribed,
            rows: map.rows,
            sense_pins,
            averager: Averager::new(channels, config.validity_threshold),
            config,
            channel: 0,
            state: SenseState::Idle,
            reserved: None,
            scheduler: SettleScheduler::new(),
            stats: SensorStats::default(),
        })
    }

    // ── Sensing cycle ─────────────────────────────────────────

    /// Begin a sensing pass on the current channel.
    ///
    /// Rejects the request with [`SenseError::Busy`] while a previous pass
    /// is still waiting for its conversion.
    pub fn start_sensing(&mut self) -> Result<usize, SenseError> {
        if self.state != SenseState::Idle {
            self.stats.rejected_triggers = self.stats.rejected_triggers.saturating_add(1);
            warn!("LightSensor: trigger while {:?}, dropped", self.state);
            return Err(SenseError::Busy);
        }

        let channel = self.channel;
        let pin = self.sense_pins[channel];
        debug_assert!(self.reserved.is_none(), "idle sensor holding a column");

        self.state = SenseState::Preparing(channel);
        sequencer::prepare(&mut self.hw, self.rows, pin);
        self.reserved = Some(pin);

        match self
            .scheduler
            .arm(&mut self.timer, self.config.settle_interval_us)
        {
            Ok(token) => {
                self.state = SenseState::AwaitingConversion { channel, token };
                Ok(channel)
            }
            Err(e) => {
                error!("LightSensor: settle timer unavailable: {}", e);
                self.release_reservation();
                self.state = SenseState::Idle;
                Err(e.into())
            }
        }
    }

    /// Conversion step, run when the settle timer carrying `token` expires.
    ///
    /// Returns `None` for an expiry that does not belong to the pass in
    /// flight; such callbacks change nothing.
    pub fn on_settle_elapsed(&mut self, token: TimerToken) -> Option<RoundOutcome> {
        let SenseState::AwaitingConversion {
            channel,
            token: armed,
        } = self.state
        else {
            return self.reject_stale(token);
        };
        if token != armed || !self.scheduler.accept(token) {
            return self.reject_stale(token);
        }

        let pin = self.reserved.take().unwrap_or(self.sense_pins[channel]);
        let raw = match AnalogBorrow::acquire(&mut self.hw, pin) {
            Ok(mut borrow) => {
                let raw = borrow.sample();
                borrow.release();
                Some(raw)
            }
            Err(_) => None,
        };
        self.stats.conversions = self.stats.conversions.saturating_add(1);

        self.averager.record(channel, raw);
        self.channel = (channel + 1) % self.averager.channels();
        self.state = SenseState::Idle;

        let outcome = match &self.bus {
            Some(bus) => self.averager.update(bus),
            None => self.averager.update(&NoBus),
        };
        if outcome.valid {
            self.stats.valid_rounds = self.stats.valid_rounds.saturating_add(1);
        } else if outcome.complete {
            self.stats.invalid_rounds = self.stats.invalid_rounds.saturating_add(1);
        }
        Some(outcome)
    }

    // ── Read API ──────────────────────────────────────────────

    /// Brightness 0 (dark) ..= 255 (very bright), or `None` if `mode` is
    /// [`ReadMode::ValidOnly`] and no valid round has completed yet.
    pub fn brightness(&self, mode: ReadMode) -> Option<u8> {
        let state = self.averager.state();
        let average = match mode {
            ReadMode::ValidOnly => state.last_valid_average?,
            ReadMode::Latest => state.running_average,
        };
        Some(brightness::normalise(average, self.bounds()))
    }

    /// Integer form of [`brightness`](Self::brightness): `-1` stands in for
    /// "no valid data yet".
    pub fn read(&self, valid_only: bool) -> i16 {
        self.brightness(ReadMode::from_valid_only(valid_only))
            .map_or(NO_READING, i16::from)
    }

    // ── Teardown ──────────────────────────────────────────────

    /// Unsubscribe from the bus and hand any prepared column back to the
    /// display.  Idempotent; also run on drop.
    pub fn detach(&mut self) {
        if self.subscribed {
            if let Some(bus) = &self.bus {
                bus.unsubscribe(Event::LightSense, ListenerId::LIGHT_SENSOR);
            }
            self.subscribed = false;
            info!("LightSensor: detached from bus");
        }
        if self.reserved.is_some() {
            self.stats.forced_releases = self.stats.forced_releases.saturating_add(1);
            warn!("LightSensor: releasing column with conversion pending");
            self.release_reservation();
            self.state = SenseState::Idle;
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> SenseState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != SenseState::Idle
    }

    /// Channel the next pass will sample.
    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn averages(&self) -> AveragingState {
        self.averager.state()
    }

    pub fn samples(&self) -> &[Option<u16>] {
        self.averager.samples()
    }

    pub fn stats(&self) -> SensorStats {
        self.stats
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    // ── Internal ──────────────────────────────────────────────

    fn bounds(&self) -> Bounds {
        Bounds {
            min: self.config.min_value,
            max: self.config.max_value,
        }
    }

    fn release_reservation(&mut self) {
        if let Some(pin) = self.reserved.take() {
            borrow::restore(&mut self.hw, pin);
        }
    }

    fn reject_stale(&mut self, token: TimerToken) -> Option<RoundOutcome> {
        self.stats.stale_callbacks = self.stats.stale_callbacks.saturating_add(1);
        warn!(
            "LightSensor: ignoring settle expiry {} while {:?}",
            token.get(),
            self.state
        );
        None
    }
}

impl<H, T, B> Drop for LightSensor<H, T, B>
where
    H: DigitalPort + AnalogPort,
    T: OneShotTimer,
    B: EventBus,
{
    fn drop(&mut self) {
        self.detach();
    }
}
