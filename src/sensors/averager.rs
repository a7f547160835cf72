//! Per-channel sample store and round averaging.
//!
//! One slot per sensing channel, overwritten by each conversion and never
//! cleared.  A round is one pass over channels `0..N`; recording channel 0
//! opens a new round and recording channel `N - 1` closes it.
//!
//! - `running_average` is refreshed after every conversion: the mean over
//!   all slots, where an unset or implausible slot counts as zero.
//! - `last_valid_average` is only written when a round closes and every
//!   reading taken during that round was plausible.
//!
//! A round that closes valid raises [`Event::LightSenseReady`] once.

use log::debug;

use crate::app::ports::{Event, EventBus};
use crate::config::MAX_CHANNELS;

/// Raw readings for each channel; `None` = never sampled / failed open.
pub type SampleSet = [Option<u16>; MAX_CHANNELS];

/// Averages derived from the sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AveragingState {
    /// Mean of the latest update regardless of validity.
    pub running_average: u16,
    /// Mean of the latest fully valid update, `None` until one happens.
    pub last_valid_average: Option<u16>,
}

/// Result of one [`Averager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// The conversion just recorded closed a round.
    pub complete: bool,
    /// `complete` and every reading of the round was plausible.
    pub valid: bool,
    pub running_average: u16,
}

pub struct Averager {
    samples: SampleSet,
    channels: usize,
    validity_threshold: u16,
    state: AveragingState,
    /// No implausible reading seen since the round opened.
    round_valid: bool,
    /// The last recorded channel was `channels - 1`.
    round_closed: bool,
}

impl Averager {
    /// `channels` is clamped to `1..=MAX_CHANNELS`.
    pub fn new(channels: usize, validity_threshold: u16) -> Self {
        Self {
            samples: [None; MAX_CHANNELS],
            channels: channels.clamp(1, MAX_CHANNELS),
            validity_threshold,
            state: AveragingState::default(),
            round_valid: false,
            round_closed: false,
        }
    }

    /// Store the conversion result for `channel`.  Channels outside the
    /// configured set are ignored.
    pub fn record(&mut self, channel: usize, raw: Option<u16>) {
        if channel >= self.channels {
            return;
        }
        if channel == 0 {
            self.round_valid = true;
        }
        self.round_valid &= self.is_valid(raw);
        self.round_closed = channel + 1 == self.channels;
        self.samples[channel] = raw;
    }

    /// Whether a raw reading is physically plausible.
    pub fn is_valid(&self, raw: Option<u16>) -> bool {
        matches!(raw, Some(v) if v <= self.validity_threshold)
    }

    /// Refresh the running average.  If the last recorded conversion closed
    /// a fully valid round, also publish it as the last valid average and
    /// notify `bus`.
    pub fn update(&mut self, bus: &impl EventBus) -> RoundOutcome {
        let sum: u32 = self.samples[..self.channels]
            .iter()
            .filter(|&&raw| self.is_valid(raw))
            .map(|&raw| u32::from(raw.unwrap_or(0)))
            .sum();
        let running_average = (sum / self.channels as u32) as u16;
        self.state.running_average = running_average;

        // Consumed here so a second update() cannot publish the round twice.
        let complete = core::mem::take(&mut self.round_closed);
        let valid = complete && self.round_valid;
        if valid {
            self.state.last_valid_average = Some(running_average);
            bus.publish(Event::LightSenseReady);
        }
        if complete {
            debug!(
                "averager: round {:?} avg={} valid={}",
                self.samples(),
                running_average,
                valid
            );
        }

        RoundOutcome {
            complete,
            valid,
            running_average,
        }
    }

    pub fn samples(&self) -> &[Option<u16>] {
        &self.samples[..self.channels]
    }

    pub fn state(&self) -> AveragingState {
        self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
