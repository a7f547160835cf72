//! Integration tests for the LightSensor sensing cycle.
//!
//! Drive the sensor through full rounds against the recording mock
//! hardware and check averages, readiness, channel order and the exact
//! pin handoff sequence.

use crate::mock_hw::{CountingBus, HwCall, MockHardware, MockTimer};

use matrixlight::app::ports::{EventBus, Level, PinMode};
use matrixlight::config::SensorConfig;
use matrixlight::error::{HwError, SenseError};
use matrixlight::pins::MatrixMap;
use matrixlight::sensors::averager::RoundOutcome;
use matrixlight::sensors::brightness::{NO_READING, ReadMode};
use matrixlight::sensors::{LightSensor, SenseState};

fn sensor(readings: &[u16]) -> LightSensor<MockHardware, MockTimer> {
    LightSensor::standalone(
        MockHardware::with_readings(readings),
        MockTimer::default(),
        MatrixMap::board(),
        SensorConfig::default(),
    )
    .unwrap()
}

fn pass<B: EventBus>(s: &mut LightSensor<MockHardware, MockTimer, B>) -> RoundOutcome {
    s.start_sensing().unwrap();
    let token = s.timer().last_token().unwrap();
    s.on_settle_elapsed(token).unwrap()
}

// ── Averaging and readiness ──────────────────────────────────

#[test]
fn valid_round_sets_both_averages() {
    let mut s = sensor(&[100, 200, 300]);
    pass(&mut s);
    pass(&mut s);
    let out = pass(&mut s);

    assert!(out.valid);
    assert_eq!(out.running_average, 200);
    let avg = s.averages();
    assert_eq!(avg.running_average, 200);
    assert_eq!(avg.last_valid_average, Some(200));
    // (338 - 200) * 255 / 263
    assert_eq!(s.read(true), 133);
}

#[test]
fn wide_bounds_scenario() {
    let cfg = SensorConfig {
        min_value: 0,
        max_value: 450,
        ..Default::default()
    };
    let mut s = LightSensor::standalone(
        MockHardware::with_readings(&[100, 200, 300]),
        MockTimer::default(),
        MatrixMap::board(),
        cfg,
    )
    .unwrap();
    for _ in 0..3 {
        pass(&mut s);
    }
    // (450 - 200) * 255 / 450
    assert_eq!(s.read(true), 141);
}

#[test]
fn out_of_range_reading_demotes_round() {
    let mut s = sensor(&[100, 200, 300, 10, 500, 50]);
    for _ in 0..3 {
        pass(&mut s);
    }
    assert_eq!(s.averages().last_valid_average, Some(200));

    pass(&mut s);
    pass(&mut s);
    let out = pass(&mut s);

    assert!(!out.valid);
    // Slot 1 contributes 0: (10 + 0 + 50) / 3
    assert_eq!(out.running_average, 20);
    assert_eq!(s.averages().last_valid_average, Some(200));
    assert_eq!(s.read(true), 133);
}

#[test]
fn read_valid_only_is_no_reading_until_first_valid_round() {
    let mut s = sensor(&[100, 200, 300]);
    assert_eq!(s.read(true), NO_READING);
    assert_eq!(s.brightness(ReadMode::ValidOnly), None);

    pass(&mut s);
    pass(&mut s);
    assert_eq!(s.read(true), NO_READING);
    assert!((0..=255).contains(&s.read(false)));

    pass(&mut s);
    assert_ne!(s.read(true), NO_READING);
}

#[test]
fn ready_published_once_per_valid_round() {
    let bus = CountingBus::default();
    let mut s = LightSensor::new(
        MockHardware::with_readings(&[100, 200, 300, 120, 900, 90, 110, 210, 310]),
        MockTimer::default(),
        Some(&bus),
        MatrixMap::board(),
        SensorConfig::default(),
    )
    .unwrap();

    pass(&mut s);
    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 0);

    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 1);

    // 120 leaves the slots plausible, but 900 is still to come this round.
    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 1);
    assert_eq!(s.averages().last_valid_average, Some(200));
    pass(&mut s);
    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 1);

    // A clean round notifies exactly once, on its last conversion.
    pass(&mut s);
    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 1);
    pass(&mut s);
    assert_eq!(bus.ready_published.get(), 2);
    assert_eq!(s.averages().last_valid_average, Some(210));
    assert_eq!(s.stats().valid_rounds, 2);
    assert_eq!(s.stats().invalid_rounds, 1);
}

// ── Channel sequencing ───────────────────────────────────────

#[test]
fn channels_cycle_regardless_of_validity() {
    let mut s = sensor(&[999, 5, 999, 5, 5, 999, 5]);
    let mut seen = Vec::new();
    for _ in 0..7 {
        seen.push(s.channel());
        pass(&mut s);
    }
    assert_eq!(seen, [0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(s.hardware().opened(), [1, 2, 3, 1, 2, 3, 1]);
}

#[test]
fn settle_interval_comes_from_config() {
    let cfg = SensorConfig {
        settle_interval_us: 2_000,
        ..Default::default()
    };
    let mut s = LightSensor::standalone(
        MockHardware::default(),
        MockTimer::default(),
        MatrixMap::board(),
        cfg,
    )
    .unwrap();
    s.start_sensing().unwrap();
    assert_eq!(s.timer().scheduled[0].0, 2_000);
}

// ── Pin handoff ordering ─────────────────────────────────────

#[test]
fn full_pass_hardware_trace() {
    let mut s = sensor(&[123]);
    pass(&mut s);

    assert_eq!(
        s.hardware().calls,
        [
            // prepare: rows low, charge column, float it
            HwCall::Write(35, Level::Low),
            HwCall::Write(36, Level::Low),
            HwCall::Write(37, Level::Low),
            HwCall::Mode(1, PinMode::Output),
            HwCall::Write(1, Level::High),
            HwCall::Mode(1, PinMode::Input),
            HwCall::ClearPull(1),
            // convert
            HwCall::Open(1),
            HwCall::Read(1),
            // release
            HwCall::Close(1),
            HwCall::PowerDown,
            HwCall::Mode(1, PinMode::Output),
            HwCall::Write(1, Level::High),
        ]
    );
}

#[test]
fn every_open_is_closed_and_powered_down_before_digital() {
    let mut s = sensor(&[10, 20, 30, 40, 50, 60]);
    for _ in 0..6 {
        pass(&mut s);
    }
    let calls = &s.hardware().calls;
    for (i, call) in calls.iter().enumerate() {
        if let HwCall::Open(pin) = *call {
            let tail = &calls[i + 1..];
            let close = tail.iter().position(|c| *c == HwCall::Close(pin)).unwrap();
            let down = tail.iter().position(|c| *c == HwCall::PowerDown).unwrap();
            let output = tail
                .iter()
                .position(|c| *c == HwCall::Mode(pin, PinMode::Output))
                .unwrap();
            assert!(close < down && down < output, "bad release order for GPIO{}", pin);
        }
    }
    assert_eq!(s.hardware().open_pin(), None);
}

#[test]
fn refused_open_restores_pin_and_invalidates_slot() {
    let mut s = LightSensor::standalone(
        MockHardware::refusing(),
        MockTimer::default(),
        MatrixMap::board(),
        SensorConfig::default(),
    )
    .unwrap();
    let out = pass(&mut s);
    assert!(!out.valid);
    assert_eq!(s.samples()[0], None);
    assert_eq!(
        s.hardware().calls[s.hardware().calls.len() - 3..],
        [
            HwCall::PowerDown,
            HwCall::Mode(1, PinMode::Output),
            HwCall::Write(1, Level::High),
        ]
    );
}

// ── Busy guard and stale callbacks ───────────────────────────

#[test]
fn trigger_while_awaiting_conversion_is_rejected() {
    let mut s = sensor(&[100]);
    s.start_sensing().unwrap();
    let before = s.hardware().calls.len();

    assert_eq!(s.start_sensing(), Err(SenseError::Busy));
    // A rejected trigger touches no pins.
    assert_eq!(s.hardware().calls.len(), before);
    assert_eq!(s.timer().scheduled.len(), 1);
    assert_eq!(s.stats().rejected_triggers, 1);
}

#[test]
fn stale_token_after_conversion_is_ignored() {
    let mut s = sensor(&[100, 200]);
    s.start_sensing().unwrap();
    let first = s.timer().last_token().unwrap();
    s.on_settle_elapsed(first).unwrap();

    s.start_sensing().unwrap();
    assert_eq!(s.on_settle_elapsed(first), None);
    assert!(matches!(
        s.state(),
        SenseState::AwaitingConversion { channel: 1, .. }
    ));

    let second = s.timer().last_token().unwrap();
    assert_ne!(first, second);
    assert!(s.on_settle_elapsed(second).is_some());
    assert_eq!(s.stats().stale_callbacks, 1);
}

#[test]
fn timer_failure_hands_column_back() {
    let timer = MockTimer {
        fail: true,
        ..Default::default()
    };
    let mut s = LightSensor::standalone(
        MockHardware::default(),
        timer,
        MatrixMap::board(),
        SensorConfig::default(),
    )
    .unwrap();
    assert_eq!(
        s.start_sensing(),
        Err(SenseError::Hw(HwError::TimerFailed(-1)))
    );
    assert_eq!(s.state(), SenseState::Idle);
    let calls = &s.hardware().calls;
    assert_eq!(
        calls[calls.len() - 2..],
        [HwCall::Mode(1, PinMode::Output), HwCall::Write(1, Level::High)]
    );
}

// ── Teardown ─────────────────────────────────────────────────

#[test]
fn detach_unsubscribes_exactly_once() {
    let bus = CountingBus::default();
    {
        let mut s = LightSensor::new(
            MockHardware::default(),
            MockTimer::default(),
            Some(&bus),
            MatrixMap::board(),
            SensorConfig::default(),
        )
        .unwrap();
        assert_eq!(bus.subscribes.get(), 1);
        s.detach();
        s.detach();
    }
    assert_eq!(bus.unsubscribes.get(), 1);
}

#[test]
fn detach_mid_pass_releases_column() {
    let bus = CountingBus::default();
    let mut s = LightSensor::new(
        MockHardware::default(),
        MockTimer::default(),
        Some(&bus),
        MatrixMap::board(),
        SensorConfig::default(),
    )
    .unwrap();
    s.start_sensing().unwrap();
    s.detach();

    let calls = &s.hardware().calls;
    assert_eq!(
        calls[calls.len() - 3..],
        [
            HwCall::PowerDown,
            HwCall::Mode(1, PinMode::Output),
            HwCall::Write(1, Level::High),
        ]
    );
    assert_eq!(s.stats().forced_releases, 1);
    assert_eq!(bus.unsubscribes.get(), 1);
}
