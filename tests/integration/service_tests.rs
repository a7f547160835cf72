//! Integration tests for the MessageBus → SensingService → LightSensor
//! pipeline, running on the simulation adapters the firmware binary uses
//! on target.

use std::time::Duration;

use matrixlight::adapters::hardware::MatrixHardware;
use matrixlight::adapters::nvs::NvsAdapter;
use matrixlight::app::ports::{ConfigPort, Event, EventBus, Level, ListenerId, PinId, PinMode};
use matrixlight::app::service::SensingService;
use matrixlight::config::SensorConfig;
use matrixlight::drivers::hw_timer::SettleTimer;
use matrixlight::events::MessageBus;
use matrixlight::pins::MatrixMap;
use matrixlight::sensors::LightSensor;

type SimService<'b> = SensingService<'b, MatrixHardware, SettleTimer>;

const FRAME_PERIOD: Duration = Duration::from_millis(20);

/// Native 12-bit readings for GPIO1..=3; the adapter scales them to 10 bits.
fn sim_hardware(native: [u16; 3]) -> MatrixHardware {
    let mut hw = MatrixHardware::new(10);
    for (i, raw) in native.into_iter().enumerate() {
        hw.sim_set_adc(PinId(i as u8 + 1), raw);
    }
    hw
}

fn make_service(bus: &MessageBus, native: [u16; 3], config: SensorConfig) -> SimService<'_> {
    let sensor = LightSensor::new(
        sim_hardware(native),
        SettleTimer::new().unwrap(),
        Some(bus),
        MatrixMap::board(),
        config,
    )
    .unwrap();
    SensingService::new(sensor, bus)
}

/// One display frame: request sensing, then convert within the same frame
/// once the settle interval expires.
fn frame(svc: &mut SimService<'_>, bus: &MessageBus) {
    bus.publish(Event::LightSense);
    svc.dispatch();
    let token = svc.sensor().timer().wait_expired(FRAME_PERIOD).unwrap();
    svc.on_timer(token);
    assert!(!svc.sensor().is_busy());
}

#[test]
fn three_frames_produce_first_brightness() {
    let bus = MessageBus::new();
    // 400, 800, 1200 native -> 100, 200, 300 at 10 bits
    let mut svc = make_service(&bus, [400, 800, 1200], SensorConfig::default());

    frame(&mut svc, &bus);
    frame(&mut svc, &bus);
    assert_eq!(svc.last_brightness(), None);
    assert_eq!(svc.read(true), -1);

    frame(&mut svc, &bus);
    assert_eq!(svc.ready_events(), 1);
    assert_eq!(svc.last_brightness(), Some(133));
    assert_eq!(svc.sensor().averages().last_valid_average, Some(200));
}

#[test]
fn column_returns_to_display_after_every_frame() {
    let bus = MessageBus::new();
    let mut svc = make_service(&bus, [400, 800, 1200], SensorConfig::default());

    for _ in 0..4 {
        frame(&mut svc, &bus);
        let hw = svc.sensor().hardware();
        assert!(!hw.adc_powered());
        assert_eq!(hw.open_pin(), None);
        for gpio in 1..=3 {
            let pin = hw.pin(PinId(gpio));
            assert_eq!(pin.mode, PinMode::Output);
            assert_eq!(pin.level, Level::High);
        }
    }
    // Rows are left low; the display's next refresh drives them.
    assert_eq!(svc.sensor().hardware().pin(PinId(35)).level, Level::Low);
}

#[test]
fn saturated_column_never_becomes_ready() {
    let bus = MessageBus::new();
    // Column 0 saturates: 4000 >> 2 = 1000 > 450.
    let mut svc = make_service(&bus, [4000, 800, 1200], SensorConfig::default());
    for _ in 0..6 {
        frame(&mut svc, &bus);
    }
    assert_eq!(svc.ready_events(), 0);
    assert_eq!(svc.read(true), -1);
    assert!((0..=255).contains(&svc.read(false)));
    // Six frames, two rounds.
    assert_eq!(svc.sensor().stats().invalid_rounds, 2);
}

#[test]
fn repeated_request_in_same_frame_is_dropped() {
    let bus = MessageBus::new();
    let mut svc = make_service(&bus, [400, 800, 1200], SensorConfig::default());

    bus.publish(Event::LightSense);
    bus.publish(Event::LightSense);
    svc.dispatch();

    assert_eq!(svc.sensor().stats().rejected_triggers, 1);
    assert_eq!(svc.sensor().timer().scheduled(), 1);
}

#[test]
fn settle_longer_than_a_frame_converts_on_a_later_frame() {
    let bus = MessageBus::new();
    let config = SensorConfig {
        settle_interval_us: 30_000,
        ..Default::default()
    };
    let mut svc = make_service(&bus, [400, 800, 1200], config);

    bus.publish(Event::LightSense);
    svc.dispatch();
    assert_eq!(svc.sensor().timer().wait_expired(FRAME_PERIOD), None);
    assert!(svc.sensor().is_busy());

    let token = svc
        .sensor()
        .timer()
        .wait_expired(FRAME_PERIOD * 2)
        .unwrap();
    svc.on_timer(token);
    assert_eq!(svc.sensor().channel(), 1);
    assert_eq!(svc.sensor().stats().conversions, 1);
}

#[test]
fn config_persisted_in_nvs_drives_the_sensor() {
    let nvs = NvsAdapter::new().unwrap();
    let stored = SensorConfig {
        channel_count: 2,
        settle_interval_us: 1_500,
        ..Default::default()
    };
    nvs.save(&stored).unwrap();
    let config = nvs.load().unwrap();

    let bus = MessageBus::new();
    let mut svc = make_service(&bus, [400, 800, 1200], config);

    bus.publish(Event::LightSense);
    svc.dispatch();
    let (delay, _) = svc.sensor().timer().pending().unwrap();
    assert_eq!(delay, 1_500);

    let token = svc.sensor().timer().pending().unwrap().1;
    svc.on_timer(token);
    frame(&mut svc, &bus);
    // Two channels: (100 + 200) / 2
    assert_eq!(svc.sensor().averages().last_valid_average, Some(150));
    assert_eq!(svc.sensor().channel(), 0);
}

#[test]
fn service_teardown_leaves_bus_empty() {
    let bus = MessageBus::new();
    {
        let _svc = make_service(&bus, [0, 0, 0], SensorConfig::default());
        assert!(bus.is_subscribed(Event::LightSense, ListenerId::LIGHT_SENSOR));
        assert!(bus.is_subscribed(Event::LightSenseReady, ListenerId::APPLICATION));
    }
    assert_eq!(bus.listener_count(), 0);
    assert!(!bus.publish(Event::LightSense));
}
