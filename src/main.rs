//! Matrix light sensor firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  MatrixHardware        SettleTimer         NvsAdapter        │
//! │  (Digital+Analog)      (OneShotTimer)      (Config+Storage)  │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ──────────────────     │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │  SensingService → LightSensor (pure logic)           │    │
//! │  │  sequencer · borrow · averager · brightness          │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  MessageBus (LightSense / LightSenseReady)                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::{Duration, Instant};

use anyhow::Result;
use log::{info, warn};

use matrixlight::adapters::hardware::MatrixHardware;
use matrixlight::adapters::nvs::NvsAdapter;
use matrixlight::app::ports::{ConfigPort, Event, EventBus};
use matrixlight::app::service::SensingService;
use matrixlight::config::SensorConfig;
use matrixlight::drivers::hw_timer::SettleTimer;
use matrixlight::events::MessageBus;
use matrixlight::pins::MatrixMap;
use matrixlight::sensors::LightSensor;

/// Shared between the main loop and anything else that raises light-sense
/// requests.
static BUS: MessageBus = MessageBus::new();

/// Display refresh period.
const FRAME_PERIOD: Duration = Duration::from_millis(20);

/// Frames between two stats lines (~10 s).
const STATS_EVERY_FRAMES: u32 = 500;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MatrixLight v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SensorConfig::default()
        }
    };
    let source = if nvs.has_stored_config() { "NVS" } else { "defaults" };
    info!("Config ({}): {:?}", source, config);

    // ── 3. Construct adapters and the sensor ──────────────────
    let hw = MatrixHardware::new(config.adc_resolution_bits);
    let timer = SettleTimer::new()?;
    let sense_every = u32::from(config.sense_every_frames);
    let sensor = LightSensor::new(hw, timer, Some(&BUS), MatrixMap::board(), config)?;
    let mut svc = SensingService::new(sensor, &BUS);

    info!("System ready. Entering display loop.");

    // ── 4. Display loop ───────────────────────────────────────
    let mut frame: u32 = 0;
    let mut seen_ready: u32 = 0;

    loop {
        let frame_start = Instant::now();
        frame = frame.wrapping_add(1);
        if frame % sense_every == 0 && !BUS.publish(Event::LightSense) {
            warn!("LightSense request had no listener");
        }

        svc.dispatch();

        // Convert as soon as the settle interval ends, not on the next frame.
        while svc.sensor().is_busy() {
            let left = FRAME_PERIOD.saturating_sub(frame_start.elapsed());
            if left.is_zero() {
                break;
            }
            if let Some(token) = svc.sensor().timer().wait_expired(left) {
                svc.on_timer(token);
            }
        }

        if svc.ready_events() != seen_ready {
            seen_ready = svc.ready_events();
            if let Some(level) = svc.last_brightness() {
                info!("Ambient brightness: {}/255", level);
            }
        }

        if frame % STATS_EVERY_FRAMES == 0 {
            let s = svc.sensor().stats();
            info!(
                "Sensor stats: conv={} valid={} invalid={} busy={} stale={} forced={} dropped={}",
                s.conversions,
                s.valid_rounds,
                s.invalid_rounds,
                s.rejected_triggers,
                s.stale_callbacks,
                s.forced_releases,
                BUS.dropped()
            );
        }

        std::thread::sleep(FRAME_PERIOD.saturating_sub(frame_start.elapsed()));
    }
}
