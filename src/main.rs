//! EnvNode firmware main entry point.
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   Esp32TimeAdapter             │
//! │  (SensorPort)      (EventSink)    (Clock)                      │
//! │  WifiAdapter       MqttAdapter                                 │
//! │  (LinkDriver)      (SessionTransport)                          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  LinkManager · SessionManager · SensorSampler          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  PublishScheduler (tick) · Watchdog                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use envnode::adapters::device_id;
use envnode::adapters::hardware::HardwareAdapter;
use envnode::adapters::log_sink::LogEventSink;
use envnode::adapters::mqtt::MqttAdapter;
use envnode::adapters::time::Esp32TimeAdapter;
use envnode::adapters::wifi::WifiAdapter;
use envnode::app::ports::Clock;
use envnode::config::NodeConfig;
use envnode::drivers::{hw_init, watchdog};
use envnode::error::Error;
use envnode::scheduler::PublishScheduler;
use envnode::sensors::SensorHub;
use envnode::sensors::climate::Dht22;
use envnode::sensors::motion::MotionSensor;
use envnode::sensors::soil::SoilSensor;

/// Park the task forever after an unrecoverable boot failure.
fn halt(reason: &str) -> ! {
    error!("{}: halting", reason);
    loop {
        FreeRtos::delay_ms(1_000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EnvNode v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = match NodeConfig::from_build_env() {
        Ok(c) => c,
        Err(e) => {
            warn!("Build-time overrides rejected ({}), using defaults", e);
            NodeConfig::default()
        }
    };
    let worst_tick = watchdog::worst_case_tick_ms(&config);
    if config.watchdog_timeout_ms <= worst_tick {
        warn!(
            "Watchdog timeout {} ms does not cover worst-case tick {} ms",
            config.watchdog_timeout_ms, worst_tick
        );
    }

    // ── 3. Hardware peripherals ───────────────────────────────
    let soil_channel = match hw_init::bring_up(&config) {
        Ok(channel) => channel,
        Err(e) => halt(&format!("Boot check failed: {}", e)),
    };

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // SAFETY: the climate GPIO is not claimed by any other driver; hw_init
    // only touches the motion and soil pins.
    let climate_pin = unsafe { AnyIOPin::new(config.pins.climate_gpio) };
    let climate = Dht22::new(PinDriver::input_output_od(climate_pin)?, Ets).map_err(Error::from)?;
    let hub = SensorHub::new(
        climate,
        MotionSensor::new(config.pins.motion_gpio),
        SoilSensor::new(soil_channel, config.pins.adc_resolution_bits),
    );

    // ── 4. Connectivity adapters ──────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let wifi = WifiAdapter::new(esp_wifi, &config.network).map_err(Error::from)?;
    let mqtt = MqttAdapter::new(&config.broker.host, config.broker.port);

    let mac = device_id::read_mac();
    let client_id = device_id::client_id(&config.node_id, &mac);
    info!("Node {} as client {}", config.node_id, client_id);

    // ── 5. Scheduler ──────────────────────────────────────────
    let mut scheduler = PublishScheduler::new(
        &config,
        &client_id,
        wifi,
        mqtt,
        HardwareAdapter::new(hub),
        Esp32TimeAdapter::new(),
    );
    let mut sink = LogEventSink::new();
    let wdt = watchdog::Watchdog::new(config.watchdog_timeout_ms);

    info!("Entering control loop");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        scheduler.tick(&mut sink);
        wdt.feed();
        scheduler.clock_mut().delay_ms(config.loop_delay_ms);
    }
}
