//! Node configuration.
//!
//! All tunable parameters for the EnvNode, gathered in one immutable
//! structure that is built once at startup and handed to the scheduler.
//! Values are fixed at build time: defaults below, optionally overridden by
//! `ENVNODE_*` environment variables captured during compilation.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pins;

/// WiFi station credentials and association bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ssid: String<32>,
    pub password: String<64>,
    /// Upper bound for one blocking association attempt (milliseconds).
    pub associate_timeout_ms: u32,
    /// Status poll period while associating (milliseconds).
    pub associate_poll_ms: u32,
}

/// Broker address, optional credentials and session retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String<64>,
    pub port: u16,
    /// Empty = anonymous.
    pub username: String<32>,
    pub password: String<64>,
    pub keep_alive_secs: u16,
    /// Upper bound for a single connect handshake (milliseconds).
    pub connect_timeout_ms: u32,
    /// Session attempts per scheduler tick.
    pub connect_attempts: u8,
    /// Delay between session attempts (milliseconds).
    pub retry_delay_ms: u32,
}

/// Soil probe calibration: raw counts in air and in water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilCalibration {
    pub dry_raw: u16,
    pub wet_raw: u16,
}

/// Sensor pin / channel assignments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PinAssignment {
    pub climate_gpio: i32,
    pub motion_gpio: i32,
    pub soil_adc_gpio: i32,
    /// ADC sample width in bits (9-12 on the ESP32).
    pub adc_resolution_bits: u8,
}

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Identity ---
    pub node_id: String<32>,
    pub firmware_version: String<32>,

    // --- Connectivity ---
    pub network: NetworkConfig,
    pub broker: BrokerConfig,

    // --- Topics ---
    /// Reading topic; presence and command topics hang off it.
    pub base_topic: String<96>,
    /// Subscribe to `<base>/cmd` after each session establishment.
    pub subscribe_commands: bool,

    // --- Timing ---
    /// Publish interval (milliseconds).
    pub publish_interval_ms: u32,
    /// Yield at the end of each loop iteration (milliseconds).
    pub loop_delay_ms: u32,
    /// Task watchdog timeout (milliseconds).
    pub watchdog_timeout_ms: u32,

    // --- Sensors ---
    pub soil: SoilCalibration,
    pub pins: PinAssignment,
}

fn fixed<const N: usize>(value: &str) -> String<N> {
    let mut s = String::new();
    // Defaults are short literals; an oversize one leaves the field empty
    // and `validate()` reports it.
    if s.push_str(value).is_err() {
        s.clear();
    }
    s
}

fn bounded<const N: usize>(value: &str, field: &'static str) -> Result<String<N>, ConfigError> {
    let mut s = String::new();
    s.push_str(value).map_err(|_| ConfigError::TooLong(field))?;
    Ok(s)
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: fixed("esp32-envnode-01"),
            firmware_version: fixed("esp32-fw-0.1.0"),

            network: NetworkConfig {
                ssid: String::new(),
                password: String::new(),
                associate_timeout_ms: 20_000,
                associate_poll_ms: 250,
            },
            broker: BrokerConfig {
                host: fixed("192.168.0.100"),
                port: 1883,
                username: String::new(),
                password: String::new(),
                keep_alive_secs: 15,
                connect_timeout_ms: 5_000,
                connect_attempts: 3,
                retry_delay_ms: 1_000,
            },

            base_topic: fixed("iot/env/room1/reading"),
            subscribe_commands: false,

            publish_interval_ms: 2_000,
            loop_delay_ms: 10,
            watchdog_timeout_ms: 60_000,

            soil: SoilCalibration {
                dry_raw: 3000,
                wet_raw: 1200,
            },
            pins: PinAssignment {
                climate_gpio: pins::DHT22_DATA_GPIO,
                motion_gpio: pins::PIR_GPIO,
                soil_adc_gpio: pins::SOIL_ADC_GPIO,
                adc_resolution_bits: pins::SOIL_ADC_BITS,
            },
        }
    }
}

impl NodeConfig {
    /// Defaults overlaid with the `ENVNODE_*` variables present at build time.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| match key {
            "ENVNODE_WIFI_SSID" => option_env!("ENVNODE_WIFI_SSID"),
            "ENVNODE_WIFI_PASS" => option_env!("ENVNODE_WIFI_PASS"),
            "ENVNODE_MQTT_HOST" => option_env!("ENVNODE_MQTT_HOST"),
            "ENVNODE_MQTT_PORT" => option_env!("ENVNODE_MQTT_PORT"),
            "ENVNODE_MQTT_USER" => option_env!("ENVNODE_MQTT_USER"),
            "ENVNODE_MQTT_PASS" => option_env!("ENVNODE_MQTT_PASS"),
            "ENVNODE_BASE_TOPIC" => option_env!("ENVNODE_BASE_TOPIC"),
            "ENVNODE_NODE_ID" => option_env!("ENVNODE_NODE_ID"),
            _ => None,
        })
    }

    /// Apply overrides from `lookup`, keyed by `ENVNODE_*` variable name.
    pub fn with_overrides<'a>(
        mut self,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("ENVNODE_WIFI_SSID") {
            self.network.ssid = bounded(v, "wifi ssid")?;
        }
        if let Some(v) = lookup("ENVNODE_WIFI_PASS") {
            self.network.password = bounded(v, "wifi password")?;
        }
        if let Some(v) = lookup("ENVNODE_MQTT_HOST") {
            self.broker.host = bounded(v, "broker host")?;
        }
        if let Some(v) = lookup("ENVNODE_MQTT_PORT") {
            self.broker.port = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Unparsable("broker port"))?;
        }
        if let Some(v) = lookup("ENVNODE_MQTT_USER") {
            self.broker.username = bounded(v, "broker username")?;
        }
        if let Some(v) = lookup("ENVNODE_MQTT_PASS") {
            self.broker.password = bounded(v, "broker password")?;
        }
        if let Some(v) = lookup("ENVNODE_BASE_TOPIC") {
            self.base_topic = bounded(v, "base topic")?;
        }
        if let Some(v) = lookup("ENVNODE_NODE_ID") {
            self.node_id = bounded(v, "node id")?;
        }
        Ok(self)
    }

    /// Range-check every field. Degenerate soil calibration is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::ValidationFailed("node id must not be empty"));
        }
        if self.base_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("base topic must not be empty"));
        }
        if self.base_topic.contains(['+', '#']) {
            return Err(ConfigError::ValidationFailed("base topic must not contain wildcards"));
        }
        let ssid = self.network.ssid.as_str();
        if ssid.is_empty() || !is_printable_ascii(ssid) {
            return Err(ConfigError::ValidationFailed("SSID must be 1-32 printable ASCII bytes"));
        }
        let pass_len = self.network.password.len();
        if pass_len != 0 && !(8..=64).contains(&pass_len) {
            return Err(ConfigError::ValidationFailed("WiFi password must be empty or 8-64 bytes"));
        }
        if self.broker.host.is_empty() || self.broker.port == 0 {
            return Err(ConfigError::ValidationFailed("broker address incomplete"));
        }
        if self.broker.connect_attempts == 0 {
            return Err(ConfigError::ValidationFailed("connect attempts must be at least 1"));
        }
        if self.publish_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("publish interval must be positive"));
        }
        if self.network.associate_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("association poll period must be positive"));
        }
        if !(9..=12).contains(&self.pins.adc_resolution_bits) {
            return Err(ConfigError::ValidationFailed("ADC resolution must be 9-12 bits"));
        }
        Ok(())
    }
}
