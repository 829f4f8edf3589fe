//! WiFi station-mode adapter.
//!
//! Implements [`LinkDriver`], the hexagonal boundary for network
//! association. The adapter only starts attempts and reports status; the
//! bounded wait and the state machine live in
//! [`LinkManager`](crate::app::link::LinkManager).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::LinkDriver;
use crate::config::NetworkConfig;
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    configured: bool,
    /// Simulation: polls remaining until the pending attempt succeeds.
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
struct SimRadio {
    associated: core::cell::Cell<bool>,
    pending: core::cell::Cell<Option<u32>>,
    polls_to_associate: u32,
    reachable: bool,
    attempts: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>, network: &NetworkConfig) -> Result<Self, LinkError> {
        let mut adapter = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            wifi,
            configured: false,
        };
        adapter.set_credentials(&network.ssid, &network.password)?;
        Ok(adapter)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(network: &NetworkConfig) -> Result<Self, LinkError> {
        let mut adapter = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            sim: SimRadio {
                associated: core::cell::Cell::new(false),
                pending: core::cell::Cell::new(None),
                polls_to_associate: 2,
                reachable: true,
                attempts: 0,
            },
        };
        adapter.set_credentials(&network.ssid, &network.password)?;
        Ok(adapter)
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| LinkError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| LinkError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self) -> Result<(), LinkError> {
        if !self.configured {
            let auth_method = if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let conf = Configuration::Client(ClientConfiguration {
                ssid: self
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| LinkError::InvalidSsid)?,
                password: self
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| LinkError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            });
            self.wifi.set_configuration(&conf).map_err(|e| {
                warn!("WiFi: set_configuration failed: {}", e);
                LinkError::DriverRejected
            })?;
            self.wifi.start().map_err(|e| {
                warn!("WiFi: start failed: {}", e);
                LinkError::DriverRejected
            })?;
            self.configured = true;
        }
        // A stale attempt blocks a new one; ignore "not connected" here.
        let _ = self.wifi.disconnect();
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect request failed: {}", e);
            LinkError::DriverRejected
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self) -> Result<(), LinkError> {
        self.sim.attempts = self.sim.attempts.wrapping_add(1);
        self.sim.associated.set(false);
        self.sim
            .pending
            .set(self.sim.reachable.then_some(self.sim.polls_to_associate));
        info!("WiFi(sim): attempt {} to '{}'", self.sim.attempts, self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    /// Each status poll advances a pending simulated attempt by one step.
    #[cfg(not(target_os = "espidf"))]
    fn platform_is_associated(&self) -> bool {
        match self.sim.pending.get() {
            Some(0) => {
                self.sim.associated.set(true);
                self.sim.pending.set(None);
            }
            Some(n) => self.sim.pending.set(Some(n - 1)),
            None => {}
        }
        self.sim.associated.get()
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (rc == 0).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        if !self.sim.associated.get() {
            return None;
        }
        // Oscillate between -66 and -55 dBm with the attempt count.
        let oscillation = (self.sim.attempts % 12) as i8 - 6;
        Some((-60_i8).saturating_add(oscillation))
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation controls
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// Status polls an attempt needs before it succeeds.
    pub fn sim_set_association_delay(&mut self, polls: u32) {
        self.sim.polls_to_associate = polls;
    }

    /// Whether the AP answers at all.
    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
        if !reachable {
            self.sim.pending.set(None);
        }
    }

    /// Drop the current association, as if the AP vanished.
    pub fn sim_drop(&mut self) {
        self.sim.associated.set(false);
        self.sim.pending.set(None);
    }

    pub fn sim_attempts(&self) -> u32 {
        self.sim.attempts
    }
}

// ───────────────────────────────────────────────────────────────
// LinkDriver
// ───────────────────────────────────────────────────────────────

impl LinkDriver for WifiAdapter {
    fn is_associated(&self) -> bool {
        self.platform_is_associated()
    }

    fn begin_association(&mut self) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        self.platform_begin()
    }

    fn rssi_dbm(&self) -> Option<i8> {
        self.platform_rssi()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
