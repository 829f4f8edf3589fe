//! Reading snapshot and its JSON wire form.
//!
//! ```text
//! SensorSampler ──▶ RawSample ──▶ mapping ──▶ Reading ──▶ JSON bytes
//! ```
//!
//! A [`Reading`] is built once per publish cycle, encoded and dropped.
//! Temperature and humidity come from one sensor and are stored as a
//! single optional [`ClimateSample`], so one of them can never be present
//! without the other.

use serde::{Deserialize, Serialize};

use crate::config::SoilCalibration;
use crate::error::EncodeError;
use crate::mapping::soil_fraction;

/// Temperature / humidity pair from the combined climate sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// One pass over the physical channels, before any mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// `None` when the climate sensor faulted on this pass.
    pub climate: Option<ClimateSample>,
    pub motion: bool,
    pub soil_raw: u16,
}

/// Immutable sampled-and-mapped snapshot, ready for transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    node_id: String,
    climate: Option<ClimateSample>,
    soil_moisture_pct: f32,
    motion: bool,
    firmware_version: String,
    signal_strength_dbm: i32,
}

impl Reading {
    /// Map a raw sample into a reading. Soil moisture is clamped to 0-100%.
    pub fn from_sample(
        node_id: &str,
        firmware_version: &str,
        sample: &RawSample,
        calibration: &SoilCalibration,
        signal_strength_dbm: i32,
    ) -> Self {
        let soil = soil_fraction(
            i32::from(sample.soil_raw),
            i32::from(calibration.dry_raw),
            i32::from(calibration.wet_raw),
        );
        Self {
            node_id: node_id.into(),
            climate: sample.climate,
            soil_moisture_pct: soil,
            motion: sample.motion,
            firmware_version: firmware_version.into(),
            signal_strength_dbm,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn temperature_c(&self) -> Option<f32> {
        self.climate.map(|c| c.temperature_c)
    }

    pub fn humidity_pct(&self) -> Option<f32> {
        self.climate.map(|c| c.humidity_pct)
    }

    pub fn climate(&self) -> Option<ClimateSample> {
        self.climate
    }

    pub fn soil_moisture_pct(&self) -> f32 {
        self.soil_moisture_pct
    }

    pub fn motion(&self) -> bool {
        self.motion
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn signal_strength_dbm(&self) -> i32 {
        self.signal_strength_dbm
    }

    /// Serialise to the JSON wire schema. Climate keys are omitted on fault.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(&WireReading::from(self)).map_err(|_| EncodeError::Json)
    }

    /// Parse and validate a wire payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, EncodeError> {
        let wire: WireReading = serde_json::from_slice(bytes).map_err(|_| EncodeError::Json)?;
        Self::try_from(wire)
    }
}

// ───────────────────────────────────────────────────────────────
// Wire schema
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct WireReading {
    node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature_c: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    humidity_pct: Option<f32>,
    soil_moisture_pct: f32,
    motion: bool,
    firmware: String,
    rssi_dbm: i32,
}

impl From<&Reading> for WireReading {
    fn from(r: &Reading) -> Self {
        Self {
            node_id: r.node_id.clone(),
            temperature_c: r.temperature_c(),
            humidity_pct: r.humidity_pct(),
            soil_moisture_pct: r.soil_moisture_pct,
            motion: r.motion,
            firmware: r.firmware_version.clone(),
            rssi_dbm: r.signal_strength_dbm,
        }
    }
}

impl TryFrom<WireReading> for Reading {
    type Error = EncodeError;

    fn try_from(w: WireReading) -> Result<Self, Self::Error> {
        let climate = match (w.temperature_c, w.humidity_pct) {
            (Some(temperature_c), Some(humidity_pct)) => Some(ClimateSample {
                temperature_c,
                humidity_pct,
            }),
            (None, None) => None,
            _ => return Err(EncodeError::ClimateMismatch),
        };
        if !(0.0..=100.0).contains(&w.soil_moisture_pct) {
            return Err(EncodeError::SoilOutOfRange);
        }
        Ok(Self {
            node_id: w.node_id,
            climate,
            soil_moisture_pct: w.soil_moisture_pct,
            motion: w.motion,
            firmware_version: w.firmware,
            signal_strength_dbm: w.rssi_dbm,
        })
    }
}
