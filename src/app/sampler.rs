//! Sensor sampler: one pass over the physical channels.
//!
//! A climate fault never aborts the pass; the sample simply carries no
//! climate values. Motion and soil reads cannot fail.

use log::{debug, warn};

use crate::error::SensorError;
use crate::reading::RawSample;

use super::ports::SensorPort;

pub struct SensorSampler<S: SensorPort> {
    sensors: S,
    last_fault: Option<SensorError>,
}

impl<S: SensorPort> SensorSampler<S> {
    pub fn new(sensors: S) -> Self {
        Self {
            sensors,
            last_fault: None,
        }
    }

    /// Read every channel once. Blocks for as long as the climate driver's
    /// own bus timeout at most.
    pub fn sample(&mut self) -> RawSample {
        let climate = match self.sensors.read_climate() {
            Ok(c) => {
                self.last_fault = None;
                Some(c)
            }
            Err(e) => {
                warn!("Sampler: climate read failed: {}", e);
                self.last_fault = Some(e);
                None
            }
        };
        let motion = self.sensors.read_motion();
        let soil_raw = self.sensors.read_soil_raw();

        let sample = RawSample {
            climate,
            motion,
            soil_raw,
        };
        debug!("Sampler: {:?}", sample);
        sample
    }

    /// Fault from the most recent pass, if the climate read failed.
    pub fn last_fault(&self) -> Option<SensorError> {
        self.last_fault
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}
