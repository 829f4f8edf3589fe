//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver. Peripheral ownership is settled in
//! `main`, which builds the drivers and hands them over.

pub mod climate;
pub mod motion;
pub mod soil;

use climate::ClimateSensor;
use motion::MotionSensor;
use soil::SoilSensor;

use crate::error::SensorError;
use crate::reading::ClimateSample;

/// Aggregates all sensor drivers.
pub struct SensorHub {
    pub climate: ClimateSensor,
    pub motion: MotionSensor,
    pub soil: SoilSensor,
}

impl SensorHub {
    pub fn new(climate: ClimateSensor, motion: MotionSensor, soil: SoilSensor) -> Self {
        Self {
            climate,
            motion,
            soil,
        }
    }

    pub fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.climate.read()
    }

    pub fn read_motion(&mut self) -> bool {
        self.motion.read()
    }

    pub fn read_soil_raw(&mut self) -> u16 {
        self.soil.read_raw()
    }
}
