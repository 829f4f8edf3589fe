//! Hardware adapter: bridges real peripherals to the [`SensorPort`] trait.
//!
//! Owns the [`SensorHub`]. This is the only module in the system that
//! touches sensor hardware. On non-espidf targets the underlying drivers
//! use cfg-gated simulation stubs.

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::reading::ClimateSample;
use crate::sensors::SensorHub;

pub struct HardwareAdapter {
    sensor_hub: SensorHub,
}

impl HardwareAdapter {
    pub fn new(sensor_hub: SensorHub) -> Self {
        Self { sensor_hub }
    }

    pub fn hub_mut(&mut self) -> &mut SensorHub {
        &mut self.sensor_hub
    }
}

impl SensorPort for HardwareAdapter {
    fn read_climate(&mut self) -> Result<ClimateSample, SensorError> {
        self.sensor_hub.read_climate()
    }

    fn read_motion(&mut self) -> bool {
        self.sensor_hub.read_motion()
    }

    fn read_soil_raw(&mut self) -> u16 {
        self.sensor_hub.read_soil_raw()
    }
}
