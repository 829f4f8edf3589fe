//! Capacitive soil-moisture probe on ADC1.
//!
//! The probe's output falls as moisture rises; mapping to a percentage
//! against the dry/wet calibration happens in [`crate::mapping`]. This
//! driver only returns the raw count, clamped to the converter's range.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: oneshot ADC1 read via hw_init helpers.
//! On host/test: returns a simulated count (mid-range by default).

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

#[cfg(not(target_os = "espidf"))]
static SIM_SOIL_RAW: AtomicU16 = AtomicU16::new(2100);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_soil_raw(raw: u16) {
    SIM_SOIL_RAW.store(raw, Ordering::Relaxed);
}

pub struct SoilSensor {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    channel: u32,
    max_count: u16,
}

impl SoilSensor {
    /// `channel` must come from `hw_init::soil_channel`.
    pub fn new(channel: u32, resolution_bits: u8) -> Self {
        let bits = u32::from(resolution_bits.clamp(1, 16));
        let max_count = ((1u32 << bits) - 1) as u16;
        Self { channel, max_count }
    }

    pub fn read_raw(&mut self) -> u16 {
        self.read_adc().min(self.max_count)
    }

    pub fn max_count(&self) -> u16 {
        self.max_count
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(self.channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_SOIL_RAW.load(Ordering::Relaxed)
    }
}
