//! HC-SR501 passive-infrared motion detector.
//!
//! Digital output, HIGH while motion is detected (retrigger mode). The
//! input is configured once by `hw_init`.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the GPIO level via hw_init helpers.
//! On host/test: reads a simulated level, idle by default.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

#[cfg(not(target_os = "espidf"))]
static SIM_MOTION: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_motion(detected: bool) {
    SIM_MOTION.store(detected, Ordering::Relaxed);
}

pub struct MotionSensor {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    gpio: i32,
    last: bool,
}

impl MotionSensor {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, last: false }
    }

    pub fn read(&mut self) -> bool {
        let level = self.read_level();
        if level != self.last {
            log::debug!("Motion: {}", if level { "detected" } else { "clear" });
        }
        self.last = level;
        level
    }

    #[cfg(target_os = "espidf")]
    fn read_level(&self) -> bool {
        hw_init::gpio_read(self.gpio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_level(&self) -> bool {
        SIM_MOTION.load(Ordering::Relaxed)
    }

    /// Level seen by the most recent read.
    pub fn last(&self) -> bool {
        self.last
    }
}
