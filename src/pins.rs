//! Default GPIO / peripheral pin assignments for the EnvNode board
//! (ESP32-WROOM-32 devkit).
//!
//! These seed [`PinAssignment`](crate::config::PinAssignment); drivers take
//! their pins from the configuration, never from here directly.

// ---------------------------------------------------------------------------
// Climate (DHT22 / AM2302, single-wire, open-drain with pull-up)
// ---------------------------------------------------------------------------

pub const DHT22_DATA_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Motion (HC-SR501 PIR, push-pull output, HIGH = motion)
// ---------------------------------------------------------------------------

pub const PIR_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// Soil moisture (capacitive probe v1.2, analog)
// ---------------------------------------------------------------------------

/// ADC1 channel 6 on the ESP32. ADC2 is unusable while WiFi is active.
pub const SOIL_ADC_GPIO: i32 = 34;
/// ADC sample width in bits.
pub const SOIL_ADC_BITS: u8 = 12;

/// Map an ESP32 GPIO number to its ADC1 channel, if it has one.
pub const fn adc1_channel(gpio: i32) -> Option<u32> {
    match gpio {
        36 => Some(0),
        37 => Some(1),
        38 => Some(2),
        39 => Some(3),
        32 => Some(4),
        33 => Some(5),
        34 => Some(6),
        35 => Some(7),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soil_pin_is_on_adc1() {
        assert_eq!(adc1_channel(SOIL_ADC_GPIO), Some(6));
    }

    #[test]
    fn non_adc_pin_has_no_channel() {
        assert_eq!(adc1_channel(PIR_GPIO), None);
    }
}
