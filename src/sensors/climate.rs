//! DHT22 / AM2302 temperature and humidity sensor.
//!
//! Single-wire protocol, open-drain with an external pull-up:
//!
//! ```text
//!  host   ‾‾‾‾\____ ≥1 ms ____/‾‾ 20-40 µs ‾‾\
//!  sensor                                    \__ 80 µs __/‾‾ 80 µs ‾‾\
//!  bit                                        \__ 50 µs __/‾‾ 26 µs (0) / 70 µs (1) ‾‾\
//! ```
//!
//! 40 data bits: humidity ×10 (16 bit), temperature ×10 (16 bit, bit 15 =
//! sign), checksum = low byte of the sum of the first four bytes.
//!
//! ## Dual-target design
//!
//! The bit-banging driver [`Dht22`] is generic over `embedded-hal` 1.0 pins
//! and delays. On ESP-IDF it runs on a `PinDriver` in input-output mode.
//! On host/test the [`ClimateSensor`] is a simulation that decodes a frame
//! injected with [`sim_set_frame`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::SensorError;
use crate::reading::ClimateSample;

/// Start pulse the host holds the line low for.
const START_LOW_US: u32 = 1_100;
/// Upper bound for any single level on the wire.
const LEVEL_TIMEOUT_US: u32 = 100;

/// Decode a received frame. Fails on checksum mismatch.
pub fn decode_frame(frame: &[u8; 5]) -> Result<ClimateSample, SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let raw_humidity = u16::from_be_bytes([frame[0], frame[1]]);
    let raw_temp = u16::from_be_bytes([frame[2], frame[3]]);

    let mut temperature_c = f32::from(raw_temp & 0x7FFF) / 10.0;
    if raw_temp & 0x8000 != 0 {
        temperature_c = -temperature_c;
    }
    Ok(ClimateSample {
        temperature_c,
        humidity_pct: f32::from(raw_humidity) / 10.0,
    })
}

/// Build a valid frame for `sample`. Inverse of [`decode_frame`] to 0.1 resolution.
pub fn encode_frame(sample: ClimateSample) -> [u8; 5] {
    let humidity = (sample.humidity_pct * 10.0).round().clamp(0.0, f32::from(u16::MAX)) as u16;
    let magnitude = (sample.temperature_c.abs() * 10.0).round().min(f32::from(0x7FFF_u16)) as u16;
    let temp = if sample.temperature_c < 0.0 {
        magnitude | 0x8000
    } else {
        magnitude
    };
    let [h0, h1] = humidity.to_be_bytes();
    let [t0, t1] = temp.to_be_bytes();
    let sum = h0.wrapping_add(h1).wrapping_add(t0).wrapping_add(t1);
    [h0, h1, t0, t1, sum]
}

// ───────────────────────────────────────────────────────────────
// Bit-banging driver
// ───────────────────────────────────────────────────────────────

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Takes an open-drain pin; releases the line (idle high).
    pub fn new(mut pin: P, delay: D) -> Result<Self, SensorError> {
        pin.set_high().map_err(|_| SensorError::Gpio)?;
        Ok(Self { pin, delay })
    }

    /// One full transaction. Blocks for about 5 ms at most.
    pub fn read(&mut self) -> Result<ClimateSample, SensorError> {
        self.pin.set_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(START_LOW_US);
        self.pin.set_high().map_err(|_| SensorError::Gpio)?;

        // Released line, then the sensor's 80 µs low / 80 µs high response.
        self.level_len(true)?;
        self.level_len(false)?;
        self.level_len(true)?;

        let mut frame = [0u8; 5];
        for byte in frame.iter_mut() {
            for _ in 0..8 {
                let low = self.level_len(false)?;
                let high = self.level_len(true)?;
                // A "1" holds high longer than the 50 µs low preamble, a
                // "0" shorter. Comparing the two keeps this independent of
                // the delay's absolute accuracy.
                *byte = (*byte << 1) | u8::from(high > low);
            }
        }
        decode_frame(&frame)
    }

    /// How long (µs, approximately) the line stays at `high`.
    fn level_len(&mut self, high: bool) -> Result<u32, SensorError> {
        let mut elapsed = 0;
        while self.pin.is_high().map_err(|_| SensorError::Gpio)? == high {
            if elapsed >= LEVEL_TIMEOUT_US {
                return Err(SensorError::Timeout);
            }
            self.delay.delay_us(1);
            elapsed += 1;
        }
        Ok(elapsed)
    }
}

// ───────────────────────────────────────────────────────────────
// Platform sensor
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub type ClimateSensor = Dht22<
    esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::AnyIOPin, esp_idf_hal::gpio::InputOutput>,
    esp_idf_hal::delay::Ets,
>;

#[cfg(not(target_os = "espidf"))]
use std::sync::Mutex;

#[cfg(not(target_os = "espidf"))]
static SIM_FRAME: Mutex<Option<[u8; 5]>> = Mutex::new(Some([0x01, 0x9A, 0x00, 0xE1, 0x7C]));

/// Frame the simulated sensor returns next; `None` simulates a timeout.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_frame(frame: Option<[u8; 5]>) {
    if let Ok(mut f) = SIM_FRAME.lock() {
        *f = frame;
    }
}

/// Host stand-in for the DHT22.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct ClimateSensor;

#[cfg(not(target_os = "espidf"))]
impl ClimateSensor {
    pub fn read(&mut self) -> Result<ClimateSample, SensorError> {
        let frame = SIM_FRAME.lock().map_err(|_| SensorError::Gpio)?;
        match *frame {
            Some(f) => decode_frame(&f),
            None => Err(SensorError::Timeout),
        }
    }
}
