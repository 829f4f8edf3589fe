//! Fuzz target: `climate::decode_frame`
//!
//! Any 5-byte frame either fails the checksum or decodes to finite values
//! inside the sensor's representable range.
//!
//! cargo fuzz run fuzz_climate_frame

#![no_main]

use envnode::sensors::climate::decode_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|frame: [u8; 5]| {
    if let Ok(s) = decode_frame(&frame) {
        assert!(s.temperature_c.is_finite());
        assert!(s.temperature_c.abs() <= 3276.7);
        assert!((0.0..=6553.5).contains(&s.humidity_pct));
    }
});
