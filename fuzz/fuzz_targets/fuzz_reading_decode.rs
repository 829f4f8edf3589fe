//! Fuzz target: `Reading::decode`
//!
//! Feeds arbitrary bytes to the wire decoder. Anything it accepts must
//! satisfy the reading invariants and survive a re-encode.
//!
//! cargo fuzz run fuzz_reading_decode

#![no_main]

use envnode::reading::Reading;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(reading) = Reading::decode(data) else {
        return;
    };

    assert_eq!(reading.temperature_c().is_some(), reading.humidity_pct().is_some());
    assert!((0.0..=100.0).contains(&reading.soil_moisture_pct()));

    let bytes = reading.encode().expect("accepted reading must re-encode");
    // Out-of-range numbers parse as infinity and re-encode as null.
    let finite = reading.climate().is_none_or(|c| c.temperature_c.is_finite() && c.humidity_pct.is_finite());
    if !finite {
        return;
    }
    let again = Reading::decode(&bytes).expect("re-encoded reading must decode");
    assert_eq!(again.node_id(), reading.node_id());
    assert_eq!(again.motion(), reading.motion());
});
