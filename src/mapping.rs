//! Raw sample → physical unit conversion.
//!
//! Pure functions, no state and no failure mode.

/// Clamp `v` into `[lo, hi]`. NaN maps to `lo`.
pub fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() || v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Convert a raw soil ADC count to a moisture percentage.
///
/// Capacitive probes read *lower* when wetter, so `dry_reference` is the
/// count in air and `wet_reference` the count in water. The result is a
/// linear interpolation between the two, clamped to `0.0..=100.0`.
///
/// When `dry_reference == wet_reference` the calibration is degenerate and
/// the result is `0.0` for every input.
pub fn soil_fraction(raw_adc: i32, dry_reference: i32, wet_reference: i32) -> f32 {
    if dry_reference == wet_reference {
        return 0.0;
    }
    let span = (dry_reference - wet_reference) as f32;
    let pct = (dry_reference - raw_adc) as f32 / span * 100.0;
    clamp(pct, 0.0, 100.0)
}
