//! Epoch-time helpers shared by the engine and the cache layer.

use chrono::DateTime;

/// Quantisation applied to `starttime` before comparison (hundredths of a second).
pub const STARTTIME_PRECISION: f64 = 100.0;

/// Quantisation applied to `delta` before comparison.
pub const DELTA_PRECISION: f64 = 100.0;

/// Truncate toward zero at `1/precision` resolution.
pub fn truncate_to(value: f64, precision: f64) -> f64 {
    (value * precision).trunc() / precision
}

/// Render epoch seconds as an ISO-8601 UTC timestamp.
///
/// Fractional seconds are written with microsecond resolution, and only
/// when non-zero: `2016-12-15T00:18:12` or `2016-12-15T00:18:12.500000`.
pub fn iso_timestamp(epoch: f64) -> String {
    format_micros((epoch * 1_000_000.0).round() as i64)
}

/// Time signature used in cache paths: start time truncated to hundredths.
pub fn time_signature(epoch: f64) -> String {
    let centis = (epoch * STARTTIME_PRECISION).trunc() as i64;
    format_micros(centis * 10_000)
}

fn format_micros(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let sub = micros.rem_euclid(1_000_000);

    match DateTime::from_timestamp(secs, (sub * 1_000) as u32) {
        Some(dt) => {
            let base = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
            if sub == 0 {
                base
            } else {
                format!("{}.{:06}", base, sub)
            }
        }
        None => format!("{}", micros as f64 / 1_000_000.0),
    }
}
