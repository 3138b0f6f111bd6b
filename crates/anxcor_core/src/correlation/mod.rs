//! Cross-correlation engine.
//!
//! Correlates every channel of a source window against every channel of a
//! receiver window through the frequency domain:
//!
//! ```text
//! xcorr(src, rec)[k] = irfft(conj(rfft(src)) * rfft(rec))[k] / (2N - 1)
//! ```
//!
//! The output is laid out `src_chan × rec_chan × pair × time`, with the
//! time axis holding lags in seconds centred on zero.

use ndarray::{ArrayD, Axis as NdAxis, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::filters::spectral::{irfft, next_fast_len, rfft};
use crate::models::{
    iso_timestamp, truncate_to, ArrayError, Attributes, Axis, LabeledArray, CHANNEL_AXIS, DELTA_PRECISION, PAIR_AXIS,
    REC_CHAN_AXIS, SRC_CHAN_AXIS, STARTTIME_PRECISION, STATION_AXIS, TIME_AXIS,
};

/// Errors from the correlation engine.
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    /// Windows cannot be correlated and strict mode is on.
    #[error("Will not correlate {source_station} with {receiver_station} at {window}: {reason}")]
    Misaligned {
        source_station: String,
        receiver_station: String,
        window: String,
        reason: String,
    },

    #[error("Maximum lag must be a non-negative number of seconds, got {0}")]
    InvalidMaxTau(f64),

    #[error("Cannot correlate: {0}")]
    Shape(String),

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Result type for correlation.
pub type CorrelationResult<T> = Result<T, CorrelationError>;

/// Per-task correlation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    /// Keep only lags within `±max_tau_shift` seconds.
    pub max_tau_shift: Option<f64>,
    /// Always take the placeholder path.
    pub dummy: bool,
    /// Fail on misaligned windows instead of degrading to the placeholder.
    pub strict: bool,
}

/// Why two windows are not correlatable.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentMismatch(pub String);

/// Check the preconditions for a real correlation.
///
/// Sampling intervals and start times must agree after truncation to
/// hundredths, and the time axes must have equal length.
pub fn check_alignment(source: &LabeledArray, receiver: &LabeledArray) -> CorrelationResult<Option<AlignmentMismatch>> {
    let (src_delta, rec_delta) = (source.delta()?, receiver.delta()?);
    if truncate_to(src_delta, DELTA_PRECISION) != truncate_to(rec_delta, DELTA_PRECISION) {
        return Ok(Some(AlignmentMismatch(format!(
            "sampling intervals differ ({} vs {})",
            src_delta, rec_delta
        ))));
    }

    let (src_start, rec_start) = (source.starttime()?, receiver.starttime()?);
    if truncate_to(src_start, STARTTIME_PRECISION) != truncate_to(rec_start, STARTTIME_PRECISION) {
        return Ok(Some(AlignmentMismatch(format!(
            "start times differ ({} vs {})",
            src_start, rec_start
        ))));
    }

    if source.samples() != receiver.samples() {
        return Ok(Some(AlignmentMismatch(format!(
            "window lengths differ ({} vs {})",
            source.samples(),
            receiver.samples()
        ))));
    }
    Ok(None)
}

/// Cross-correlate two single-station windows.
pub fn cross_correlate(
    source: &LabeledArray,
    receiver: &LabeledArray,
    params: &CorrelationParams,
) -> CorrelationResult<LabeledArray> {
    if let Some(tau) = params.max_tau_shift {
        if !(tau.is_finite() && tau >= 0.0) {
            return Err(CorrelationError::InvalidMaxTau(tau));
        }
    }

    let delta = source.delta()?;
    let starttime = source.starttime()?;
    let src_station = source.first_label(STATION_AXIS)?;
    let rec_station = receiver.first_label(STATION_AXIS)?;
    let src_channels = source.labels(CHANNEL_AXIS)?.to_vec();
    let rec_channels = receiver.labels(CHANNEL_AXIS)?.to_vec();

    let mut dummy = params.dummy;
    if let Some(AlignmentMismatch(reason)) = check_alignment(source, receiver)? {
        if params.strict {
            return Err(CorrelationError::Misaligned {
                source_station: src_station.to_string(),
                receiver_station: rec_station.to_string(),
                window: iso_timestamp(starttime),
                reason,
            });
        }
        tracing::warn!(
            "Will not correlate windows: src {} rec {} window {} ({}); using placeholder",
            src_station,
            rec_station,
            iso_timestamp(starttime),
            reason
        );
        dummy = true;
    }

    let src_rows = rows(source, src_channels.len())?;
    let rec_rows = rows(receiver, rec_channels.len())?;
    let n = source.samples();
    if n == 0 {
        return Err(CorrelationError::Shape("source window is empty".to_string()));
    }

    let full = if dummy {
        dummy_correlate(&src_rows, &rec_rows, n)
    } else {
        correlate_rows(&src_rows, &rec_rows, n)
    };

    let corr_len = 2 * n - 1;
    let (start, len) = match params.max_tau_shift {
        Some(tau) => {
            let mut k = (tau / delta).floor() as usize;
            if k > n - 1 {
                tracing::warn!(
                    "Maximum lag {} s exceeds window length; clamping to {} samples",
                    tau,
                    n - 1
                );
                k = n - 1;
            }
            (n - 1 - k, 2 * k + 1)
        }
        None => (0, corr_len),
    };

    let mut flat = Vec::with_capacity(src_rows.len() * rec_rows.len() * len);
    for row in &full {
        flat.extend_from_slice(&row[start..start + len]);
    }
    let data = ArrayD::from_shape_vec(IxDyn(&[src_rows.len(), rec_rows.len(), 1, len]), flat)
        .map_err(|e| ArrayError::Shape(e.to_string()))?;

    let pair = format!("src:{}rec:{}", src_station, rec_station);
    let axes = vec![
        Axis::labels(SRC_CHAN_AXIS, src_channels),
        Axis::labels(REC_CHAN_AXIS, rec_channels),
        Axis::labels(PAIR_AXIS, [pair.clone()]),
        Axis::values(TIME_AXIS, lag_axis(len, delta)),
    ];

    let mut attrs: Attributes = source.attrs.clone();
    attrs.merge(&receiver.attrs);
    Ok(LabeledArray::new(pair, data, axes)?.with_attrs(attrs))
}

/// Lag coordinates for `len` samples: `(i - (len - 1) / 2) * delta`.
pub fn lag_axis(len: usize, delta: f64) -> Vec<f64> {
    let center = (len as f64 - 1.0) / 2.0;
    (0..len).map(|i| (i as f64 - center) * delta).collect()
}

// One row per channel; every leading axis other than channel must be
// singleton.
fn rows(array: &LabeledArray, channels: usize) -> CorrelationResult<Vec<Vec<f64>>> {
    let ndim = array.ndim();
    let rows: Vec<Vec<f64>> = array
        .data()
        .lanes(NdAxis(ndim - 1))
        .into_iter()
        .map(|lane| lane.to_vec())
        .collect();
    if rows.len() != channels {
        return Err(CorrelationError::Shape(format!(
            "'{}' has {} traces for {} channels",
            array.name(),
            rows.len(),
            channels
        )));
    }
    Ok(rows)
}

/// Full `2n - 1` lag correlation for every (src, rec) row pair, lag zero at
/// index `n - 1`.
fn correlate_rows(src: &[Vec<f64>], rec: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    let corr_len = 2 * n - 1;
    let nfft = next_fast_len(corr_len);
    let scale = 1.0 / corr_len as f64;

    let src_spectra: Vec<Vec<Complex64>> = src
        .iter()
        .map(|row| rfft(row, nfft).into_iter().map(|c| c.conj()).collect())
        .collect();
    let rec_spectra: Vec<Vec<Complex64>> = rec.iter().map(|row| rfft(row, nfft)).collect();

    let mut out = Vec::with_capacity(src.len() * rec.len());
    for s in &src_spectra {
        for r in &rec_spectra {
            let product: Vec<Complex64> = s.iter().zip(r).map(|(a, b)| a * b).collect();
            let circular = irfft(&product, nfft);
            // negative lags wrap to the end of the circular result
            let centered = (0..corr_len)
                .map(|j| {
                    let idx = if j + 1 < n { nfft + j + 1 - n } else { j + 1 - n };
                    circular[idx] * scale
                })
                .collect();
            out.push(centered);
        }
    }
    out
}

/// Placeholder result: elementwise products centred in a zero buffer of the
/// real path's length.
fn dummy_correlate(src: &[Vec<f64>], rec: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    let corr_len = 2 * n - 1;
    let mut out = Vec::with_capacity(src.len() * rec.len());
    for s in src {
        for r in rec {
            let mut row = vec![0.0; corr_len];
            let m = s.len().min(r.len());
            let offset = (corr_len - m) / 2;
            for i in 0..m {
                row[offset + i] = s[i] * r[i];
            }
            out.push(row);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(station: &str, traces: Vec<Vec<f64>>, starttime: f64, delta: f64) -> LabeledArray {
        let channels: Vec<String> = (0..traces.len()).map(|i| format!("C{}", i)).collect();
        let refs: Vec<&str> = channels.iter().map(String::as_str).collect();
        LabeledArray::window(station, &refs, traces, starttime, delta).unwrap()
    }

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    fn peak_index(values: &[f64]) -> usize {
        (0..values.len())
            .max_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap()
    }

    #[test]
    fn identical_windows_peak_at_zero_lag() {
        let trace: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin() + 0.2).collect();
        let a = window("A", vec![trace.clone()], 1000.0, 0.01);
        let b = window("B", vec![trace], 1000.0, 0.01);

        let xcorr = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        assert_eq!(xcorr.shape(), &[1, 1, 1, 199]);

        let lane: Vec<f64> = xcorr.data().iter().copied().collect();
        assert_eq!(peak_index(&lane), 99);
        assert_eq!(xcorr.coord_values(TIME_AXIS).unwrap()[99], 0.0);
        assert_eq!(xcorr.first_label(PAIR_AXIS).unwrap(), "src:Arec:B");
    }

    #[test]
    fn matches_direct_correlation() {
        let src = noise(37, 1);
        let rec = noise(37, 2);
        let a = window("A", vec![src.clone()], 0.0, 0.1);
        let b = window("B", vec![rec.clone()], 0.0, 0.1);
        let xcorr = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        let lane: Vec<f64> = xcorr.data().iter().copied().collect();

        let n = 37i64;
        for (j, value) in lane.iter().enumerate() {
            let lag = j as i64 - (n - 1);
            let direct: f64 = (0..n)
                .filter(|&i| i + lag >= 0 && i + lag < n)
                .map(|i| src[i as usize] * rec[(i + lag) as usize])
                .sum::<f64>()
                / (2 * n - 1) as f64;
            assert!((value - direct).abs() < 1e-12, "lag {}: {} vs {}", lag, value, direct);
        }
    }

    #[test]
    fn autocorrelation_is_symmetric() {
        let a = window("A", vec![noise(64, 7), noise(64, 8)], 0.0, 0.05);
        let xcorr = cross_correlate(&a, &a, &CorrelationParams::default()).unwrap();
        assert_eq!(xcorr.shape(), &[2, 2, 1, 127]);

        for s in 0..2 {
            let lane: Vec<f64> = xcorr.data().slice(ndarray::s![s, s, 0, ..]).iter().copied().collect();
            for k in 0..64 {
                assert!((lane[63 - k] - lane[63 + k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn max_tau_limits_lags() {
        let a = window("A", vec![noise(40, 3)], 0.0, 0.25);
        let b = window("B", vec![noise(40, 4)], 0.0, 0.25);
        let full = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        let params = CorrelationParams {
            max_tau_shift: Some(1.0),
            ..Default::default()
        };
        let cut = cross_correlate(&a, &b, &params).unwrap();

        assert_eq!(cut.samples(), 9);
        let lags = cut.coord_values(TIME_AXIS).unwrap();
        assert_eq!(lags.first(), Some(&-1.0));
        assert_eq!(lags.last(), Some(&1.0));

        let full_lane: Vec<f64> = full.data().iter().copied().collect();
        let cut_lane: Vec<f64> = cut.data().iter().copied().collect();
        assert_eq!(&full_lane[35..44], &cut_lane[..]);
    }

    #[test]
    fn oversized_max_tau_is_clamped() {
        let a = window("A", vec![noise(10, 3)], 0.0, 1.0);
        let params = CorrelationParams {
            max_tau_shift: Some(100.0),
            ..Default::default()
        };
        let xcorr = cross_correlate(&a, &a, &params).unwrap();
        assert_eq!(xcorr.samples(), 19);
    }

    #[test]
    fn start_times_within_precision_correlate() {
        let trace = noise(20, 5);
        let a = window("A", vec![trace.clone()], 100.001, 0.1);
        let b = window("B", vec![trace.clone()], 100.004, 0.1);
        let params = CorrelationParams {
            strict: true,
            ..Default::default()
        };
        assert!(cross_correlate(&a, &b, &params).is_ok());
    }

    #[test]
    fn sampling_intervals_within_precision_correlate() {
        let trace = noise(20, 9);
        let a = window("A", vec![trace.clone()], 100.0, 0.0101);
        let b = window("B", vec![trace], 100.0, 0.0109);

        assert_eq!(check_alignment(&a, &b).unwrap(), None);
        let params = CorrelationParams {
            strict: true,
            ..Default::default()
        };
        let xcorr = cross_correlate(&a, &b, &params).unwrap();
        let lane: Vec<f64> = xcorr.data().iter().copied().collect();
        assert_eq!(peak_index(&lane), 19);
    }

    #[test]
    fn differing_sampling_intervals_degrade_to_placeholder() {
        let a = window("A", vec![vec![1.0, 2.0, 3.0]], 100.0, 0.01);
        let b = window("B", vec![vec![4.0, 5.0, 6.0]], 100.0, 0.02);

        assert!(check_alignment(&a, &b).unwrap().is_some());
        let xcorr = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        let lane: Vec<f64> = xcorr.data().iter().copied().collect();
        assert_eq!(lane, vec![0.0, 4.0, 10.0, 18.0, 0.0]);
    }

    #[test]
    fn unequal_window_lengths_degrade_or_fail_when_strict() {
        let a = window("A", vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]], 100.0, 0.1);
        let b = window("B", vec![vec![2.0, 2.0, 2.0]], 100.0, 0.1);

        let xcorr = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        assert_eq!(xcorr.shape(), &[1, 1, 1, 9]);
        let lane: Vec<f64> = xcorr.data().iter().copied().collect();
        assert_eq!(lane, vec![0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 0.0, 0.0, 0.0]);

        let strict = CorrelationParams {
            strict: true,
            ..Default::default()
        };
        match cross_correlate(&a, &b, &strict) {
            Err(CorrelationError::Misaligned { reason, .. }) => assert!(reason.contains("lengths")),
            other => panic!("expected Misaligned, got {:?}", other),
        }
    }

    #[test]
    fn misaligned_windows_degrade_to_placeholder() {
        crate::logging::init_test_tracing();
        let a = window("A", vec![vec![1.0, 2.0, 3.0]], 100.0, 0.1);
        let b = window("B", vec![vec![4.0, 5.0, 6.0]], 100.02, 0.1);

        let xcorr = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        let lane: Vec<f64> = xcorr.data().iter().copied().collect();
        assert_eq!(lane, vec![0.0, 4.0, 10.0, 18.0, 0.0]);

        let strict = CorrelationParams {
            strict: true,
            ..Default::default()
        };
        assert!(matches!(
            cross_correlate(&a, &b, &strict),
            Err(CorrelationError::Misaligned { .. })
        ));
    }

    #[test]
    fn dummy_flag_keeps_real_shape() {
        let a = window("A", vec![noise(16, 1), noise(16, 2)], 0.0, 0.1);
        let b = window("B", vec![noise(16, 3)], 0.0, 0.1);
        let params = CorrelationParams {
            dummy: true,
            ..Default::default()
        };
        let placeholder = cross_correlate(&a, &b, &params).unwrap();
        let real = cross_correlate(&a, &b, &CorrelationParams::default()).unwrap();
        assert_eq!(placeholder.shape(), real.shape());
        assert_eq!(placeholder.axes(), real.axes());
    }

    #[test]
    fn missing_delta_is_fatal() {
        let mut a = window("A", vec![vec![1.0; 4]], 0.0, 0.1);
        a.attrs.remove(crate::models::DELTA);
        let b = window("B", vec![vec![1.0; 4]], 0.0, 0.1);
        assert!(matches!(
            cross_correlate(&a, &b, &CorrelationParams::default()),
            Err(CorrelationError::Array(ArrayError::MissingAttribute(_)))
        ));
    }

    #[test]
    fn lag_axis_is_antisymmetric() {
        let lags = lag_axis(5, 0.5);
        assert_eq!(lags, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }
}
