//! Conversion between time and frequency domain arrays.

use num_complex::Complex64;

use crate::models::array::{map_lanes, Axis, LabeledArray, FREQUENCY_AXIS};

use super::spectral::{irfft, next_fast_len, rfft, rfftfreq};
use super::{FilterError, FilterResult};

/// One-sided spectrum of every trace.
///
/// Traces are zero-padded to `next_fast_len(minimum_size)` (or of their own
/// length when no minimum is given); the last axis becomes `frequency` in Hz.
pub fn time_to_freq(array: &LabeledArray, minimum_size: Option<usize>) -> FilterResult<LabeledArray<Complex64>> {
    let delta = array.delta()?;
    let nfft = next_fast_len(minimum_size.unwrap_or(array.samples()));
    let bins = nfft / 2 + 1;

    let data = map_lanes(array.data(), bins, |lane| rfft(lane, nfft))?;
    let frequencies = rfftfreq(nfft, delta);
    Ok(array.with_last_axis(data, Axis::values(FREQUENCY_AXIS, frequencies))?)
}

/// Invert a spectrum back onto the time grid of `original`.
///
/// The inverse runs at the transform length the spectrum was taken at and
/// is then cut to `original.samples()`, dropping the zero padding.
pub fn freq_to_time(spectrum: &LabeledArray<Complex64>, original: &LabeledArray) -> FilterResult<LabeledArray> {
    check_leading(spectrum, original)?;
    let n = original.samples();
    let nfft = transform_len(spectrum)?;
    if nfft < n {
        return Err(FilterError::ShapeMismatch {
            left: spectrum.shape().to_vec(),
            right: original.shape().to_vec(),
        });
    }
    let data = map_lanes(spectrum.data(), n, |lane| {
        let mut time = irfft(lane, nfft);
        time.truncate(n);
        time
    })?;
    Ok(original.with_data(data)?)
}

/// Transform length behind a one-sided spectrum, recovered from the bin
/// spacing so odd lengths survive.
fn transform_len(spectrum: &LabeledArray<Complex64>) -> FilterResult<usize> {
    let bins = spectrum.samples();
    let freqs = spectrum.coord_values(FREQUENCY_AXIS)?;
    if bins < 2 || freqs.len() < 2 {
        return Ok(bins);
    }
    let delta = spectrum.delta()?;
    let nfft = (1.0 / (freqs[1] * delta)).round() as usize;
    // an n-point transform has n / 2 + 1 bins
    if nfft / 2 + 1 != bins {
        return Err(FilterError::ShapeMismatch {
            left: vec![bins],
            right: vec![nfft / 2 + 1],
        });
    }
    Ok(nfft)
}

/// Invert a cross-spectrum at its full even length `2 * (bins - 1)` and keep
/// the first `original.samples()` points.
pub fn freq_to_time_xcorr(spectrum: &LabeledArray<Complex64>, original: &LabeledArray) -> FilterResult<LabeledArray> {
    check_leading(spectrum, original)?;
    let n = original.samples();
    let full = 2 * spectrum.samples().saturating_sub(1);
    if full < n {
        return Err(FilterError::ShapeMismatch {
            left: spectrum.shape().to_vec(),
            right: original.shape().to_vec(),
        });
    }
    let data = map_lanes(spectrum.data(), n, |lane| {
        let mut time = irfft(lane, full);
        time.truncate(n);
        time
    })?;
    Ok(original.with_data(data)?)
}

fn check_leading(spectrum: &LabeledArray<Complex64>, original: &LabeledArray) -> FilterResult<()> {
    let (s, o) = (spectrum.shape(), original.shape());
    if s.len() != o.len() || s[..s.len().saturating_sub(1)] != o[..o.len().saturating_sub(1)] {
        return Err(FilterError::ShapeMismatch {
            left: s.to_vec(),
            right: o.to_vec(),
        });
    }
    Ok(())
}
