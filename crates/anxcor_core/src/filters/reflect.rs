//! Reflection padding and centre extraction.

use crate::models::array::{map_lanes, Axis, LabeledArray, TIME_AXIS};
use crate::models::attributes::STARTTIME;

use super::{FilterError, FilterResult};

/// Pad both ends with mirrored copies of the first and last
/// `floor(fraction * len)` samples.
pub fn reflect_pad(samples: &[f64], fraction: f64) -> FilterResult<Vec<f64>> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(FilterError::InvalidPadFraction(fraction));
    }
    let n = samples.len();
    let slice = ((fraction * n as f64) as usize).min(n);

    let mut out = Vec::with_capacity(n + 2 * slice);
    out.extend(samples[..slice].iter().rev());
    out.extend_from_slice(samples);
    out.extend(samples[n - slice..].iter().rev());
    Ok(out)
}

/// Central `original_len` samples of a symmetrically padded trace.
pub fn center_slice(padded: &[f64], original_len: usize) -> FilterResult<Vec<f64>> {
    if original_len > padded.len() {
        return Err(FilterError::ShapeMismatch {
            left: vec![padded.len()],
            right: vec![original_len],
        });
    }
    let pad = (padded.len() - original_len) / 2;
    Ok(padded[pad..pad + original_len].to_vec())
}

/// Extend every trace to `3n - 2` samples by mirroring about both edges.
///
/// The edge samples are not repeated, so the time axis stays evenly spaced
/// at `delta` and starts `(n - 1) * delta` earlier.
pub fn triple_by_reflection(array: &LabeledArray) -> FilterResult<LabeledArray> {
    let n = array.samples();
    if n == 0 {
        return Ok(array.clone());
    }
    let delta = array.delta()?;
    let starttime = array.starttime()?;
    let out_len = 3 * n - 2;

    let data = map_lanes(array.data(), out_len, |lane| {
        let mut out = Vec::with_capacity(out_len);
        out.extend(lane[1..].iter().rev());
        out.extend_from_slice(lane);
        out.extend(lane[..n - 1].iter().rev());
        out
    })?;

    let new_start = starttime - (n - 1) as f64 * delta;
    let times = (0..out_len).map(|i| new_start + i as f64 * delta).collect();
    let mut tripled = array.with_last_axis(data, Axis::values(TIME_AXIS, times))?;
    tripled.attrs.insert(STARTTIME, new_start);
    Ok(tripled)
}

/// Cut the centre of `padded` back to the extent of `original`, restoring
/// the original's labels and attributes.
pub fn center_extract(padded: &LabeledArray, original: &LabeledArray) -> FilterResult<LabeledArray> {
    let (p, o) = (padded.shape(), original.shape());
    if p.len() != o.len() || p[..p.len().saturating_sub(1)] != o[..o.len().saturating_sub(1)] {
        return Err(FilterError::ShapeMismatch {
            left: p.to_vec(),
            right: o.to_vec(),
        });
    }
    let original_len = original.samples();
    let mut failure = None;
    let data = map_lanes(padded.data(), original_len, |lane| match center_slice(lane, original_len) {
        Ok(slice) => slice,
        Err(e) => {
            failure = Some(e);
            vec![0.0; original_len]
        }
    })?;
    if let Some(e) = failure {
        return Err(e);
    }
    Ok(original.with_data(data)?)
}
