//! Edge tapering.

use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::models::array::{map_lanes, LabeledArray};

use super::{FilterError, FilterResult};

/// Window shape used for the tapered edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Bartlett,
    Boxcar,
}

impl WindowType {
    /// Symmetric window of `len` points.
    pub fn samples(self, len: usize) -> Vec<f64> {
        if len == 1 {
            return vec![1.0];
        }
        let m = (len - 1) as f64;
        (0..len)
            .map(|k| {
                let x = k as f64;
                match self {
                    WindowType::Hann => 0.5 - 0.5 * (2.0 * PI * x / m).cos(),
                    WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * x / m).cos(),
                    WindowType::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * x / m).cos() + 0.08 * (4.0 * PI * x / m).cos()
                    }
                    WindowType::Bartlett => 1.0 - (2.0 * x / m - 1.0).abs(),
                    WindowType::Boxcar => 1.0,
                }
            })
            .collect()
    }
}

/// What tapered samples decay toward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum TaperObjective {
    #[default]
    Zeros,
    Constant(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaperParams {
    /// Fraction of the trace covered by the taper, split between both ends.
    pub fraction: f64,
    pub window: WindowType,
    pub objective: TaperObjective,
}

impl Default for TaperParams {
    fn default() -> Self {
        Self {
            fraction: 0.1,
            window: WindowType::Hann,
            objective: TaperObjective::Zeros,
        }
    }
}

/// Per-sample weights for a trace of `n` samples.
///
/// The taper window has `floor(fraction * n)` points, made odd by dropping
/// one. Its rising half multiplies the start of the trace and its falling
/// half the end; the outermost samples are forced to zero weight.
pub fn taper_weights(n: usize, params: &TaperParams) -> FilterResult<Vec<f64>> {
    let fraction = params.fraction;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(FilterError::InvalidTaper(fraction));
    }

    let mut weights = vec![1.0; n];
    let mut len = (fraction * n as f64) as usize;
    if len % 2 == 0 {
        if len == 0 {
            return Ok(weights);
        }
        len -= 1;
    }

    let mut window = params.window.samples(len);
    window[0] = 0.0;
    window[len - 1] = 0.0;

    let center = (len - 1) / 2;
    for i in 0..=center {
        weights[i] *= window[i];
        weights[n - 1 - center + i] *= window[center + i];
    }
    Ok(weights)
}

/// Taper both ends of every trace.
pub fn taper(array: &LabeledArray, params: &TaperParams) -> FilterResult<LabeledArray> {
    let weights = taper_weights(array.samples(), params)?;
    let offset = match params.objective {
        TaperObjective::Zeros => 0.0,
        TaperObjective::Constant(c) => c,
    };
    let data = map_lanes(array.data(), array.samples(), |lane| {
        lane.iter()
            .zip(&weights)
            .map(|(x, w)| x * w + (1.0 - w) * offset)
            .collect()
    })?;
    Ok(array.with_data(data)?)
}

/// Taper `array` and blend its edges into the matching samples of `target`.
pub fn taper_toward(array: &LabeledArray, target: &LabeledArray, params: &TaperParams) -> FilterResult<LabeledArray> {
    if array.shape() != target.shape() {
        return Err(FilterError::ShapeMismatch {
            left: array.shape().to_vec(),
            right: target.shape().to_vec(),
        });
    }
    let tapered = taper(
        array,
        &TaperParams {
            objective: TaperObjective::Zeros,
            ..params.clone()
        },
    )?;

    let weights = taper_weights(array.samples(), params)?;
    let mut data = tapered.data().clone();
    let ndim = data.ndim();
    for (mut lane, target_lane) in data
        .lanes_mut(ndarray::Axis(ndim - 1))
        .into_iter()
        .zip(target.data().lanes(ndarray::Axis(ndim - 1)))
    {
        Zip::from(&mut lane)
            .and(&target_lane)
            .and(&ndarray::ArrayView1::from(&weights[..]))
            .for_each(|x, &t, &w| *x += (1.0 - w) * t);
    }
    Ok(tapered.with_data(data)?)
}
