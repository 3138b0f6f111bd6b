//! Butterworth design and zero-phase filtering.
//!
//! Filters are cascades of second-order sections built from biquad
//! coefficients. Odd orders add one bilinear first-order section. Zero-phase
//! filtering runs the cascade forward and backward with steady-state
//! initial conditions, after extending the signal at both edges.

use std::f64::consts::PI;

use biquad::{Coefficients, ToHertz, Type};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::models::array::{map_lanes, LabeledArray, FREQUENCY_AXIS};

use super::{FilterError, FilterResult};

/// Relative nudge applied to the sampling rate so a corner exactly at
/// Nyquist remains designable.
const SAMPLE_RATE_NUDGE: f64 = 1.000_000_01;

/// Which band a Butterworth cascade passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterBand {
    LowPass { corner: f64 },
    HighPass { corner: f64 },
    BandPass { low: f64, high: f64 },
}

/// Signal extension applied before zero-phase filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    /// Point-symmetric reflection about the edge sample.
    #[default]
    Odd,
    /// Mirror reflection excluding the edge sample.
    Even,
    /// Repeat the edge sample.
    Constant,
    /// No extension.
    None,
}

/// Time-domain low-pass parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowpassParams {
    pub upper_frequency: f64,
    pub order: usize,
    pub padding: Padding,
}

impl Default for LowpassParams {
    fn default() -> Self {
        Self {
            upper_frequency: 0.5,
            order: 2,
            padding: Padding::Odd,
        }
    }
}

/// Time-domain band-pass parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandpassParams {
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub order: usize,
    pub padding: Padding,
}

impl Default for BandpassParams {
    fn default() -> Self {
        Self {
            lower_frequency: 0.01,
            upper_frequency: 1.0,
            order: 2,
            padding: Padding::Odd,
        }
    }
}

/// Frequency-domain band-pass parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralBandpassParams {
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub order: usize,
    /// Exponent applied to the complex response before multiplying.
    pub filter_power: i32,
}

impl Default for SpectralBandpassParams {
    fn default() -> Self {
        Self {
            lower_frequency: 0.01,
            upper_frequency: 1.0,
            order: 4,
            filter_power: 3,
        }
    }
}

/// Design a Butterworth cascade as second-order sections.
pub fn butter_sos(band: FilterBand, order: usize, sample_rate: f64) -> FilterResult<Vec<Coefficients<f64>>> {
    if order == 0 {
        return Err(FilterError::InvalidOrder(order));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(FilterError::InvalidSampleRate(sample_rate));
    }
    let fs = sample_rate * SAMPLE_RATE_NUDGE;

    match band {
        FilterBand::LowPass { corner } => cascade(Pass::Low, corner, order, fs),
        FilterBand::HighPass { corner } => cascade(Pass::High, corner, order, fs),
        FilterBand::BandPass { low, high } => {
            if low >= high {
                return Err(FilterError::InvalidCorner {
                    corner: low,
                    reason: format!("lower corner must be below upper corner {}", high),
                });
            }
            let mut sections = cascade(Pass::High, low, order, fs)?;
            sections.extend(cascade(Pass::Low, high, order, fs)?);
            Ok(sections)
        }
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Low,
    High,
}

fn cascade(pass: Pass, corner: f64, order: usize, fs: f64) -> FilterResult<Vec<Coefficients<f64>>> {
    if !(corner.is_finite() && corner > 0.0 && corner <= fs / 2.0) {
        return Err(FilterError::InvalidCorner {
            corner,
            reason: format!("must lie in (0, {}]", fs / 2.0),
        });
    }

    let mut sections = Vec::with_capacity(order / 2 + order % 2);
    for k in 0..order / 2 {
        let q = 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin());
        let kind = match pass {
            Pass::Low => Type::LowPass,
            Pass::High => Type::HighPass,
        };
        let coeffs = Coefficients::<f64>::from_params(kind, fs.hz(), corner.hz(), q)
            .map_err(|e| FilterError::Design(format!("{:?}", e)))?;
        sections.push(coeffs);
    }
    if order % 2 == 1 {
        sections.push(first_order(pass, corner, fs));
    }
    Ok(sections)
}

/// Bilinear first-order section with frequency prewarping.
fn first_order(pass: Pass, corner: f64, fs: f64) -> Coefficients<f64> {
    let k = (PI * corner / fs).tan();
    let norm = 1.0 / (1.0 + k);
    let a1 = (k - 1.0) * norm;
    let (b0, b1) = match pass {
        Pass::High => (norm, -norm),
        Pass::Low => (k * norm, k * norm),
    };
    Coefficients {
        a1,
        a2: 0.0,
        b0,
        b1,
        b2: 0.0,
    }
}

/// Run the cascade once over `samples` in transposed direct form II,
/// starting from (and updating) `state`.
fn sosfilt(sos: &[Coefficients<f64>], samples: &mut [f64], state: &mut [[f64; 2]]) {
    for (c, z) in sos.iter().zip(state.iter_mut()) {
        for x in samples.iter_mut() {
            let input = *x;
            let y = c.b0 * input + z[0];
            z[0] = c.b1 * input - c.a1 * y + z[1];
            z[1] = c.b2 * input - c.a2 * y;
            *x = y;
        }
    }
}

/// Per-section state that a unit step input would settle into.
fn steady_state(sos: &[Coefficients<f64>]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sos.iter()
        .map(|c| {
            let den = 1.0 + c.a1 + c.a2;
            if den.abs() < f64::EPSILON {
                return [0.0, 0.0];
            }
            let gain = (c.b0 + c.b1 + c.b2) / den;
            let z1 = c.b2 - c.a2 * gain;
            let z0 = c.b1 - c.a1 * gain + z1;
            let zi = [scale * z0, scale * z1];
            scale *= gain;
            zi
        })
        .collect()
}

fn extend(samples: &[f64], padlen: usize, padding: Padding) -> Vec<f64> {
    let n = samples.len();
    let mut out = Vec::with_capacity(n + 2 * padlen);
    let (first, last) = (samples[0], samples[n - 1]);
    match padding {
        Padding::Odd => {
            out.extend((1..=padlen).rev().map(|i| 2.0 * first - samples[i]));
            out.extend_from_slice(samples);
            out.extend((1..=padlen).map(|i| 2.0 * last - samples[n - 1 - i]));
        }
        Padding::Even => {
            out.extend((1..=padlen).rev().map(|i| samples[i]));
            out.extend_from_slice(samples);
            out.extend((1..=padlen).map(|i| samples[n - 1 - i]));
        }
        Padding::Constant => {
            out.extend(std::iter::repeat(first).take(padlen));
            out.extend_from_slice(samples);
            out.extend(std::iter::repeat(last).take(padlen));
        }
        Padding::None => out.extend_from_slice(samples),
    }
    out
}

/// Zero-phase forward-backward filtering.
///
/// The edge extension is `3 * (2 * sections + 1)` samples, clamped to
/// `len - 1` for short signals.
pub fn sosfiltfilt(samples: &[f64], sos: &[Coefficients<f64>], padding: Padding) -> Vec<f64> {
    let n = samples.len();
    if n == 0 || sos.is_empty() {
        return samples.to_vec();
    }

    let padlen = match padding {
        Padding::None => 0,
        _ => (3 * (2 * sos.len() + 1)).min(n - 1),
    };
    let mut ext = extend(samples, padlen, padding);
    let zi = steady_state(sos);

    let x0 = ext[0];
    let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
    sosfilt(sos, &mut ext, &mut state);

    ext.reverse();
    let y0 = ext[0];
    let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * y0, z[1] * y0]).collect();
    sosfilt(sos, &mut ext, &mut state);
    ext.reverse();

    ext[padlen..padlen + n].to_vec()
}

/// Complex response of the cascade at normalized angular frequencies
/// (radians per sample).
pub fn sos_response(sos: &[Coefficients<f64>], normalized_freqs: &[f64]) -> Vec<Complex64> {
    normalized_freqs
        .iter()
        .map(|&w| {
            let z1 = Complex64::from_polar(1.0, -w);
            let z2 = z1 * z1;
            sos.iter().fold(Complex64::new(1.0, 0.0), |acc, c| {
                let num = c.b0 + z1 * c.b1 + z2 * c.b2;
                let den = 1.0 + z1 * c.a1 + z2 * c.a2;
                acc * num / den
            })
        })
        .collect()
}

/// Zero-phase low-pass along the last axis of every trace.
pub fn lowpass(array: &LabeledArray, params: &LowpassParams) -> FilterResult<LabeledArray> {
    let sample_rate = 1.0 / array.delta()?;
    let sos = butter_sos(
        FilterBand::LowPass {
            corner: params.upper_frequency,
        },
        params.order,
        sample_rate,
    )?;
    filter_lanes(array, &sos, params.padding)
}

/// Zero-phase band-pass along the last axis of every trace.
pub fn bandpass(array: &LabeledArray, params: &BandpassParams) -> FilterResult<LabeledArray> {
    let sample_rate = 1.0 / array.delta()?;
    let sos = butter_sos(
        FilterBand::BandPass {
            low: params.lower_frequency,
            high: params.upper_frequency,
        },
        params.order,
        sample_rate,
    )?;
    filter_lanes(array, &sos, params.padding)
}

fn filter_lanes(array: &LabeledArray, sos: &[Coefficients<f64>], padding: Padding) -> FilterResult<LabeledArray> {
    let data = map_lanes(array.data(), array.samples(), |lane| sosfiltfilt(lane, sos, padding))?;
    Ok(array.with_data(data)?)
}

/// Multiply a spectrum by the band-pass response raised to `filter_power`.
///
/// The upper corner is clamped to Nyquist. The response is evaluated on the
/// spectrum's `frequency` coordinates.
pub fn bandpass_in_frequency_domain(
    spectrum: &LabeledArray<Complex64>,
    params: &SpectralBandpassParams,
) -> FilterResult<LabeledArray<Complex64>> {
    let delta = spectrum.delta()?;
    let nyquist = 0.5 / delta;
    let upper = params.upper_frequency.min(nyquist);

    let sos = butter_sos(
        FilterBand::BandPass {
            low: params.lower_frequency,
            high: upper,
        },
        params.order,
        1.0 / delta,
    )?;

    let normalized: Vec<f64> = spectrum
        .coord_values(FREQUENCY_AXIS)?
        .iter()
        .map(|f| f * delta * 2.0 * PI)
        .collect();
    let response: Vec<Complex64> = sos_response(&sos, &normalized)
        .into_iter()
        .map(|h| h.powi(params.filter_power))
        .collect();

    let data = map_lanes(spectrum.data(), spectrum.samples(), |lane| {
        lane.iter().zip(&response).map(|(x, h)| x * h).collect()
    })?;
    Ok(spectrum.with_data(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn section_counts_follow_order() {
        assert_eq!(butter_sos(FilterBand::LowPass { corner: 5.0 }, 4, 100.0).unwrap().len(), 2);
        assert_eq!(butter_sos(FilterBand::LowPass { corner: 5.0 }, 3, 100.0).unwrap().len(), 2);
        assert_eq!(
            butter_sos(FilterBand::BandPass { low: 1.0, high: 10.0 }, 2, 100.0).unwrap().len(),
            2
        );
    }

    #[test]
    fn rejects_bad_designs() {
        assert!(matches!(
            butter_sos(FilterBand::LowPass { corner: 5.0 }, 0, 100.0),
            Err(FilterError::InvalidOrder(0))
        ));
        assert!(matches!(
            butter_sos(FilterBand::LowPass { corner: 80.0 }, 2, 100.0),
            Err(FilterError::InvalidCorner { .. })
        ));
        assert!(butter_sos(FilterBand::BandPass { low: 10.0, high: 1.0 }, 2, 100.0).is_err());
    }

    #[test]
    fn corner_at_nyquist_is_designable() {
        assert!(butter_sos(FilterBand::LowPass { corner: 50.0 }, 2, 100.0).is_ok());
    }

    #[test]
    fn lowpass_response_shape() {
        let sos = butter_sos(FilterBand::LowPass { corner: 10.0 }, 4, 100.0).unwrap();
        let dc = sos_response(&sos, &[0.0])[0].norm();
        assert!((dc - 1.0).abs() < 1e-9);

        let w_corner = 2.0 * PI * 10.0 / 100.0;
        let at_corner = sos_response(&sos, &[w_corner])[0].norm();
        assert!((at_corner - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);

        let w_stop = 2.0 * PI * 40.0 / 100.0;
        assert!(sos_response(&sos, &[w_stop])[0].norm() < 1e-3);
    }

    #[test]
    fn odd_order_highpass_blocks_dc() {
        let sos = butter_sos(FilterBand::HighPass { corner: 5.0 }, 3, 100.0).unwrap();
        assert!(sos_response(&sos, &[0.0])[0].norm() < 1e-9);
        assert!((sos_response(&sos, &[PI])[0].norm() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn filtfilt_attenuates_stopband() {
        let fs = 100.0;
        let sos = butter_sos(FilterBand::LowPass { corner: 5.0 }, 4, fs).unwrap();
        let low = sine(1.0, fs, 1000);
        let high = sine(30.0, fs, 1000);
        let mixed: Vec<f64> = low.iter().zip(&high).map(|(a, b)| a + b).collect();

        let filtered = sosfiltfilt(&mixed, &sos, Padding::Odd);
        assert_eq!(filtered.len(), mixed.len());

        let residual: Vec<f64> = filtered[100..900]
            .iter()
            .zip(&low[100..900])
            .map(|(f, l)| f - l)
            .collect();
        assert!(rms(&residual) < 0.02, "residual rms {}", rms(&residual));
    }

    #[test]
    fn filtfilt_has_zero_phase() {
        let fs = 100.0;
        let sos = butter_sos(FilterBand::LowPass { corner: 10.0 }, 2, fs).unwrap();
        let signal: Vec<f64> = (0..500).map(|i| (2.0 * PI * 2.0 * i as f64 / fs).cos()).collect();
        let filtered = sosfiltfilt(&signal, &sos, Padding::Even);

        let peak = (140..160).max_by(|&a, &b| filtered[a].total_cmp(&filtered[b])).unwrap();
        assert_eq!(peak, 150);
    }

    #[test]
    fn constant_signal_passes_lowpass_unchanged() {
        let sos = butter_sos(FilterBand::LowPass { corner: 5.0 }, 2, 100.0).unwrap();
        let out = sosfiltfilt(&[3.0; 64], &sos, Padding::Constant);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn short_signals_clamp_padding() {
        let sos = butter_sos(FilterBand::LowPass { corner: 5.0 }, 4, 100.0).unwrap();
        let out = sosfiltfilt(&[1.0, 2.0, 3.0], &sos, Padding::Odd);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn lowpass_requires_delta() {
        let mut array = LabeledArray::window("S", &["Z"], vec![vec![0.0; 32]], 0.0, 0.01).unwrap();
        array.attrs.remove(crate::models::DELTA);
        assert!(matches!(
            lowpass(&array, &LowpassParams::default()),
            Err(FilterError::Array(crate::models::ArrayError::MissingAttribute(_)))
        ));
    }

    #[test]
    fn bandpass_keeps_labels() {
        let array = LabeledArray::window("S", &["Z", "N"], vec![sine(2.0, 100.0, 256), sine(20.0, 100.0, 256)], 0.0, 0.01)
            .unwrap();
        let params = BandpassParams {
            lower_frequency: 1.0,
            upper_frequency: 5.0,
            ..Default::default()
        };
        let out = bandpass(&array, &params).unwrap();
        assert_eq!(out.shape(), array.shape());
        assert_eq!(out.axes(), array.axes());
        assert_eq!(out.attrs, array.attrs);
    }
}
