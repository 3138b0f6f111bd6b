//! Stage catalogue.
//!
//! Each constructor binds its parameters into a [`Stage`] whose compute
//! function is pure, so the same stage can run locally or on a worker.

use ndarray::{concatenate, Axis as NdAxis};

use crate::correlation::{cross_correlate, CorrelationParams};
use crate::filters::{
    bandpass, bandpass_in_frequency_domain, freq_to_time, lowpass, taper, time_to_freq, BandpassParams, LowpassParams,
    SpectralBandpassParams, TaperParams,
};
use crate::models::{ArrayKind, Axis, LabeledArray, PAIR_AXIS, STACKS, STARTTIME};
use crate::task::{Stage, StageError, StageResult};

pub const LOWPASS: &str = "lowpass";
pub const BANDPASS: &str = "bandpass";
pub const SPECTRAL_BANDPASS: &str = "spectral_bandpass";
pub const TAPER: &str = "taper";
pub const CORRELATE: &str = "correlate";
pub const STACK: &str = "stack";
pub const COMBINE: &str = "combine";

fn expect_inputs<'a>(inputs: &[&'a LabeledArray], expected: usize) -> StageResult<&'a LabeledArray> {
    if inputs.len() != expected {
        return Err(StageError::Arity {
            expected,
            got: inputs.len(),
        });
    }
    Ok(inputs[0])
}

/// Zero-phase Butterworth low-pass.
pub fn lowpass_stage(params: LowpassParams) -> Stage {
    let upper = params.upper_frequency;
    Stage::new(LOWPASS, move |inputs: &[&LabeledArray]| {
        let input = expect_inputs(inputs, 1)?;
        Ok(lowpass(input, &params)?)
    })
    .with_metadata("lowpass_upper_frequency", upper)
}

/// Zero-phase Butterworth band-pass.
pub fn bandpass_stage(params: BandpassParams) -> Stage {
    let (lower, upper) = (params.lower_frequency, params.upper_frequency);
    Stage::new(BANDPASS, move |inputs: &[&LabeledArray]| {
        let input = expect_inputs(inputs, 1)?;
        Ok(bandpass(input, &params)?)
    })
    .with_metadata("bandpass_lower_frequency", lower)
    .with_metadata("bandpass_upper_frequency", upper)
}

/// Band-pass applied as a spectral multiplier: time → frequency → time.
pub fn spectral_bandpass_stage(params: SpectralBandpassParams) -> Stage {
    let (lower, upper) = (params.lower_frequency, params.upper_frequency);
    Stage::new(SPECTRAL_BANDPASS, move |inputs: &[&LabeledArray]| {
        let input = expect_inputs(inputs, 1)?;
        let spectrum = time_to_freq(input, None)?;
        let filtered = bandpass_in_frequency_domain(&spectrum, &params)?;
        Ok(freq_to_time(&filtered, input)?)
    })
    .with_metadata("bandpass_lower_frequency", lower)
    .with_metadata("bandpass_upper_frequency", upper)
}

pub fn taper_stage(params: TaperParams) -> Stage {
    let fraction = params.fraction;
    Stage::new(TAPER, move |inputs: &[&LabeledArray]| {
        let input = expect_inputs(inputs, 1)?;
        Ok(taper(input, &params)?)
    })
    .with_metadata("taper", fraction)
}

/// Cross-correlate a source window (first input) with a receiver window.
pub fn correlate_stage(params: CorrelationParams) -> Stage {
    let max_tau = params.max_tau_shift;
    let stage = Stage::new(CORRELATE, move |inputs: &[&LabeledArray]| {
        let source = expect_inputs(inputs, 2)?;
        Ok(cross_correlate(source, inputs[1], &params)?)
    });
    match max_tau {
        Some(tau) => stage.with_metadata("max_tau_shift", tau),
        None => stage,
    }
}

/// Sum two correlations of the same pair; `stacks` counts the windows.
pub fn stack_stage() -> Stage {
    Stage::new(STACK, |inputs: &[&LabeledArray]| {
        let first = expect_inputs(inputs, 2)?;
        stack(first, inputs[1])
    })
}

/// Concatenate pair arrays along the `pair` axis.
pub fn combine_stage() -> Stage {
    Stage::new(COMBINE, |inputs: &[&LabeledArray]| {
        let first = expect_inputs(inputs, 2)?;
        combine(first, inputs[1])
    })
}

pub fn stack(first: &LabeledArray, second: &LabeledArray) -> StageResult<LabeledArray> {
    if first.shape() != second.shape() || first.axes() != second.axes() {
        return Err(StageError::incompatible(format!(
            "cannot stack '{}' {:?} onto '{}' {:?}",
            second.name(),
            second.shape(),
            first.name(),
            first.shape()
        )));
    }

    let summed = first.data() + second.data();
    let count = first.attrs.stacks().unwrap_or(1) + second.attrs.stacks().unwrap_or(1);
    let starttime = first.starttime()?;

    let mut attrs = first.attrs.clone();
    attrs.merge(&second.attrs);
    attrs.insert(STACKS, count);
    attrs.insert(STARTTIME, starttime);

    Ok(first
        .with_data(summed)?
        .with_kind(ArrayKind::Stacked)
        .with_attrs(attrs))
}

pub fn combine(first: &LabeledArray, second: &LabeledArray) -> StageResult<LabeledArray> {
    let pair_index = first.axis_index(PAIR_AXIS)?;
    if second.axis_index(PAIR_AXIS)? != pair_index {
        return Err(StageError::incompatible("pair axis position differs"));
    }
    for (index, (a, b)) in first.axes().iter().zip(second.axes()).enumerate() {
        if index != pair_index && a != b {
            return Err(StageError::incompatible(format!("axis '{}' differs", a.name)));
        }
    }
    if first.ndim() != second.ndim() {
        return Err(StageError::incompatible("rank differs"));
    }

    let data = concatenate(NdAxis(pair_index), &[first.data().view(), second.data().view()])
        .map_err(|e| StageError::incompatible(e.to_string()))?;

    let mut pairs = first.labels(PAIR_AXIS)?.to_vec();
    pairs.extend_from_slice(second.labels(PAIR_AXIS)?);
    let mut axes = first.axes().to_vec();
    axes[pair_index] = Axis::labels(PAIR_AXIS, pairs);

    let mut attrs = first.attrs.clone();
    attrs.merge(&second.attrs);

    Ok(LabeledArray::new(first.name(), data, axes)?
        .with_kind(ArrayKind::CombinedDataset)
        .with_attrs(attrs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::spectral::{irfft, rfft, rfftfreq};
    use crate::filters::{butter_sos, sos_response, FilterBand};
    use crate::models::{ArrayError, TIME_AXIS};
    use num_complex::Complex64;
    use crate::store::ArrayStore;
    use crate::task::{ExecutionMode, PoolExecutor, Task, TaskConfig, TaskContext, TaskError};
    use std::f64::consts::PI;
    use tempfile::TempDir;

    fn one_second(station: &str) -> LabeledArray {
        let trace = (0..100)
            .map(|i| (2.0 * PI * 3.0 * i as f64 / 100.0).sin() + 0.5 * (2.0 * PI * 11.0 * i as f64 / 100.0).cos())
            .collect();
        LabeledArray::window(station, &["HHZ"], vec![trace], 1481847492.0, 0.01).unwrap()
    }

    fn peak_index(array: &LabeledArray) -> usize {
        let lane: Vec<f64> = array.data().iter().copied().collect();
        (0..lane.len()).max_by(|&a, &b| lane[a].total_cmp(&lane[b])).unwrap()
    }

    #[test]
    fn identical_windows_correlate_through_a_task() {
        let task = Task::new(correlate_stage(CorrelationParams::default()), TaskConfig::default());
        let a = one_second("UU.A");
        let b = one_second("UU.B");

        let out = task
            .invoke(&[&a, &b], &TaskContext::new(1481847492.0, "UU.A"), None)
            .unwrap();
        assert_eq!(out.shape(), &[1, 1, 1, 199]);
        assert_eq!(peak_index(&out), 99);
        assert_eq!(out.coord_values(TIME_AXIS).unwrap()[99], 0.0);
        assert_eq!(out.name(), "UU.A:UU.B");
        assert_eq!(out.attrs.last_operation(), Some(CORRELATE));
    }

    #[test]
    fn correlate_stage_requires_two_inputs() {
        let task = Task::new(correlate_stage(CorrelationParams::default()), TaskConfig::default());
        let a = one_second("A");
        let err = task.invoke(&[&a], &TaskContext::new(0.0, "A"), None).unwrap_err();
        assert!(matches!(
            err,
            TaskError::StageFailed {
                source: StageError::Arity { expected: 2, got: 1 },
                ..
            }
        ));
    }

    #[test]
    fn filter_stages_require_delta() {
        let mut a = one_second("A");
        a.attrs.remove(crate::models::DELTA);
        let err = lowpass_stage(LowpassParams::default()).compute(&[&a]).unwrap_err();
        assert!(matches!(
            err,
            StageError::Filter(crate::filters::FilterError::Array(ArrayError::MissingAttribute(_)))
        ));
    }

    #[test]
    fn spectral_bandpass_keeps_shape() {
        let a = one_second("A");
        let params = SpectralBandpassParams {
            lower_frequency: 1.0,
            upper_frequency: 5.0,
            ..Default::default()
        };
        let out = spectral_bandpass_stage(params).compute(&[&a]).unwrap();
        assert_eq!(out.shape(), a.shape());
        assert_eq!(out.axes(), a.axes());
        // the 11 Hz component is suppressed well below the 3 Hz one
        let energy: f64 = out.data().iter().map(|v| v * v).sum();
        let original: f64 = a.data().iter().map(|v| v * v).sum();
        assert!(energy < original);
    }

    fn ninety_seven_samples() -> (Vec<f64>, LabeledArray) {
        let trace: Vec<f64> = (0..97)
            .map(|i| {
                let t = i as f64 / 100.0;
                (2.0 * PI * 10.0 * t).sin() + 0.3 * (2.0 * PI * 40.0 * t).cos()
            })
            .collect();
        let array = LabeledArray::window("A", &["HHZ"], vec![trace.clone()], 0.0, 0.01).unwrap();
        (trace, array)
    }

    fn tone_amplitude(samples: &[f64], freq: f64, fs: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (i, v) in samples.iter().enumerate() {
            let phase = 2.0 * PI * freq * i as f64 / fs;
            re += v * phase.cos();
            im -= v * phase.sin();
        }
        2.0 * (re * re + im * im).sqrt() / samples.len() as f64
    }

    #[test]
    fn spectral_bandpass_inverts_at_padded_length() {
        let (trace, array) = ninety_seven_samples();
        let params = SpectralBandpassParams {
            lower_frequency: 5.0,
            upper_frequency: 20.0,
            ..Default::default()
        };
        let out = spectral_bandpass_stage(params.clone()).compute(&[&array]).unwrap();
        assert_eq!(out.shape(), &[1, 1, 97]);
        assert_eq!(out.axes(), array.axes());

        // 97 samples are transformed at 100 points
        let delta = 0.01;
        let sos = butter_sos(FilterBand::BandPass { low: 5.0, high: 20.0 }, params.order, 1.0 / delta).unwrap();
        let normalized: Vec<f64> = rfftfreq(100, delta).iter().map(|f| f * delta * 2.0 * PI).collect();
        let product: Vec<Complex64> = rfft(&trace, 100)
            .iter()
            .zip(sos_response(&sos, &normalized))
            .map(|(x, h)| x * h.powi(params.filter_power))
            .collect();
        let expected = irfft(&product, 100);

        for (got, want) in out.data().iter().zip(&expected[..97]) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }
    }

    #[test]
    fn spectral_bandpass_keeps_pass_band_at_non_smooth_length() {
        let (_, array) = ninety_seven_samples();
        let params = SpectralBandpassParams {
            lower_frequency: 5.0,
            upper_frequency: 20.0,
            ..Default::default()
        };
        let out = spectral_bandpass_stage(params).compute(&[&array]).unwrap();
        let lane: Vec<f64> = out.data().iter().copied().collect();

        // last 60 samples hold whole cycles of both tones
        let tail = &lane[37..];
        let pass = tone_amplitude(tail, 10.0, 100.0);
        let stop = tone_amplitude(tail, 40.0, 100.0);
        assert!(pass > 0.7 && pass < 1.3, "pass-band amplitude {}", pass);
        assert!(stop < 0.1, "stop-band amplitude {}", stop);
    }

    #[test]
    fn stack_sums_and_counts() {
        let correlate = correlate_stage(CorrelationParams {
            max_tau_shift: Some(0.1),
            ..Default::default()
        });
        let a = one_second("A");
        let xcorr = correlate.compute(&[&a, &a]).unwrap();

        let once = stack(&xcorr, &xcorr).unwrap();
        assert_eq!(once.kind(), ArrayKind::Stacked);
        assert_eq!(once.attrs.stacks(), Some(2));
        let twice = stack(&once, &xcorr).unwrap();
        assert_eq!(twice.attrs.stacks(), Some(3));

        let expected: Vec<f64> = xcorr.data().iter().map(|v| v * 3.0).collect();
        for (got, want) in twice.data().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn stack_rejects_mismatched_shapes() {
        let a = one_second("A");
        let short = correlate_stage(CorrelationParams {
            max_tau_shift: Some(0.1),
            ..Default::default()
        })
        .compute(&[&a, &a])
        .unwrap();
        let long = correlate_stage(CorrelationParams::default()).compute(&[&a, &a]).unwrap();
        assert!(matches!(stack(&short, &long), Err(StageError::Incompatible(_))));
    }

    #[test]
    fn combine_concatenates_pairs() {
        let params = CorrelationParams {
            max_tau_shift: Some(0.05),
            ..Default::default()
        };
        let (a, b, c) = (one_second("A"), one_second("B"), one_second("C"));
        let ab = cross_correlate(&a, &b, &params).unwrap();
        let ac = cross_correlate(&a, &c, &params).unwrap();

        let combined = combine(&ab, &ac).unwrap();
        assert_eq!(combined.kind(), ArrayKind::CombinedDataset);
        assert_eq!(combined.shape(), &[1, 1, 2, 11]);
        assert_eq!(combined.labels(PAIR_AXIS).unwrap(), &["src:Arec:B", "src:Arec:C"]);
    }

    #[test]
    fn pipeline_caches_every_stage() {
        let temp_dir = TempDir::new().unwrap();
        let cache = temp_dir.path().to_path_buf();
        let executor = PoolExecutor::new(2).unwrap();
        let write = ExecutionMode::WriteCache(cache.clone());
        let start = 1481847492.0;

        let filter = Task::new(
            bandpass_stage(BandpassParams {
                lower_frequency: 1.0,
                upper_frequency: 20.0,
                ..Default::default()
            }),
            TaskConfig::new(write.clone()),
        );
        let tapering = Task::new(taper_stage(TaperParams::default()), TaskConfig::new(write.clone()));
        let correlate = Task::new(
            correlate_stage(CorrelationParams {
                max_tau_shift: Some(0.2),
                ..Default::default()
            }),
            TaskConfig::new(write.clone()),
        );

        let mut prepared = Vec::new();
        for station in ["UU.A", "UU.B"] {
            let ctx = TaskContext::new(start, station);
            let raw = one_second(station);
            let filtered = filter.invoke(&[&raw], &ctx, Some(&executor)).unwrap();
            prepared.push(tapering.invoke(&[&filtered], &ctx, Some(&executor)).unwrap());
        }
        let xcorr = correlate
            .invoke(&[&prepared[0], &prepared[1]], &TaskContext::new(start, "UU.A:UU.B"), None)
            .unwrap();

        assert_eq!(
            xcorr.attrs.operation_list(),
            vec![BANDPASS, TAPER, CORRELATE]
        );
        assert!(cache.join(BANDPASS).join("2016-12-16T00:18:12").join("UU.B.json").is_file());
        assert!(cache.join(TAPER).join("2016-12-16T00:18:12").join("UU.A.metadata.json").is_file());
        assert!(cache
            .join(CORRELATE)
            .join("2016-12-16T00:18:12")
            .join("UU.A:UU.B.json")
            .is_file());

        let reader = correlate.with_mode(ExecutionMode::ReadCache(cache.clone()));
        let cached = reader
            .invoke(&[&prepared[0], &prepared[1]], &TaskContext::new(start, "UU.A:UU.B"), None)
            .unwrap();
        assert_eq!(cached, xcorr);

        let stacked = stack(&xcorr, &cached).unwrap();
        let stem = ArrayStore::new(&cache).save(&stacked).unwrap();
        assert_eq!(stem, cache.join("src:UU.Arec:UU.B").join("2").join("2016-12-16T00:18:12"));
    }
}
