//! Real-signal FFT helpers on top of rustfft.
//!
//! rustfft works on complex buffers only; these wrappers provide the
//! one-sided real transforms the correlation engine and the domain
//! converters need.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Smallest 5-smooth integer (factors 2, 3, 5 only) that is `>= target`.
pub fn next_fast_len(target: usize) -> usize {
    if target <= 6 {
        return target.max(1);
    }
    let mut n = target;
    loop {
        let mut m = n;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

/// One-sided FFT of `signal`, zero-padded or truncated to `n` samples.
///
/// Returns `n / 2 + 1` bins.
pub fn rfft(signal: &[f64], n: usize) -> Vec<Complex64> {
    if n == 0 {
        return Vec::new();
    }
    let mut buffer: Vec<Complex64> = signal
        .iter()
        .take(n)
        .map(|&x| Complex64::new(x, 0.0))
        .collect();
    buffer.resize(n, Complex64::new(0.0, 0.0));

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    buffer.truncate(n / 2 + 1);
    buffer
}

/// Inverse of [`rfft`] producing `n` real samples.
///
/// Uses the first `n / 2 + 1` bins of `spectrum` (missing bins are zero),
/// rebuilds the Hermitian-symmetric full spectrum, and scales by `1/n`.
pub fn irfft(spectrum: &[Complex64], n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let half = n / 2 + 1;
    let zero = Complex64::new(0.0, 0.0);
    let bin = |k: usize| spectrum.get(k).copied().unwrap_or(zero);

    let mut buffer = vec![zero; n];
    for k in 0..half {
        buffer[k] = bin(k);
    }
    // DC and (for even n) Nyquist bins must be real
    buffer[0].im = 0.0;
    if n % 2 == 0 {
        buffer[n / 2].im = 0.0;
    }
    for k in half..n {
        buffer[k] = buffer[n - k].conj();
    }

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(n).process(&mut buffer);

    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * scale).collect()
}

/// Bin frequencies (Hz) of an `n`-point one-sided FFT sampled every `delta` s.
pub fn rfftfreq(n: usize, delta: f64) -> Vec<f64> {
    let step = 1.0 / (n as f64 * delta);
    (0..n / 2 + 1).map(|k| k as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_lengths_are_five_smooth() {
        assert_eq!(next_fast_len(1), 1);
        assert_eq!(next_fast_len(7), 8);
        assert_eq!(next_fast_len(199), 200);
        assert_eq!(next_fast_len(97), 100);
        assert_eq!(next_fast_len(1999), 2000);
        assert_eq!(next_fast_len(121), 125);
    }

    #[test]
    fn inverse_recovers_signal() {
        let signal: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin() + 0.1 * i as f64).collect();
        for n in [50, 51, 64] {
            let spectrum = rfft(&signal, n);
            assert_eq!(spectrum.len(), n / 2 + 1);
            let back = irfft(&spectrum, n);
            for (a, b) in signal.iter().zip(&back) {
                assert!((a - b).abs() < 1e-9, "n={} {} vs {}", n, a, b);
            }
        }
    }

    #[test]
    fn dc_bin_is_sum() {
        let spectrum = rfft(&[1.0, 2.0, 3.0, 4.0], 4);
        assert!((spectrum[0].re - 10.0).abs() < 1e-12);
        assert!(spectrum[0].im.abs() < 1e-12);
    }

    #[test]
    fn frequency_axis_spacing() {
        let freqs = rfftfreq(10, 0.1);
        assert_eq!(freqs.len(), 6);
        assert!((freqs[1] - 1.0).abs() < 1e-12);
        assert!((freqs[5] - 5.0).abs() < 1e-12);
    }
}
