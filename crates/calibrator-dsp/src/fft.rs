//! Calibrated FFTs in dBm.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::power::lin_v_to_dbm_factor;
use crate::window::{WindowKind, window_power_db};

/// Windowed, shifted FFT of a capture in dBm per bin, with the window's
/// coherent loss compensated. Returns the spectrum and the absolute
/// frequency of each bin given the tuned center `f0`.
pub fn dbm_fft(
    data: &[Complex64],
    f0: f64,
    sample_rate: f64,
    window: WindowKind,
) -> (Vec<f64>, Vec<f64>) {
    let n = data.len();
    let w = window.build(n);
    let mut buf: Vec<Complex64> = data.iter().zip(&w).map(|(s, &wv)| s * wv).collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);
    buf.rotate_right(n / 2);

    let correction = lin_v_to_dbm_factor() - window_power_db(&w);
    let spectrum = buf
        .iter()
        .map(|v| 20.0 * v.norm().log10() + correction)
        .collect();
    let df = sample_rate / n as f64;
    let freqs = (0..n)
        .map(|i| (i as f64 - (n / 2) as f64) * df + f0)
        .collect();
    (spectrum, freqs)
}

/// Average `avg_num` consecutive sub-captures into one spectrum of
/// `data.len() / avg_num` bins. Averaging happens in linear power so a
/// noisy floor converges instead of being biased low.
pub fn averaged_dbm_fft(
    data: &[Complex64],
    f0: f64,
    sample_rate: f64,
    window: WindowKind,
    avg_num: usize,
) -> (Vec<f64>, Vec<f64>) {
    let bins = data.len() / avg_num;
    let mut acc = vec![0.0f64; bins];
    let mut freqs = Vec::new();
    for i in 0..avg_num {
        let (sub, sub_freqs) = dbm_fft(&data[i * bins..(i + 1) * bins], f0, sample_rate, window);
        for (a, v) in acc.iter_mut().zip(&sub) {
            *a += 10.0_f64.powf(v / 10.0);
        }
        freqs = sub_freqs;
    }
    let spectrum = acc
        .into_iter()
        .map(|v| 10.0 * (v / avg_num as f64).log10())
        .collect();
    (spectrum, freqs)
}

/// Normalize a dBm spectrum so a tone's bin reads its total power
/// regardless of FFT length.
pub fn normalize_dbm_fft(spectrum: &mut [f64]) {
    let offset = 20.0 * (spectrum.len() as f64).log10();
    for v in spectrum.iter_mut() {
        *v -= offset;
    }
}

/// Strongest bin of a spectrum as (power, frequency).
pub fn peak(spectrum: &[f64], freqs: &[f64]) -> (f64, f64) {
    let mut max_i = 0;
    for i in 1..spectrum.len() {
        if spectrum[i] > spectrum[max_i] {
            max_i = i;
        }
    }
    (spectrum[max_i], freqs[max_i])
}
