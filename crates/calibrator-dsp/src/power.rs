//! Power measurement on IQ captures.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::window::WindowKind;

/// Conversion from linear voltage-squared units to dBm across 50 ohms.
pub fn lin_v_to_dbm_factor() -> f64 {
    let impedance = 50.0_f64;
    10.0 * (1.0 / (2.0 * impedance)).log10() + 30.0
}

/// Mean power of the capture from the time-domain samples, in dBm.
pub fn time_domain_power_dbm(data: &[Complex64]) -> f64 {
    let mean_sq = data.iter().map(|s| s.norm_sqr()).sum::<f64>() / data.len() as f64;
    10.0 * mean_sq.log10() + lin_v_to_dbm_factor()
}

/// Scale IQ samples by a power factor in dB.
pub fn scale_iq_by_power_db(data: &mut [Complex64], power_db: f64) {
    let voltage_factor = 10.0_f64.powf(power_db / 20.0);
    for s in data.iter_mut() {
        *s *= voltage_factor;
    }
}

/// Smallest power-of-two bin count giving at least the requested
/// frequency resolution at this sample rate.
pub fn bins_for_resolution(sample_rate: f64, min_resolution: f64) -> usize {
    let mut bins = 1;
    while sample_rate / bins as f64 > min_resolution {
        bins *= 2;
    }
    bins
}

/// Total power in dBm by trapezoidal integration of a Welch power
/// spectral density estimate.
///
/// Segments of `nperseg` samples with 50 percent overlap are mean
/// detrended, windowed, and transformed; the averaged two-sided
/// density is integrated over the full span.
pub fn freq_domain_integrated_power_dbm(
    data: &[Complex64],
    sample_rate: f64,
    nperseg: usize,
    window: WindowKind,
) -> f64 {
    let nperseg = nperseg.min(data.len());
    let w = window.build(nperseg);
    let win_energy: f64 = w.iter().map(|v| v * v).sum();
    let step = (nperseg / 2).max(1);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut psd = vec![0.0f64; nperseg];
    let mut segments = 0usize;
    let mut start = 0usize;
    while start + nperseg <= data.len() {
        let seg = &data[start..start + nperseg];
        let mean = seg.iter().sum::<Complex64>() / nperseg as f64;
        let mut buf: Vec<Complex64> = seg
            .iter()
            .zip(&w)
            .map(|(s, &wv)| (s - mean) * wv)
            .collect();
        fft.process(&mut buf);
        for (acc, v) in psd.iter_mut().zip(&buf) {
            *acc += v.norm_sqr() / (sample_rate * win_energy);
        }
        segments += 1;
        start += step;
    }
    for v in psd.iter_mut() {
        *v /= segments as f64;
    }

    // Shift to a monotonic frequency axis before integrating.
    psd.rotate_right(nperseg / 2);
    let df = sample_rate / nperseg as f64;
    let mut acc = 0.0;
    for pair in psd.windows(2) {
        acc += 0.5 * (pair[0] + pair[1]) * df;
    }
    10.0 * acc.log10() + lin_v_to_dbm_factor()
}
