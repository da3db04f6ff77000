//! FFT window construction.

use std::f64::consts::PI;

/// Window applied before every FFT and Welch estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowKind {
    #[default]
    Boxcar,
    Flattop,
}

impl WindowKind {
    /// Window coefficients of the given length.
    pub fn build(self, length: usize) -> Vec<f64> {
        match self {
            WindowKind::Boxcar => vec![1.0; length],
            WindowKind::Flattop => flattop(length),
        }
    }
}

// Symmetric flattop window, optimized for amplitude accuracy of tones
// at the expense of frequency resolution.
fn flattop(length: usize) -> Vec<f64> {
    const A: [f64; 5] = [
        0.21557895,
        0.41663158,
        0.277263158,
        0.083578947,
        0.006947368,
    ];
    if length == 1 {
        return vec![A[0] + A[1] + A[2] + A[3] + A[4]];
    }
    (0..length)
        .map(|n| {
            let t = 2.0 * PI * n as f64 / (length - 1) as f64;
            A[0] - A[1] * t.cos() + A[2] * (2.0 * t).cos() - A[3] * (3.0 * t).cos()
                + A[4] * (4.0 * t).cos()
        })
        .collect()
}

/// Coherent power loss of a window in dB, subtracted from FFT results
/// so a full-scale tone reads the same under any window.
pub fn window_power_db(window: &[f64]) -> f64 {
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    20.0 * mean.log10()
}
