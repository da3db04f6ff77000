//! Bandwidth figures from a measured transfer function.

/// Transfer function in dB from measured and input powers in dBm.
pub fn db_transfer_function(measured_power: &[f64], input_power: &[f64]) -> Vec<f64> {
    measured_power
        .iter()
        .zip(input_power)
        .map(|(m, i)| m - i)
        .collect()
}

/// Bandwidth between the `cutoff_db` crossings of a transfer function
/// sampled symmetrically around the center frequency.
///
/// Each half is referenced to its own maximum, then scanned for the
/// crossing (upward from the bottom edge on the lower half, downward
/// from the peak on the upper half). The crossing frequency is the
/// weighted average of the samples straddling it. An odd-length input
/// drops the sample just above center, which holds the DC artifact.
pub fn db_bandwidth(h_db: &[f64], freqs: &[f64], cutoff_db: f64) -> f64 {
    let mut h: Vec<f64> = h_db.to_vec();
    let mut f: Vec<f64> = freqs.to_vec();
    if h.len() % 2 == 1 {
        let mid = h.len() / 2 + 1;
        h.remove(mid);
        f.remove(mid);
    }
    let half = h.len() / 2;

    let mut cutoffs = [0.0f64; 2];
    for (j, (h, f)) in [(&h[..half], &f[..half]), (&h[half..], &f[half..])]
        .into_iter()
        .enumerate()
    {
        let mut max_i = 0;
        for i in 1..h.len() {
            if h[i] > h[max_i] {
                max_i = i;
            }
        }
        let h: Vec<f64> = h.iter().map(|v| v - h[max_i]).collect();

        let start = if j == 0 { 1 } else { max_i.max(1) };
        let mut last_above = h[start - 1] > -cutoff_db;
        for i in start..h.len() {
            let above = h[i] > -cutoff_db;
            if above != last_above {
                let a = ((h[i] + cutoff_db) / (h[i] - h[i - 1])).abs();
                cutoffs[j] = (1.0 - a) * f[i] + a * f[i - 1];
                break;
            }
            last_above = above;
        }
    }
    cutoffs[1] - cutoffs[0]
}

/// Equivalent noise bandwidth: the width of an ideal brick-wall filter
/// passing the same noise power as the measured transfer function.
pub fn equivalent_noise_bandwidth(h_db: &[f64], freqs: &[f64]) -> f64 {
    let linear: Vec<f64> = h_db.iter().map(|v| 10.0_f64.powf(v / 10.0)).collect();
    let max = linear.iter().cloned().fold(f64::MIN, f64::max);
    let df = freqs[1] - freqs[0];
    linear.iter().sum::<f64>() * df / max
}
