//! Linear and bilinear interpolation over irregular axes.

/// Interpolate between (x1, y1) and (x2, y2) at x.
pub fn interpolate_1d(x: f64, x1: f64, x2: f64, y1: f64, y2: f64) -> f64 {
    y1 * (x2 - x) / (x2 - x1) + y2 * (x - x1) / (x2 - x1)
}

/// Bilinear interpolation over the cell (x1, x2) x (y1, y2), with the
/// four corner values z11 = z(x1, y1), z21 = z(x2, y1), z12 = z(x1, y2),
/// z22 = z(x2, y2). Each axis is interpolated independently.
#[allow(clippy::too_many_arguments)]
pub fn interpolate_2d(
    x: f64,
    y: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    z11: f64,
    z21: f64,
    z12: f64,
    z22: f64,
) -> f64 {
    let z_y1 = interpolate_1d(x, x1, x2, z11, z21);
    let z_y2 = interpolate_1d(x, x1, x2, z12, z22);
    interpolate_1d(y, y1, y2, z_y1, z_y2)
}

/// Index of the lower bracket for x in an ascending axis: the largest i
/// such that axis[i] <= x, capped at axis.len() - 2 so that i + 1 is
/// always valid. The caller clamps x into [axis[0], axis[last]] first.
pub fn bracket_index(axis: &[f64], x: f64) -> usize {
    debug_assert!(axis.len() >= 2);
    let mut idx = 0;
    for i in 0..axis.len() - 1 {
        idx = i;
        if axis[i + 1] > x {
            break;
        }
    }
    idx
}

/// Drop samples whose x coordinate exactly repeats an earlier one,
/// keeping the first occurrence. Coinciding samples indicate the
/// hardware tuning resolution has been reached.
pub fn remove_duplicates(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut out_x = Vec::with_capacity(x.len());
    let mut out_y = Vec::with_capacity(y.len());
    for (i, &xi) in x.iter().enumerate() {
        if !out_x.contains(&xi) {
            out_x.push(xi);
            out_y.push(y[i]);
        }
    }
    (out_x, out_y)
}
