//! Linear fits for linearity checks.

/// A fitted line with its goodness of fit.
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn project(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Least-squares line through the points, with either coefficient
/// optionally pinned. Compression detection pins the slope to 1 and
/// fits only the intercept, so a compressing last point drags the fit
/// quality down instead of tilting the line.
pub fn fit_line(
    x: &[f64],
    y: &[f64],
    pin_slope: Option<f64>,
    pin_intercept: Option<f64>,
) -> LinearFit {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len() as f64;
    let (slope, intercept) = match (pin_slope, pin_intercept) {
        (Some(m), Some(b)) => (m, b),
        (Some(m), None) => {
            let b = x.iter().zip(y).map(|(xi, yi)| yi - m * xi).sum::<f64>() / n;
            (m, b)
        }
        (None, Some(b)) => {
            let num: f64 = x.iter().zip(y).map(|(xi, yi)| xi * (yi - b)).sum();
            let den: f64 = x.iter().map(|xi| xi * xi).sum();
            (num / den, b)
        }
        (None, None) => {
            let x_bar = x.iter().sum::<f64>() / n;
            let y_bar = y.iter().sum::<f64>() / n;
            let num: f64 = x
                .iter()
                .zip(y)
                .map(|(xi, yi)| (xi - x_bar) * (yi - y_bar))
                .sum();
            let den: f64 = x.iter().map(|xi| (xi - x_bar) * (xi - x_bar)).sum();
            let m = num / den;
            (m, y_bar - m * x_bar)
        }
    };

    let y_bar = y.iter().sum::<f64>() / n;
    let ss_tot: f64 = y.iter().map(|yi| (yi - y_bar) * (yi - y_bar)).sum();
    let ss_reg: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum();
    LinearFit {
        slope,
        intercept,
        r_squared: 1.0 - ss_reg / ss_tot,
    }
}
