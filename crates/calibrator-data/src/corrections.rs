//! Frequency-dependent corrections for the passive test setup (cables,
//! splitters, attenuators between the instruments and the receiver).

use std::io::Read;
use std::path::Path;

use crate::interp::{bracket_index, interpolate_1d};
use crate::schema::CorrectionFile;
use crate::{CalError, Result};

/// Correction factors measured at discrete frequencies, interpolated
/// linearly in between and clamped at the boundaries. Unlike the
/// receiver grid there is no fudge factor; a setup loss outside the
/// measured span is simply taken from the nearest point.
pub struct SetupCorrections {
    freqs: Vec<f64>,
    /// factors[point_index] keyed by factor name, parallel to `freqs`.
    factors: Vec<std::collections::BTreeMap<String, f64>>,
}

impl SetupCorrections {
    pub fn load(path: &Path) -> Result<Self> {
        let mut raw = String::new();
        std::fs::File::open(path)?.read_to_string(&mut raw)?;
        let file: CorrectionFile = serde_json::from_str(&raw)?;
        Self::from_file(file)
    }

    pub fn from_file(file: CorrectionFile) -> Result<Self> {
        if file.rf_test_setup_calibration_points.is_empty() {
            return Err(CalError::EmptyCorrections);
        }
        let mut points = file.rf_test_setup_calibration_points;
        points.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        Ok(Self {
            freqs: points.iter().map(|p| p.frequency).collect(),
            factors: points.into_iter().map(|p| p.factors).collect(),
        })
    }

    /// Interpolated correction factor `name` at `frequency`.
    pub fn factor(&self, name: &str, frequency: f64) -> Result<f64> {
        let at = |i: usize| -> Result<f64> {
            self.factors[i]
                .get(name)
                .copied()
                .ok_or_else(|| CalError::UnknownCorrection(name.to_string()))
        };

        if self.freqs.len() == 1 || frequency <= self.freqs[0] {
            return at(0);
        }
        let last = self.freqs.len() - 1;
        if frequency >= self.freqs[last] {
            return at(last);
        }
        let i = bracket_index(&self.freqs, frequency);
        Ok(interpolate_1d(
            frequency,
            self.freqs[i],
            self.freqs[i + 1],
            at(i)?,
            at(i + 1)?,
        ))
    }
}
