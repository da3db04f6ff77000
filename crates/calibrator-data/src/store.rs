//! Loaded calibration grid and metric lookup.

use std::io::Read;
use std::path::Path;

use crate::interp::{bracket_index, interpolate_1d, interpolate_2d};
use crate::schema::{CalibrationFile, FrequencyDivision, SampleClockPair};
use crate::{CalError, Result};

/// Which calibration metric a lookup asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ScaleFactor,
    NoiseFigure,
    Compression,
    Enbw,
}

impl Metric {
    fn index(self) -> usize {
        match self {
            Metric::ScaleFactor => 0,
            Metric::NoiseFigure => 1,
            Metric::Compression => 2,
            Metric::Enbw => 3,
        }
    }
}

/// Metrics stored at one grid vertex, already converted to lookup form
/// (the scale factor is the negated empirical gain from the file).
#[derive(Debug, Clone, Copy, Default)]
pub struct CalPoint {
    pub scale_factor: Option<f64>,
    pub noise_figure: Option<f64>,
    pub compression: Option<f64>,
    pub enbw: Option<f64>,
}

impl CalPoint {
    fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ScaleFactor => self.scale_factor,
            Metric::NoiseFigure => self.noise_figure,
            Metric::Compression => self.compression,
            Metric::Enbw => self.enbw,
        }
    }
}

struct RateGrid {
    sample_rate: f64,
    freqs: Vec<f64>,
    /// Gain axis of the first frequency row. The grid is assumed
    /// rectangular; rows are indexed positionally against this axis.
    gains: Vec<f64>,
    /// points[freq_index][gain_index]
    points: Vec<Vec<CalPoint>>,
}

/// An immutable calibration grid answering metric queries by bilinear
/// interpolation, with clamping extrapolation at the boundaries and
/// division-aware frequency snapping.
pub struct CalibrationStore {
    sensor_uid: String,
    calibration_datetime: String,
    divisions: Vec<FrequencyDivision>,
    clock_pairs: Vec<SampleClockPair>,
    rates: Vec<RateGrid>,
    /// Per-metric scalar overrides, for verification runs that force a
    /// known value instead of consulting the grid.
    overrides: [Option<f64>; 4],
}

impl CalibrationStore {
    /// Load a calibration grid from a JSON calibration file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut raw = String::new();
        std::fs::File::open(path)?.read_to_string(&mut raw)?;
        let file: CalibrationFile = serde_json::from_str(&raw)?;
        Self::from_file(file)
    }

    /// Build the store from an already-parsed calibration document.
    pub fn from_file(file: CalibrationFile) -> Result<Self> {
        if file.calibration_data.sample_rates.is_empty() {
            return Err(CalError::EmptyGrid);
        }

        let mut rates = Vec::with_capacity(file.calibration_data.sample_rates.len());
        for sr_row in &file.calibration_data.sample_rates {
            let mut freqs = Vec::new();
            let mut points = Vec::new();
            let mut gains = Vec::new();
            for f_row in &sr_row.calibration_data.frequencies {
                freqs.push(f_row.frequency);
                if gains.is_empty() {
                    gains = f_row.calibration_data.gains.iter().map(|g| g.gain).collect();
                }
                let row: Vec<CalPoint> = f_row
                    .calibration_data
                    .gains
                    .iter()
                    .map(|g| CalPoint {
                        scale_factor: g.calibration_data.gain_sigan.map(|v| -v),
                        noise_figure: g.calibration_data.noise_figure_sigan,
                        compression: g.calibration_data.compression_sigan,
                        enbw: g.calibration_data.enbw_sigan,
                    })
                    .collect();
                points.push(row);
            }
            rates.push(RateGrid {
                sample_rate: sr_row.sample_rate,
                freqs,
                gains,
                points,
            });
        }

        Ok(Self {
            sensor_uid: file.sensor_uid,
            calibration_datetime: file.calibration_datetime,
            divisions: file.calibration_frequency_divisions,
            clock_pairs: file.clock_rate_lookup_by_sample_rate,
            rates,
            overrides: [None; 4],
        })
    }

    pub fn sensor_uid(&self) -> &str {
        &self.sensor_uid
    }

    pub fn calibration_datetime(&self) -> &str {
        &self.calibration_datetime
    }

    pub fn divisions(&self) -> &[FrequencyDivision] {
        &self.divisions
    }

    /// Clock frequency this sample rate was calibrated against, if it
    /// is a calibrated rate.
    pub fn calibrated_clock_frequency(&self, sample_rate: f64) -> Option<f64> {
        self.clock_pairs
            .iter()
            .find(|p| p.sample_rate == sample_rate)
            .map(|p| p.clock_frequency)
    }

    /// Force a metric to a fixed value for every lookup. Used by
    /// verification runs; `None` restores normal grid lookups.
    pub fn set_override(&mut self, metric: Metric, value: Option<f64>) {
        self.overrides[metric.index()] = value;
    }

    /// Look up a metric at (sample_rate, frequency, gain).
    ///
    /// `live_clock` is the receiver's current clock frequency, checked
    /// against the calibrated pairing purely for a warning.
    ///
    /// The sample rate is matched exactly; an uncalibrated rate falls
    /// back to the first calibrated one (a deliberate approximation,
    /// logged). Frequency and gain outside the calibrated range clamp
    /// to the boundary; an out-of-range gain additionally earns a 1:1
    /// fudge factor added after interpolation. A frequency inside a
    /// division band snaps to the band's lower bound.
    pub fn lookup(
        &self,
        metric: Metric,
        sample_rate: f64,
        frequency: f64,
        gain: f64,
        live_clock: Option<f64>,
    ) -> Result<f64> {
        if let Some(forced) = self.overrides[metric.index()] {
            return Ok(forced);
        }

        let grid = match self.rates.iter().find(|r| r.sample_rate == sample_rate) {
            Some(grid) => {
                if let (Some(live), Some(calibrated)) =
                    (live_clock, self.calibrated_clock_frequency(sample_rate))
                {
                    if live != calibrated {
                        log::warn!(
                            "clock frequency {live} Hz does not match calibrated {calibrated} Hz, proceeding with calibrated pairing"
                        );
                    }
                }
                grid
            }
            None => {
                let first = &self.rates[0];
                log::warn!(
                    "sample rate {sample_rate} Hz was not a calibration point, assuming calibration for {} Hz",
                    first.sample_rate
                );
                first
            }
        };

        // Frequency axis: clamp outside the range, snap inside a division.
        let mut f = frequency;
        let freqs = &grid.freqs;
        let f_i;
        let mut bypass_freq = true;
        if freqs.len() == 1 || f < freqs[0] {
            if f < freqs[0] {
                log::warn!(
                    "frequency {f} Hz below calibration range, assuming {} Hz",
                    freqs[0]
                );
            }
            f_i = 0;
        } else if f > freqs[freqs.len() - 1] {
            log::warn!(
                "frequency {f} Hz above calibration range, assuming {} Hz",
                freqs[freqs.len() - 1]
            );
            f_i = freqs.len() - 1;
        } else {
            bypass_freq = false;
            for div in &self.divisions {
                if f > div.lower_bound && f < div.upper_bound {
                    log::info!(
                        "frequency {f} Hz is within division [{}, {}], snapping to lower bound",
                        div.lower_bound,
                        div.upper_bound
                    );
                    // Interpolation will land exactly on the bound.
                    f = div.lower_bound;
                }
            }
            f_i = bracket_index(freqs, f);
        }

        // Gain axis: clamp with a 1:1 fudge factor outside the range.
        let gains = &grid.gains;
        let g_i;
        let mut g_fudge = 0.0;
        let mut bypass_gain = true;
        if gains.len() == 1 || gain < gains[0] {
            if gain < gains[0] {
                g_fudge = gains[0] - gain;
                log::warn!(
                    "gain {gain} dB below calibration range, assuming {} dB with fudge factor {g_fudge} dB",
                    gains[0]
                );
            }
            g_i = 0;
        } else if gain > gains[gains.len() - 1] {
            g_i = gains.len() - 1;
            g_fudge = gains[g_i] - gain;
            log::warn!(
                "gain {gain} dB above calibration range, assuming {} dB with fudge factor {g_fudge} dB",
                gains[g_i]
            );
        } else {
            bypass_gain = false;
            g_i = bracket_index(gains, gain);
        }

        let vertex = |fi: usize, gi: usize| -> Result<f64> {
            grid.points[fi][gi]
                .metric(metric)
                .ok_or(CalError::MissingMetric {
                    metric,
                    sample_rate: grid.sample_rate,
                    frequency: freqs[fi],
                    gain: gains[gi],
                })
        };

        let value = if bypass_gain && bypass_freq {
            vertex(f_i, g_i)?
        } else if bypass_freq {
            interpolate_1d(
                gain,
                gains[g_i],
                gains[g_i + 1],
                vertex(f_i, g_i)?,
                vertex(f_i, g_i + 1)?,
            )
        } else if bypass_gain {
            interpolate_1d(
                f,
                freqs[f_i],
                freqs[f_i + 1],
                vertex(f_i, g_i)?,
                vertex(f_i + 1, g_i)?,
            )
        } else {
            interpolate_2d(
                f,
                gain,
                freqs[f_i],
                freqs[f_i + 1],
                gains[g_i],
                gains[g_i + 1],
                vertex(f_i, g_i)?,
                vertex(f_i + 1, g_i)?,
                vertex(f_i, g_i + 1)?,
                vertex(f_i + 1, g_i + 1)?,
            )
        };

        Ok(value + g_fudge)
    }
}
