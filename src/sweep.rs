//! Sweep axis construction and early-exit trackers for the 3-axis
//! measurement cube.

use calibrator_dsp::fit::{LinearFit, fit_line};

use crate::profile::{ParamKey, Profile};
use crate::{Error, Result};

/// Final ordering of a built axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            other => Err(Error::config(
                10,
                "Invalid sweep sort order",
                format!("sort order must be 'asc' or 'desc', got '{other}'"),
            )),
        }
    }
}

/// The three logical sweep parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepParam {
    Frequency,
    Power,
    Gain,
}

impl SweepParam {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "frequency" => Ok(SweepParam::Frequency),
            "power" => Ok(SweepParam::Power),
            "gain" => Ok(SweepParam::Gain),
            other => Err(Error::config(
                10,
                "Unknown sweep parameter",
                format!("sweep parameter must be frequency/power/gain, got '{other}'"),
            )),
        }
    }
}

/// Each of frequency, power and gain must be assigned to exactly one
/// loop position.
pub fn validate_sweep_order(order: [SweepParam; 3]) -> Result<()> {
    let mut seen = [false; 3];
    for param in order {
        let slot = match param {
            SweepParam::Frequency => 0,
            SweepParam::Power => 1,
            SweepParam::Gain => 2,
        };
        seen[slot] = true;
    }
    if seen != [true; 3] {
        return Err(Error::config(
            10,
            "Parameter sweep order is not valid",
            format!(
                "each of frequency, power and gain must be swept exactly once, got {order:?}; \
                 to hold a parameter fixed, set its num_steps to 0 and the value as an extra"
            ),
        ));
    }
    Ok(())
}

/// Specification of one sweep axis.
#[derive(Debug, Clone, Default)]
pub struct AxisSpec {
    pub min: f64,
    pub max: f64,
    /// Linear step count, taking priority over the spacings below.
    pub lin_steps: Option<usize>,
    pub lin_spacing: Option<f64>,
    pub log_steps: Option<usize>,
    pub extra: Vec<f64>,
    pub order: SortOrder,
}

impl AxisSpec {
    /// Read one axis from the profile. `keys` is the axis parameter
    /// block in declaration order (min, max, num_steps, lin_spacing,
    /// log_steps, extra, order).
    pub fn from_profile(profile: &Profile, keys: [ParamKey; 7]) -> Result<Self> {
        let order = match profile.get(keys[6]) {
            Some(_) => SortOrder::parse(profile.str(keys[6])?)?,
            None => SortOrder::Ascending,
        };
        let extra = match profile.get(keys[5]) {
            Some(_) => profile.float_list(keys[5])?.to_vec(),
            None => Vec::new(),
        };
        Ok(AxisSpec {
            min: profile.float_or(keys[0], 0.0),
            max: profile.float_or(keys[1], 0.0),
            lin_steps: profile.opt_usize(keys[2]),
            lin_spacing: profile.opt_float(keys[3]),
            log_steps: profile.opt_usize(keys[4]),
            extra,
            order,
        })
    }
}

pub const FREQUENCY_AXIS_KEYS: [ParamKey; 7] = [
    ParamKey::SweepFMin,
    ParamKey::SweepFMax,
    ParamKey::SweepFNumSteps,
    ParamKey::SweepFLinSpacing,
    ParamKey::SweepFLogSteps,
    ParamKey::SweepFExtra,
    ParamKey::SweepFOrder,
];

pub const POWER_AXIS_KEYS: [ParamKey; 7] = [
    ParamKey::SweepPMin,
    ParamKey::SweepPMax,
    ParamKey::SweepPNumSteps,
    ParamKey::SweepPLinSpacing,
    ParamKey::SweepPLogSteps,
    ParamKey::SweepPExtra,
    ParamKey::SweepPOrder,
];

pub const GAIN_AXIS_KEYS: [ParamKey; 7] = [
    ParamKey::SweepGMin,
    ParamKey::SweepGMax,
    ParamKey::SweepGNumSteps,
    ParamKey::SweepGLinSpacing,
    ParamKey::SweepGLogSteps,
    ParamKey::SweepGExtra,
    ParamKey::SweepGOrder,
];

/// Build the ordered value list for one sweep axis.
///
/// Exactly one of the three step specifications is expected; when
/// several are set, linear step count wins over linear spacing, which
/// wins over log steps. Extra values are unioned in, exact duplicates
/// removed, and the result sorted by the requested order. An axis with
/// no step specification and no extras is empty.
pub fn create_swept_parameter(spec: &AxisSpec) -> Vec<f64> {
    let mut values: Vec<f64> = if let Some(n) = spec.lin_steps {
        linspace(spec.min, spec.max, n)
    } else if let Some(spacing) = spec.lin_spacing {
        let mut v = Vec::new();
        let mut x = spec.min;
        while x <= spec.max {
            v.push(x);
            x += spacing;
        }
        // Make sure the endpoint is swept even when the spacing does
        // not divide the span.
        if v.last().is_none_or(|&last| last < spec.max) {
            v.push(spec.max);
        }
        v
    } else if let Some(n) = spec.log_steps {
        geomspace(spec.min, spec.max, n)
    } else {
        Vec::new()
    };

    values.extend_from_slice(&spec.extra);
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| a == b);
    if spec.order == SortOrder::Descending {
        values.reverse();
    }
    values
}

fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..n)
            .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

fn geomspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let ratio = max / min;
            (0..n)
                .map(|i| min * ratio.powf(i as f64 / (n - 1) as f64))
                .collect()
        }
    }
}

/// What the compression tracker concluded about the latest sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionCheck {
    /// Not enough samples to establish a linear baseline yet, or the
    /// baseline fit has not settled.
    Collecting,
    /// A linear baseline is established; the sample is consistent.
    Linear,
    /// The device response fell off the baseline; the contained value
    /// is the device power at the compression point.
    Compressed(f64),
}

/// Detects the receiver's compression point during an ascending power
/// sweep at a fixed frequency/gain pair. One tracker instance per
/// pair.
#[derive(Debug)]
pub struct CompressionTracker {
    linearity_steps: usize,
    linearity_threshold: f64,
    compression_threshold: f64,
    measured: Vec<f64>,
    device: Vec<f64>,
    baseline: Option<LinearFit>,
}

impl CompressionTracker {
    pub fn new(
        linearity_steps: usize,
        linearity_threshold: f64,
        compression_threshold: f64,
    ) -> Self {
        Self {
            linearity_steps,
            linearity_threshold,
            compression_threshold,
            measured: Vec::new(),
            device: Vec::new(),
            baseline: None,
        }
    }

    /// Baseline projection of a true input power, once the linear
    /// baseline is established.
    pub fn projection(&self, measured_power: f64) -> Option<f64> {
        self.baseline.as_ref().map(|fit| fit.project(measured_power))
    }

    /// Feed the next (true input power, device-reported power) sample.
    ///
    /// Before a baseline exists, once `linearity_steps` samples are
    /// available a slope-1 line is fitted to the most recent window
    /// and accepted when its R-squared deviates from 1 by at most the
    /// linearity threshold. Afterwards each sample is compared against
    /// the baseline projection; the first deviation beyond the
    /// compression threshold reports the compression point.
    pub fn observe(&mut self, measured_power: f64, device_power: f64) -> CompressionCheck {
        self.measured.push(measured_power);
        self.device.push(device_power);

        if let Some(baseline) = &self.baseline {
            let projected = baseline.project(measured_power);
            let diff = (projected - device_power).abs();
            if diff > self.compression_threshold {
                log::info!(
                    "compression found at {measured_power} dBm input (deviation {diff:.2} dB)"
                );
                return CompressionCheck::Compressed(device_power);
            }
            return CompressionCheck::Linear;
        }

        if self.measured.len() >= self.linearity_steps {
            let start = self.measured.len() - self.linearity_steps;
            let fit = fit_line(
                &self.measured[start..],
                &self.device[start..],
                Some(1.0),
                None,
            );
            if (1.0 - fit.r_squared).abs() <= self.linearity_threshold {
                log::debug!(
                    "linearity achieved, intercept {:.3} dB, r-squared {:.5}",
                    fit.intercept,
                    fit.r_squared
                );
                self.baseline = Some(fit);
                return CompressionCheck::Linear;
            }
        }
        CompressionCheck::Collecting
    }
}

/// Fixes the spurious-free power limit during an ascending power sweep
/// at a fixed frequency/gain pair. The first `danl_num` spur powers
/// average into a noise-floor estimate; the first later sample whose
/// spur power clears the floor by the threshold pins the limit to that
/// sample's input power.
#[derive(Debug)]
pub struct SpurTracker {
    danl_num: usize,
    threshold: f64,
    seen: usize,
    floor: f64,
    limit: Option<f64>,
}

impl SpurTracker {
    pub fn new(danl_num: usize, threshold: f64) -> Self {
        Self {
            danl_num,
            threshold,
            seen: 0,
            floor: 0.0,
            limit: None,
        }
    }

    pub fn observe(&mut self, spur_power: f64, input_power: f64) {
        if self.seen < self.danl_num {
            self.floor += spur_power / self.danl_num as f64;
        } else if self.limit.is_none() && spur_power > self.floor + self.threshold {
            log::info!("spurious free power limit fixed at {input_power} dBm");
            self.limit = Some(input_power);
        }
        self.seen += 1;
    }

    /// The spurious-free limit, once fixed.
    pub fn limit(&self) -> Option<f64> {
        self.limit
    }
}
