//! Typed test profile with scoped overlays.
//!
//! Every tunable of a calibration run lives in a [`Profile`]: a map
//! from statically known [`ParamKey`]s to loosely typed [`Value`]s.
//! Procedures fill defaults, force parameters they own, and run their
//! dependency tests under a pushed overlay that is popped afterwards,
//! restoring exactly the prior state.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Every profile parameter the procedures know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKey {
    // Frequency sweep axis
    SweepFMin,
    SweepFMax,
    SweepFNumSteps,
    SweepFLinSpacing,
    SweepFLogSteps,
    SweepFExtra,
    SweepFOrder,
    // Power sweep axis
    SweepPMin,
    SweepPMax,
    SweepPNumSteps,
    SweepPLinSpacing,
    SweepPLogSteps,
    SweepPExtra,
    SweepPOrder,
    // Gain sweep axis
    SweepGMin,
    SweepGMax,
    SweepGNumSteps,
    SweepGLinSpacing,
    SweepGLogSteps,
    SweepGExtra,
    SweepGOrder,
    // Sweep cube loop assignment
    SweepOrder1st,
    SweepOrder2nd,
    SweepOrder3rd,
    // Single-point settings
    FreqF0,
    FreqCwOffset,
    SdrGain,
    PowerLevel,
    // Receiver
    SdrSamplingFrequency,
    SdrClockFrequency,
    SdrSettleTime,
    SdrPowerScaleFactor,
    // FFT settings
    FftNumberOfBins,
    FftMinimumFrequencyResolution,
    FftWindow,
    FftAveragingNumber,
    // Stimulus
    PowerStimulus,
    PowerLevelMode,
    PowerBasePower,
    PowerVerification,
    PowerSettleTime,
    SwitchCorrectionFile,
    // Generic measurement
    TestMeasurementMethod,
    TestNumberOfSamples,
    TestConditioningSamples,
    // Compression early exit
    TestCheckForCompression,
    TestCompressionMeasurementMethod,
    TestCompressionThreshold,
    TestCompressionLinearitySteps,
    TestCompressionLinearityThreshold,
    // Spur early exit
    TestMeasureSpurPower,
    TestSpurDanlNum,
    TestSpurThreshold,
    TestSpurRemoveRanges,
    // Division finding
    TestFindDivisions,
    TestKnownDivisions,
    TestDivisionSlopeAveragingFactor,
    TestDivisionSlopeRatioThreshold,
    TestDivisionResolution,
    TestDivisionNarrowingNum,
    TestDivisionNarrowingBuffer,
    TestDivisionNarrowingThreshold,
    // Bandwidth measurement
    BandwidthToMeasure,
    BandwidthSteps,
    // Calibrate orchestration
    CalMeasureScaleFactor,
    CalMeasureNoiseFigure,
    CalMeasureEnbws,
    CalMeasureCompression,
    CalSampleRates,
    CalClockFrequencies,
    CalScaleFactorPowerLevel,
    CalNoiseFigureInputPower,
    CalNoiseFigureEnbws,
    CalEnbwFrequency,
    CalEnbwGain,
    CalEnbwPowerLevel,
    CalEnbwBandStretch,
    CalEnbwTransferFunctionPoints,
    CalCompressionMinPower,
    CalCompressionMaxPower,
    CalCompressionPowerStep,
    CalCompressionDecimateFrequencies,
    CalCompressionDecimateGains,
    CalCompressionSkipSampleRateCycling,
    CalOutputPath,
}

impl ParamKey {
    pub fn name(self) -> &'static str {
        // Names follow the profile-file vocabulary.
        match self {
            ParamKey::SweepFMin => "sweep_f_min",
            ParamKey::SweepFMax => "sweep_f_max",
            ParamKey::SweepFNumSteps => "sweep_f_num_steps",
            ParamKey::SweepFLinSpacing => "sweep_f_lin_spacing",
            ParamKey::SweepFLogSteps => "sweep_f_log_steps",
            ParamKey::SweepFExtra => "sweep_f_extra",
            ParamKey::SweepFOrder => "sweep_f_order",
            ParamKey::SweepPMin => "sweep_p_min",
            ParamKey::SweepPMax => "sweep_p_max",
            ParamKey::SweepPNumSteps => "sweep_p_num_steps",
            ParamKey::SweepPLinSpacing => "sweep_p_lin_spacing",
            ParamKey::SweepPLogSteps => "sweep_p_log_steps",
            ParamKey::SweepPExtra => "sweep_p_extra",
            ParamKey::SweepPOrder => "sweep_p_order",
            ParamKey::SweepGMin => "sweep_g_min",
            ParamKey::SweepGMax => "sweep_g_max",
            ParamKey::SweepGNumSteps => "sweep_g_num_steps",
            ParamKey::SweepGLinSpacing => "sweep_g_lin_spacing",
            ParamKey::SweepGLogSteps => "sweep_g_log_steps",
            ParamKey::SweepGExtra => "sweep_g_extra",
            ParamKey::SweepGOrder => "sweep_g_order",
            ParamKey::SweepOrder1st => "sweep_order_1st",
            ParamKey::SweepOrder2nd => "sweep_order_2nd",
            ParamKey::SweepOrder3rd => "sweep_order_3rd",
            ParamKey::FreqF0 => "freq_f0",
            ParamKey::FreqCwOffset => "freq_cw_offset",
            ParamKey::SdrGain => "sdr_gain",
            ParamKey::PowerLevel => "power_level",
            ParamKey::SdrSamplingFrequency => "sdr_sampling_frequency",
            ParamKey::SdrClockFrequency => "sdr_clock_frequency",
            ParamKey::SdrSettleTime => "sdr_settle_time",
            ParamKey::SdrPowerScaleFactor => "sdr_power_scale_factor",
            ParamKey::FftNumberOfBins => "fft_number_of_bins",
            ParamKey::FftMinimumFrequencyResolution => "fft_minimum_frequency_resolution",
            ParamKey::FftWindow => "fft_window",
            ParamKey::FftAveragingNumber => "fft_averaging_number",
            ParamKey::PowerStimulus => "power_stimulus",
            ParamKey::PowerLevelMode => "power_level_mode",
            ParamKey::PowerBasePower => "power_base_power",
            ParamKey::PowerVerification => "power_verification",
            ParamKey::PowerSettleTime => "power_settle_time",
            ParamKey::SwitchCorrectionFile => "switch_correction_factor_file",
            ParamKey::TestMeasurementMethod => "test_measurement_method",
            ParamKey::TestNumberOfSamples => "test_number_of_samples",
            ParamKey::TestConditioningSamples => "test_conditioning_samples",
            ParamKey::TestCheckForCompression => "test_check_for_compression",
            ParamKey::TestCompressionMeasurementMethod => "test_compression_measurement_method",
            ParamKey::TestCompressionThreshold => "test_compression_threshold",
            ParamKey::TestCompressionLinearitySteps => "test_compression_linearity_steps",
            ParamKey::TestCompressionLinearityThreshold => "test_compression_linearity_threshold",
            ParamKey::TestMeasureSpurPower => "test_measure_spur_power",
            ParamKey::TestSpurDanlNum => "test_spur_danl_num",
            ParamKey::TestSpurThreshold => "test_spur_threshold",
            ParamKey::TestSpurRemoveRanges => "test_spur_remove_ranges",
            ParamKey::TestFindDivisions => "test_find_divisions",
            ParamKey::TestKnownDivisions => "test_known_divisions",
            ParamKey::TestDivisionSlopeAveragingFactor => "test_division_slope_averaging_factor",
            ParamKey::TestDivisionSlopeRatioThreshold => "test_division_slope_ratio_threshold",
            ParamKey::TestDivisionResolution => "test_division_resolution",
            ParamKey::TestDivisionNarrowingNum => "test_division_narrowing_num",
            ParamKey::TestDivisionNarrowingBuffer => "test_division_narrowing_buffer",
            ParamKey::TestDivisionNarrowingThreshold => "test_division_narrowing_threshold",
            ParamKey::BandwidthToMeasure => "test_bandwidth_to_measure",
            ParamKey::BandwidthSteps => "test_bandwidth_steps",
            ParamKey::CalMeasureScaleFactor => "cal_measure_scale_factor",
            ParamKey::CalMeasureNoiseFigure => "cal_measure_noise_figure",
            ParamKey::CalMeasureEnbws => "cal_measure_enbws",
            ParamKey::CalMeasureCompression => "cal_measure_compression",
            ParamKey::CalSampleRates => "cal_sample_rates",
            ParamKey::CalClockFrequencies => "cal_clock_frequencies",
            ParamKey::CalScaleFactorPowerLevel => "cal_scale_factor_power_level",
            ParamKey::CalNoiseFigureInputPower => "cal_noise_figure_input_power",
            ParamKey::CalNoiseFigureEnbws => "cal_noise_figure_enbws",
            ParamKey::CalEnbwFrequency => "cal_enbw_frequency",
            ParamKey::CalEnbwGain => "cal_enbw_gain",
            ParamKey::CalEnbwPowerLevel => "cal_enbw_power_level",
            ParamKey::CalEnbwBandStretch => "cal_enbw_band_stretch",
            ParamKey::CalEnbwTransferFunctionPoints => "cal_enbw_transfer_function_points",
            ParamKey::CalCompressionMinPower => "cal_compression_min_power",
            ParamKey::CalCompressionMaxPower => "cal_compression_max_power",
            ParamKey::CalCompressionPowerStep => "cal_compression_power_step",
            ParamKey::CalCompressionDecimateFrequencies => "cal_compression_decimate_frequencies",
            ParamKey::CalCompressionDecimateGains => "cal_compression_decimate_gains",
            ParamKey::CalCompressionSkipSampleRateCycling => {
                "cal_compression_skip_sample_rate_cycling"
            }
            ParamKey::CalOutputPath => "cal_output_path",
        }
    }
}

/// Parameter values. `Bool(false)` doubles as "feature disabled" for
/// axis-step and functionality parameters, matching profile-file
/// conventions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    FloatList(Vec<f64>),
    PairList(Vec<(f64, f64)>),
}

type Frame = Vec<(ParamKey, Option<Value>)>;

/// The profile itself: current parameter values plus a stack of
/// overlay frames recording what each push replaced.
#[derive(Debug, Default)]
pub struct Profile {
    values: BTreeMap<ParamKey, Value>,
    frames: Vec<Frame>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: ParamKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn get(&self, key: ParamKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn set(&mut self, key: ParamKey, value: Value) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: ParamKey) -> Option<Value> {
        self.values.remove(&key)
    }

    /// Set only if the key is currently absent.
    pub fn set_default(&mut self, key: ParamKey, value: Value) {
        self.values.entry(key).or_insert(value);
    }

    /// Unconditionally overwrite, logging when a caller value is lost.
    pub fn force(&mut self, key: ParamKey, value: Value) {
        if let Some(old) = self.values.get(&key) {
            if *old != value {
                log::debug!("forcing {} to {value:?} (was {old:?})", key.name());
            }
        }
        self.values.insert(key, value);
    }

    /// Apply an overlay, snapshotting the prior value of every key so
    /// the matching [`Profile::pop_overlay`] can restore it. A key
    /// absent before the push is absent again after the pop.
    pub fn push_overlay(&mut self, overlay: Vec<(ParamKey, Value)>) {
        let mut frame = Frame::with_capacity(overlay.len());
        for (key, value) in overlay {
            frame.push((key, self.values.get(&key).cloned()));
            self.values.insert(key, value);
        }
        self.frames.push(frame);
    }

    /// Revert the most recent overlay. Calling without a matching push
    /// is a bug in the caller and does nothing.
    pub fn pop_overlay(&mut self) {
        let Some(frame) = self.frames.pop() else {
            log::error!("overlay pop without a matching push");
            return;
        };
        for (key, prior) in frame.into_iter().rev() {
            match prior {
                Some(value) => self.values.insert(key, value),
                None => self.values.remove(&key),
            };
        }
    }

    // Typed accessors. Missing keys and type mismatches are
    // configuration errors: the definitions check should have caught
    // a missing required parameter before any accessor runs.

    pub fn float(&self, key: ParamKey) -> Result<f64> {
        match self.values.get(&key) {
            Some(Value::Float(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as f64),
            Some(other) => Err(wrong_type(key, "a number", other)),
            None => Err(missing(key)),
        }
    }

    pub fn int(&self, key: ParamKey) -> Result<i64> {
        match self.values.get(&key) {
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(wrong_type(key, "an integer", other)),
            None => Err(missing(key)),
        }
    }

    pub fn usize(&self, key: ParamKey) -> Result<usize> {
        Ok(self.int(key)? as usize)
    }

    pub fn str(&self, key: ParamKey) -> Result<&str> {
        match self.values.get(&key) {
            Some(Value::Str(v)) => Ok(v),
            Some(other) => Err(wrong_type(key, "a string", other)),
            None => Err(missing(key)),
        }
    }

    pub fn float_list(&self, key: ParamKey) -> Result<&[f64]> {
        match self.values.get(&key) {
            Some(Value::FloatList(v)) => Ok(v),
            Some(other) => Err(wrong_type(key, "a list of numbers", other)),
            None => Err(missing(key)),
        }
    }

    pub fn pair_list(&self, key: ParamKey) -> Result<&[(f64, f64)]> {
        match self.values.get(&key) {
            Some(Value::PairList(v)) => Ok(v),
            Some(other) => Err(wrong_type(key, "a list of pairs", other)),
            None => Err(missing(key)),
        }
    }

    /// True only when the key holds `Bool(true)`. Absent keys and
    /// disabled markers read as false.
    pub fn flag(&self, key: ParamKey) -> bool {
        matches!(self.values.get(&key), Some(Value::Bool(true)))
    }

    /// True when a feature parameter is present and not explicitly
    /// disabled with `Bool(false)`. Stimulus selection, for example,
    /// holds a mode string when enabled.
    pub fn enabled(&self, key: ParamKey) -> bool {
        match self.values.get(&key) {
            None | Some(Value::Bool(false)) => false,
            Some(_) => true,
        }
    }

    /// Numeric value of an optional parameter, treating an absent key
    /// or a `Bool(false)` disabled marker as unset.
    pub fn opt_float(&self, key: ParamKey) -> Option<f64> {
        match self.values.get(&key) {
            Some(Value::Float(v)) => Some(*v),
            Some(Value::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn opt_usize(&self, key: ParamKey) -> Option<usize> {
        match self.values.get(&key) {
            Some(Value::Int(v)) if *v > 0 => Some(*v as usize),
            _ => None,
        }
    }

    /// Float with a fallback for absent keys.
    pub fn float_or(&self, key: ParamKey, default: f64) -> f64 {
        self.opt_float(key).unwrap_or(default)
    }
}

fn missing(key: ParamKey) -> Error {
    Error::config(
        5,
        "Required parameter missing",
        format!("the profile parameter '{}' is not set", key.name()),
    )
}

fn wrong_type(key: ParamKey, expected: &str, got: &Value) -> Error {
    Error::config(
        6,
        "Profile parameter has the wrong type",
        format!("'{}' must be {expected}, got {got:?}", key.name()),
    )
}
