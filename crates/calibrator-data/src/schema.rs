//! On-disk calibration file schema.
//!
//! The persisted grid is a nested JSON document: sample rates, each
//! holding frequency rows, each holding gain rows, each holding the
//! calibration metrics measured at that vertex. Entries are expected to
//! be sorted ascending on frequency and gain, and every frequency row
//! under a sample rate is expected to carry the same gain list. Neither
//! property is validated here; the lookup behavior on a non-rectangular
//! grid is undefined.

use serde::{Deserialize, Serialize};

/// A frequency band in which the calibrated quantity is discontinuous,
/// e.g. an internal mixing boundary. Lookups inside [lower, upper) snap
/// to the lower bound instead of interpolating across the jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyDivision {
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// The clock frequency a sample rate was calibrated against. Purely
/// informational: a mismatch against the live clock is logged, never
/// corrected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleClockPair {
    pub sample_rate: f64,
    pub clock_frequency: f64,
}

/// Metrics recorded at one (sample rate, frequency, gain) vertex. All
/// optional: a calibration run only fills in what it measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalDataPoint {
    /// Empirical receiver gain in dB. The scale factor is its negation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_sigan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_figure_sigan: Option<f64>,
    #[serde(rename = "1dB_compression_sigan", skip_serializing_if = "Option::is_none")]
    pub compression_sigan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enbw_sigan: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GainRow {
    pub gain: f64,
    pub calibration_data: CalDataPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GainList {
    pub gains: Vec<GainRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub frequency: f64,
    pub calibration_data: GainList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyList {
    pub frequencies: Vec<FrequencyRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRateRow {
    pub sample_rate: f64,
    pub calibration_data: FrequencyList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRateList {
    pub sample_rates: Vec<SampleRateRow>,
}

/// Top-level calibration file document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    /// Serial number of the calibrated receiver.
    pub sensor_uid: String,
    /// ISO-8601 timestamp of the calibration run.
    pub calibration_datetime: String,
    pub calibration_frequency_divisions: Vec<FrequencyDivision>,
    pub clock_rate_lookup_by_sample_rate: Vec<SampleClockPair>,
    pub calibration_data: SampleRateList,
}

/// One point of the setup/switch correction-factor table: a frequency
/// plus the named S/C-parameter factors measured there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionPoint {
    pub frequency: f64,
    #[serde(flatten)]
    pub factors: std::collections::BTreeMap<String, f64>,
}

/// Setup correction-factor file: a flat list of calibration points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionFile {
    pub rf_test_setup_calibration_points: Vec<CorrectionPoint>,
}
