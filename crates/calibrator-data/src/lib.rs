//! Calibration data model for SDR receiver calibration.
//!
//! This crate holds the persisted calibration grid (scale factor, noise
//! figure, compression point and equivalent noise bandwidth indexed by
//! sample rate, frequency and gain), the frequency-division list that
//! marks discontinuous bands, the setup correction-factor table, and the
//! discontinuity finder used while a calibration file is being built.
//!
//! Everything in here is pure, synchronous computation over immutable
//! data: the grid is built once from a calibration file and only read
//! afterwards.

pub mod corrections;
pub mod division;
pub mod interp;
pub mod schema;
pub mod store;

pub use corrections::SetupCorrections;
pub use division::{DivisionBounds, NarrowOutcome, NarrowSettings, determine_divisions, narrow_division};
pub use schema::{CalibrationFile, FrequencyDivision, SampleClockPair};
pub use store::{CalPoint, CalibrationStore, Metric};

#[derive(thiserror::Error, Debug)]
pub enum CalError {
    /// I/O error while reading or writing a calibration file.
    #[error("io")]
    Io(#[from] std::io::Error),
    /// The file was not valid JSON or did not match the expected shape.
    #[error("calibration files must be JSON: {0}")]
    Format(#[from] serde_json::Error),
    /// A calibration file with no sample rate rows is unusable.
    #[error("calibration file contains no sample rates")]
    EmptyGrid,
    /// The correction-factor table has no points.
    #[error("correction factor file contains no calibration points")]
    EmptyCorrections,
    /// The requested correction factor name is not in the table.
    #[error("no correction factor named '{0}'")]
    UnknownCorrection(String),
    /// The grid vertex needed for a lookup has no value for the metric.
    #[error("no {metric:?} recorded at sample rate {sample_rate}, frequency {frequency}, gain {gain}")]
    MissingMetric {
        metric: Metric,
        sample_rate: f64,
        frequency: f64,
        gain: f64,
    },
}

/// Result type for operations that may return a `CalError`.
pub type Result<T> = std::result::Result<T, CalError>;
