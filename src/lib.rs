//! Automated RF receiver calibration.
//!
//! Drives a signal generator, power meter, attenuator and RF switch
//! through frequency/gain/power sweeps against a receiver under test,
//! distills the measurements into a calibration grid (scale factor,
//! noise figure, compression point, equivalent noise bandwidth), and
//! consumes that grid at measurement time through
//! [`calibrator_data::CalibrationStore`].
//!
//! The measurement procedures in [`test`] compose into a dependency
//! tree: a top-level procedure runs its children with temporary
//! profile overlays that are reverted afterwards, all sharing one
//! equipment bench owned by [`test::run_profile`].

pub mod equipment;
pub mod profile;
pub mod sweep;
pub mod test;

use crate::equipment::EquipmentError;

/// Numeric code offset for configuration errors.
const CONFIG_CODE_OFFSET: u32 = 100;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Fatal configuration problem, formatted as (code, head, body).
    #[error("configuration error {code}: {head}")]
    Config { code: u32, head: String, body: String },
    #[error(transparent)]
    Equipment(#[from] EquipmentError),
    #[error(transparent)]
    CalData(#[from] calibrator_data::CalError),
    #[error("io")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Configuration error with the test-layer code offset applied.
    pub fn config(code: u32, head: impl Into<String>, body: impl Into<String>) -> Self {
        Error::Config {
            code: CONFIG_CODE_OFFSET + code,
            head: head.into(),
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
