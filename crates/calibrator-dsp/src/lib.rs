//! Signal processing used by the calibration procedures.
//!
//! Everything here works on baseband IQ captures in volts across a
//! 50 ohm system and reports powers in dBm, so results are directly
//! comparable with instrument readings.

pub mod bandwidth;
pub mod fft;
pub mod fit;
pub mod power;
pub mod window;

pub use bandwidth::{db_bandwidth, db_transfer_function, equivalent_noise_bandwidth};
pub use fft::{averaged_dbm_fft, dbm_fft, normalize_dbm_fft, peak};
pub use fit::{LinearFit, fit_line};
pub use power::{
    bins_for_resolution, freq_domain_integrated_power_dbm, lin_v_to_dbm_factor,
    scale_iq_by_power_db, time_domain_power_dbm,
};
pub use window::{WindowKind, window_power_db};
