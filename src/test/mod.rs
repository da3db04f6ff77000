//! The test-composition framework.
//!
//! A measurement procedure is a [`Procedure`]: declarative
//! [`TestDefinitions`] (required parameters, equipment and children)
//! plus `check_profile`/`run`/`save_data` strategy methods. Parents
//! hold their dependency procedures as fields and invoke them through
//! [`run_dependency_test`], which overlays the profile for the call
//! and reverts it afterwards.
//!
//! [`run_profile`] is the root driver: it builds the requested
//! procedure from the registry, profile-checks it, verifies and
//! connects the bench, runs, and powers the bench down on every exit
//! path.


pub use bandwidth::Bandwidth;
pub use calibrate::Calibrate;
pub use power_measurement::PowerMeasurement;
pub use scale_factor::ScaleFactor;
pub use swept_power::SweptPowerMeasurement;

use std::thread;
use std::time::Duration;

use calibrator_data::store::Metric;
use calibrator_data::{CalibrationStore, SetupCorrections};
use rustfft::num_complex::Complex64;

use crate::equipment::{Bench, EquipmentKind};
use crate::profile::{ParamKey, Profile, Value};
use crate::{Error, Result};

/// Registry of every runnable procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    PowerMeasurement,
    SweptPowerMeasurement,
    ScaleFactor,
    Bandwidth,
    Calibrate,
}

impl TestKind {
    pub fn name(self) -> &'static str {
        match self {
            TestKind::PowerMeasurement => "power_measurement",
            TestKind::SweptPowerMeasurement => "swept_power_measurement",
            TestKind::ScaleFactor => "scale_factor",
            TestKind::Bandwidth => "bandwidth",
            TestKind::Calibrate => "calibrate",
        }
    }
}

/// Instantiate a procedure by kind.
pub fn build(kind: TestKind) -> Box<dyn Procedure> {
    match kind {
        TestKind::PowerMeasurement => Box::new(PowerMeasurement::new()),
        TestKind::SweptPowerMeasurement => Box::new(SweptPowerMeasurement::new()),
        TestKind::ScaleFactor => Box::new(ScaleFactor::new()),
        TestKind::Bandwidth => Box::new(Bandwidth::new()),
        TestKind::Calibrate => Box::new(Calibrate::new()),
    }
}

/// Optional behaviors a procedure can support; each expands into extra
/// requirements when the profile enables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Functionality {
    /// CW stimulus through the signal generator.
    Stimulus,
    /// Stimulus power verification through meter and switch.
    VerifyPower,
}

/// Declarative requirements of one procedure.
#[derive(Debug, Clone, Default)]
pub struct TestDefinitions {
    pub required_tests: Vec<TestKind>,
    pub required_parameters: Vec<ParamKey>,
    pub required_equipment: Vec<EquipmentKind>,
    pub possible_functionality: Vec<Functionality>,
    pub parameter_defaults: Vec<(ParamKey, Value)>,
    pub forced_parameters: Vec<(ParamKey, Value)>,
}

fn union<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

fn overwrite(dst: &mut Vec<(ParamKey, Value)>, src: &[(ParamKey, Value)]) {
    for (key, value) in src {
        match dst.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => dst.push((*key, value.clone())),
        }
    }
}

impl TestDefinitions {
    /// Union another set of definitions into this one: lists union,
    /// defaults and forced values overwrite per key. Idempotent.
    pub fn merge(&mut self, other: &TestDefinitions) {
        union(&mut self.required_tests, &other.required_tests);
        union(&mut self.required_parameters, &other.required_parameters);
        union(&mut self.required_equipment, &other.required_equipment);
        union(
            &mut self.possible_functionality,
            &other.possible_functionality,
        );
        overwrite(&mut self.parameter_defaults, &other.parameter_defaults);
        overwrite(&mut self.forced_parameters, &other.forced_parameters);
    }
}

/// Apply a procedure's definitions to the profile and verify it.
///
/// Order matters: forced parameters overwrite caller values, defaults
/// fill gaps, enabled functionality expands into extra requirements,
/// and only then is every required parameter checked, failing on the
/// first missing one. Returns the expanded equipment requirements for
/// the bench check.
pub fn apply_definitions(
    defs: &TestDefinitions,
    profile: &mut Profile,
) -> Result<Vec<EquipmentKind>> {
    for (key, value) in &defs.forced_parameters {
        profile.force(*key, value.clone());
    }
    for (key, value) in &defs.parameter_defaults {
        profile.set_default(*key, value.clone());
    }

    let mut required_parameters = defs.required_parameters.clone();
    let mut required_equipment = defs.required_equipment.clone();
    for functionality in &defs.possible_functionality {
        match functionality {
            Functionality::Stimulus if profile.enabled(ParamKey::PowerStimulus) => {
                union(&mut required_equipment, &[EquipmentKind::SignalGenerator]);
                union(&mut required_parameters, &[ParamKey::PowerLevel]);
                if profile.get(ParamKey::PowerLevelMode).is_some()
                    && profile.str(ParamKey::PowerLevelMode)? == "attenuator"
                {
                    union(&mut required_equipment, &[EquipmentKind::Attenuator]);
                    union(&mut required_parameters, &[ParamKey::PowerBasePower]);
                }
            }
            Functionality::VerifyPower if profile.flag(ParamKey::PowerVerification) => {
                union(
                    &mut required_equipment,
                    &[EquipmentKind::PowerMeter, EquipmentKind::RfSwitch],
                );
            }
            _ => {}
        }
    }

    for key in &required_parameters {
        if !profile.contains(*key) {
            return Err(Error::config(
                5,
                "Required parameter missing",
                format!("the profile parameter '{}' is not set", key.name()),
            ));
        }
    }
    Ok(required_equipment)
}

/// A runnable measurement procedure.
pub trait Procedure {
    fn kind(&self) -> TestKind;

    fn definitions(&self) -> TestDefinitions;

    /// Apply and verify this procedure's definitions, then recurse
    /// into its dependency procedures. Returns the union of all
    /// equipment requirements.
    fn check_profile(&mut self, profile: &mut Profile) -> Result<Vec<EquipmentKind>>;

    fn run(&mut self, ctx: &mut TestContext) -> Result<()>;

    /// Persist results. Separate from `run` so a parent can rerun a
    /// dependency many times and save once.
    fn save_data(&mut self, _ctx: &mut TestContext) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("kind", &self.kind().name())
            .finish()
    }
}

/// Run a dependency procedure under a temporary profile overlay.
///
/// The overlay is applied before the run and reverted afterwards on
/// both the success and error paths; a key absent before the call is
/// absent again after it.
pub fn run_dependency_test(
    child: &mut dyn Procedure,
    ctx: &mut TestContext,
    overlay: Vec<(ParamKey, Value)>,
) -> Result<()> {
    log::debug!("running dependency test '{}'", child.kind().name());
    ctx.profile.push_overlay(overlay);
    let result = child.run(ctx);
    ctx.profile.pop_overlay();
    result
}

/// Shared state handed down the procedure tree: the profile, the
/// bench, an optional calibration grid for corrected readings, and
/// optional setup correction factors for the passive path to the
/// power meter.
pub struct TestContext<'a> {
    pub profile: &'a mut Profile,
    pub bench: &'a mut Bench,
    pub cal: Option<&'a CalibrationStore>,
    pub corrections: Option<SetupCorrections>,
}

impl TestContext<'_> {
    fn settle(&self, key: ParamKey) {
        let seconds = self.profile.float_or(key, 0.0);
        if seconds > 0.0 {
            thread::sleep(Duration::from_secs_f64(seconds));
        }
    }

    /// Switch the receiver to a sample rate / clock frequency pair and
    /// let it settle.
    pub fn configure_sample_rate(&mut self, sample_rate: f64, clock_frequency: f64) -> Result<()> {
        log::info!("setting clock frequency to {clock_frequency} Hz");
        self.bench.sdr.set_clock_frequency(clock_frequency)?;
        log::info!("setting sample rate to {sample_rate} Hz");
        self.bench.sdr.set_sampling_frequency(sample_rate)?;
        self.settle(ParamKey::SdrSettleTime);
        Ok(())
    }

    /// Tune the receiver and report the realized LO/DSP pair.
    pub fn tune_sdr(&mut self, frequency: f64) -> Result<crate::equipment::TunedFrequencies> {
        let tuned = self.bench.sdr.tune(frequency)?;
        log::debug!(
            "tuned to {} Hz (lo {} Hz, dsp {} Hz)",
            tuned.center(),
            tuned.lo,
            tuned.dsp
        );
        self.settle(ParamKey::SdrSettleTime);
        Ok(tuned)
    }

    fn siggen(&mut self) -> Result<&mut Box<dyn crate::equipment::SignalGenerator>> {
        self.bench.siggen.as_mut().ok_or_else(|| {
            Error::config(
                7,
                "Required equipment missing",
                "the profile enables a CW stimulus but no signal generator is on the bench",
            )
        })
    }

    /// Point the stimulus at `frequency` with `power` dBm at the
    /// receiver input. In attenuator mode the generator stays at its
    /// base power and the attenuator absorbs the difference.
    pub fn setup_stimulus(&mut self, frequency: f64, power: f64) -> Result<()> {
        let attenuator_mode = self.profile.get(ParamKey::PowerLevelMode).is_some()
            && self.profile.str(ParamKey::PowerLevelMode)? == "attenuator";
        if attenuator_mode {
            let base = self.profile.float(ParamKey::PowerBasePower)?;
            self.siggen()?.tune(frequency)?;
            self.siggen()?.set_power(base)?;
            let attenuator = self.bench.attenuator.as_mut().ok_or_else(|| {
                Error::config(
                    7,
                    "Required equipment missing",
                    "attenuator power mode requires an attenuator on the bench",
                )
            })?;
            attenuator.set_attenuation(base - power)?;
        } else {
            self.siggen()?.tune(frequency)?;
            self.siggen()?.set_power(power)?;
        }
        Ok(())
    }

    pub fn stimulus_on(&mut self) -> Result<()> {
        self.siggen()?.rf_on()?;
        self.settle(ParamKey::PowerSettleTime);
        Ok(())
    }

    pub fn stimulus_off(&mut self) -> Result<()> {
        self.siggen()?.rf_off()?;
        Ok(())
    }

    /// Route the stimulus to the meter, read it, and route it back.
    pub fn verify_power(&mut self, frequency: f64) -> Result<f64> {
        let (Some(switch), Some(meter)) = (
            self.bench.switch.as_mut(),
            self.bench.power_meter.as_mut(),
        ) else {
            return Err(Error::config(
                7,
                "Required equipment missing",
                "power verification requires a power meter and an RF switch on the bench",
            ));
        };
        switch.select_meter()?;
        meter.tune(frequency)?;
        let mut measured = meter.take_measurement()?;
        switch.select_sdr()?;
        if let Some(corrections) = &self.corrections {
            // C23 is the switch-to-meter path loss from the setup
            // correction file.
            let factor = corrections.factor("C23", frequency)?;
            log::debug!("applying setup correction factor {factor} dB");
            measured += factor;
        }
        log::debug!("verified stimulus power: {measured} dBm");
        Ok(measured)
    }

    /// Capture IQ samples with the configured scale factor applied.
    ///
    /// The factor is the fixed profile offset plus, when a calibration
    /// grid is loaded, its scale factor at the current operating
    /// point.
    pub fn acquire(
        &mut self,
        count: usize,
        frequency: f64,
        gain: f64,
    ) -> Result<Vec<Complex64>> {
        let conditioning = self
            .profile
            .opt_usize(ParamKey::TestConditioningSamples)
            .unwrap_or(0);
        let mut samples = self.bench.sdr.take_iq_samples(count, conditioning)?;

        let mut scale_factor = self.profile.float_or(ParamKey::SdrPowerScaleFactor, 0.0);
        if let Some(cal) = self.cal {
            scale_factor += cal.lookup(
                Metric::ScaleFactor,
                self.bench.sdr.sampling_frequency(),
                frequency,
                gain,
                Some(self.bench.sdr.clock_frequency()),
            )?;
        }
        if scale_factor != 0.0 {
            calibrator_dsp::power::scale_iq_by_power_db(&mut samples, scale_factor);
        }
        Ok(samples)
    }
}

/// The three scalar power estimators a profile can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMethod {
    TimeDomainAveraged,
    FreqDomainIntegrated,
    NormalizedFftMaximum,
}

impl MeasurementMethod {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "time_domain_averaged_power" => Ok(MeasurementMethod::TimeDomainAveraged),
            "freq_domain_integrated_power" => Ok(MeasurementMethod::FreqDomainIntegrated),
            "normalized_fft_maximum_power" => Ok(MeasurementMethod::NormalizedFftMaximum),
            other => Err(Error::config(
                10,
                "Invalid power measurement method",
                format!(
                    "power measurement method '{other}' not supported; choose from \
                     time_domain_averaged_power, freq_domain_integrated_power, \
                     normalized_fft_maximum_power"
                ),
            )),
        }
    }
}

/// Run a procedure end to end against a bench.
///
/// The bench is verified against the expanded equipment requirements,
/// connected, and powered down on every exit path. The procedure is
/// returned so the caller can read its results.
pub fn run_profile(
    kind: TestKind,
    profile: &mut Profile,
    bench: &mut Bench,
    cal: Option<&CalibrationStore>,
) -> Result<Box<dyn Procedure>> {
    let mut procedure = build(kind);
    log::info!("running test '{}'", kind.name());

    let required_equipment = procedure.check_profile(profile)?;
    for required in required_equipment {
        if !bench.has(required) {
            return Err(Error::config(
                7,
                "Required equipment missing",
                format!("test '{}' requires a {}", kind.name(), required.label()),
            ));
        }
    }

    let corrections = match profile.get(ParamKey::SwitchCorrectionFile) {
        Some(Value::Str(path)) => Some(SetupCorrections::load(std::path::Path::new(path))?),
        _ => None,
    };

    if let Err(err) = bench.connect() {
        bench.power_down();
        return Err(err.into());
    }

    let result = (|| {
        let mut ctx = TestContext {
            profile,
            bench,
            cal,
            corrections,
        };
        procedure.run(&mut ctx)?;
        procedure.save_data(&mut ctx)
    })();
    bench.power_down();
    result.map(|()| procedure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_merge_unions_lists_and_overwrites_values() {
        let mut a = TestDefinitions {
            required_parameters: vec![ParamKey::FreqF0],
            parameter_defaults: vec![(ParamKey::PowerLevel, Value::Float(-30.0))],
            ..TestDefinitions::default()
        };
        let b = TestDefinitions {
            required_parameters: vec![ParamKey::FreqF0, ParamKey::SdrGain],
            parameter_defaults: vec![(ParamKey::PowerLevel, Value::Float(-20.0))],
            ..TestDefinitions::default()
        };
        a.merge(&b);
        a.merge(&b);
        assert_eq!(
            a.required_parameters,
            vec![ParamKey::FreqF0, ParamKey::SdrGain]
        );
        assert_eq!(
            a.parameter_defaults,
            vec![(ParamKey::PowerLevel, Value::Float(-20.0))]
        );
    }

    #[test]
    fn stimulus_functionality_expands_requirements() {
        let defs = TestDefinitions {
            possible_functionality: vec![Functionality::Stimulus],
            ..TestDefinitions::default()
        };
        let mut profile = Profile::new();
        profile.set(ParamKey::PowerStimulus, Value::Str("single_cw".into()));
        // power_level becomes required through the expansion
        let err = apply_definitions(&defs, &mut profile).unwrap_err();
        assert!(matches!(err, Error::Config { code: 105, .. }));

        profile.set(ParamKey::PowerLevel, Value::Float(-30.0));
        let equipment = apply_definitions(&defs, &mut profile).unwrap();
        assert!(equipment.contains(&EquipmentKind::SignalGenerator));
    }

    #[test]
    fn unknown_method_name_is_a_configuration_error() {
        let err = MeasurementMethod::parse("median_power").unwrap_err();
        assert!(matches!(err, Error::Config { code: 110, .. }));
    }
}
