//! Capability contracts for the bench instruments.
//!
//! Real drivers live outside this crate; the procedures only consume
//! these traits. The mocks in [`mock`] implement the same contracts
//! against a shared simulated RF path for testing.

pub mod mock;

use rustfft::num_complex::Complex64;

/// Which instrument an error came from. Determines the numeric code
/// offset of its errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EquipmentKind {
    Sdr,
    SignalGenerator,
    PowerMeter,
    RfSwitch,
    Attenuator,
}

impl EquipmentKind {
    fn code_offset(self) -> u32 {
        match self {
            EquipmentKind::Sdr => 200,
            EquipmentKind::SignalGenerator => 300,
            EquipmentKind::PowerMeter => 400,
            EquipmentKind::RfSwitch => 500,
            EquipmentKind::Attenuator => 600,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EquipmentKind::Sdr => "SDR",
            EquipmentKind::SignalGenerator => "signal generator",
            EquipmentKind::PowerMeter => "power meter",
            EquipmentKind::RfSwitch => "RF switch",
            EquipmentKind::Attenuator => "attenuator",
        }
    }
}

/// Device error carrying the uniform (code, head, body) triple.
#[derive(thiserror::Error, Debug)]
#[error("{head} (code {code}): {body}")]
pub struct EquipmentError {
    pub kind: EquipmentKind,
    pub code: u32,
    pub head: String,
    pub body: String,
}

impl EquipmentError {
    /// `code` is the device-local code; the per-kind offset is applied
    /// here.
    pub fn new(
        kind: EquipmentKind,
        code: u32,
        head: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: kind.code_offset() + code,
            head: head.into(),
            body: body.into(),
        }
    }
}

pub type EquipmentResult<T> = std::result::Result<T, EquipmentError>;

/// LO and DSP components of an actual tune. The realized center
/// frequency is their sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedFrequencies {
    pub lo: f64,
    pub dsp: f64,
}

impl TunedFrequencies {
    pub fn center(self) -> f64 {
        self.lo + self.dsp
    }
}

/// The receiver under calibration.
pub trait Sdr {
    fn connect(&mut self) -> EquipmentResult<()>;
    /// Tune as close to `frequency` as the synthesizer allows and
    /// report what was actually realized.
    fn tune(&mut self, frequency: f64) -> EquipmentResult<TunedFrequencies>;
    fn set_sampling_frequency(&mut self, rate: f64) -> EquipmentResult<f64>;
    fn set_clock_frequency(&mut self, frequency: f64) -> EquipmentResult<f64>;
    fn sampling_frequency(&self) -> f64;
    fn clock_frequency(&self) -> f64;
    fn set_gain(&mut self, gain: f64) -> EquipmentResult<()>;
    /// Capture `count` IQ samples after discarding `conditioning`
    /// samples of filter settling.
    fn take_iq_samples(&mut self, count: usize, conditioning: usize)
    -> EquipmentResult<Vec<Complex64>>;
    fn serial_number(&self) -> String;
    fn power_down(&mut self);
}

/// CW stimulus source.
pub trait SignalGenerator {
    fn connect(&mut self) -> EquipmentResult<()>;
    fn tune(&mut self, frequency: f64) -> EquipmentResult<()>;
    fn set_power(&mut self, power_dbm: f64) -> EquipmentResult<()>;
    fn rf_on(&mut self) -> EquipmentResult<()>;
    fn rf_off(&mut self) -> EquipmentResult<()>;
    fn power_down(&mut self);
}

/// Reference meter for stimulus power verification.
pub trait PowerMeter {
    fn connect(&mut self) -> EquipmentResult<()>;
    fn tune(&mut self, frequency: f64) -> EquipmentResult<()>;
    fn take_measurement(&mut self) -> EquipmentResult<f64>;
    fn power_down(&mut self);
}

/// Routes the stimulus to either the receiver or the meter.
pub trait RfSwitch {
    fn connect(&mut self) -> EquipmentResult<()>;
    fn select_sdr(&mut self) -> EquipmentResult<()>;
    fn select_meter(&mut self) -> EquipmentResult<()>;
    fn set_to_default(&mut self) -> EquipmentResult<()>;
    fn power_down(&mut self);
}

/// Programmable attenuator in the stimulus path.
pub trait Attenuator {
    fn connect(&mut self) -> EquipmentResult<()>;
    fn set_attenuation(&mut self, attenuation_db: f64) -> EquipmentResult<()>;
    fn power_down(&mut self);
}

/// The full instrument bench. Only the receiver is mandatory; the rest
/// depend on which functionality the profile enables.
pub struct Bench {
    pub sdr: Box<dyn Sdr>,
    pub siggen: Option<Box<dyn SignalGenerator>>,
    pub power_meter: Option<Box<dyn PowerMeter>>,
    pub switch: Option<Box<dyn RfSwitch>>,
    pub attenuator: Option<Box<dyn Attenuator>>,
}

impl Bench {
    pub fn sdr_only(sdr: Box<dyn Sdr>) -> Self {
        Self {
            sdr,
            siggen: None,
            power_meter: None,
            switch: None,
            attenuator: None,
        }
    }

    pub fn has(&self, kind: EquipmentKind) -> bool {
        match kind {
            EquipmentKind::Sdr => true,
            EquipmentKind::SignalGenerator => self.siggen.is_some(),
            EquipmentKind::PowerMeter => self.power_meter.is_some(),
            EquipmentKind::RfSwitch => self.switch.is_some(),
            EquipmentKind::Attenuator => self.attenuator.is_some(),
        }
    }

    /// Connect every present instrument, failing on the first error.
    pub fn connect(&mut self) -> EquipmentResult<()> {
        self.sdr.connect()?;
        if let Some(siggen) = &mut self.siggen {
            siggen.connect()?;
        }
        if let Some(meter) = &mut self.power_meter {
            meter.connect()?;
        }
        if let Some(switch) = &mut self.switch {
            switch.connect()?;
        }
        if let Some(attenuator) = &mut self.attenuator {
            attenuator.connect()?;
        }
        Ok(())
    }

    /// Power down every present instrument. Runs on every exit path
    /// of an orchestrated run, so it must not fail.
    pub fn power_down(&mut self) {
        log::info!("powering down the bench");
        if let Some(siggen) = &mut self.siggen {
            siggen.power_down();
        }
        if let Some(attenuator) = &mut self.attenuator {
            attenuator.power_down();
        }
        if let Some(switch) = &mut self.switch {
            switch.power_down();
        }
        if let Some(meter) = &mut self.power_meter {
            meter.power_down();
        }
        self.sdr.power_down();
    }
}
