//! Simulated bench for tests.
//!
//! All mocks share one [`RfPath`] cell: the mock signal generator and
//! attenuator write the stimulus state, the mock receiver synthesizes
//! IQ samples from it, and the mock power meter reads it back. That
//! makes closed-loop procedure tests possible without hardware.

use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

use rustfft::num_complex::Complex64;

use super::{
    Attenuator, EquipmentError, EquipmentKind, EquipmentResult, PowerMeter, RfSwitch, Sdr,
    SignalGenerator, TunedFrequencies,
};

/// Where the switch routes the stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Sdr,
    Meter,
}

/// Stimulus state shared by all mock instruments.
#[derive(Debug)]
pub struct RfPath {
    pub cw_frequency: f64,
    pub power_dbm: f64,
    pub rf_on: bool,
    pub attenuation_db: f64,
    pub route: Route,
}

impl Default for RfPath {
    fn default() -> Self {
        Self {
            cw_frequency: 0.0,
            power_dbm: -200.0,
            rf_on: false,
            attenuation_db: 0.0,
            route: Route::Sdr,
        }
    }
}

pub type SharedRfPath = Rc<RefCell<RfPath>>;

pub fn shared_rf_path() -> SharedRfPath {
    Rc::new(RefCell::new(RfPath::default()))
}

fn dbm_to_volts(power_dbm: f64) -> f64 {
    // Peak amplitude of a CW tone with that power across 50 ohms.
    (2.0 * 50.0 * 10.0_f64.powf((power_dbm - 30.0) / 10.0)).sqrt()
}

/// Simulated receiver.
///
/// The synthesized capture is the stimulus tone at its baseband offset,
/// amplified by the SDR gain plus a configurable frequency response,
/// over a flat noise floor. An optional compression knee bends the
/// response 2:1 beyond a given input power.
pub struct MockSdr {
    path: SharedRfPath,
    lo: f64,
    dsp: f64,
    sample_rate: f64,
    clock: f64,
    gain: f64,
    /// LO step size; tune requests snap to multiples of this.
    pub tuning_resolution: f64,
    pub noise_floor_dbm: f64,
    /// Extra front-end gain as a function of LO frequency, for
    /// simulating filter-bank steps.
    pub frequency_response_db: Box<dyn Fn(f64) -> f64>,
    /// Gain as a function of baseband offset, for simulating the
    /// channel filter rolloff.
    pub baseband_response_db: Box<dyn Fn(f64) -> f64>,
    /// Input power where the response starts compressing.
    pub compression_knee_dbm: Option<f64>,
    serial: String,
    noise_state: u64,
}

impl MockSdr {
    pub fn new(path: SharedRfPath) -> Self {
        Self {
            path,
            lo: 0.0,
            dsp: 0.0,
            sample_rate: 10e6,
            clock: 40e6,
            gain: 0.0,
            tuning_resolution: 1.0,
            noise_floor_dbm: -90.0,
            frequency_response_db: Box::new(|_| 0.0),
            baseband_response_db: Box::new(|_| 0.0),
            compression_knee_dbm: None,
            serial: "MOCK0001".to_string(),
            noise_state: 0x2545_f491_4f6c_dd1d,
        }
    }

    // xorshift, deterministic across runs
    fn noise_sample(&mut self) -> Complex64 {
        let mut next = || {
            self.noise_state ^= self.noise_state << 13;
            self.noise_state ^= self.noise_state >> 7;
            self.noise_state ^= self.noise_state << 17;
            (self.noise_state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        };
        Complex64::new(next(), next())
    }
}

impl Sdr for MockSdr {
    fn connect(&mut self) -> EquipmentResult<()> {
        log::debug!("mock SDR {} connected", self.serial);
        Ok(())
    }

    fn tune(&mut self, frequency: f64) -> EquipmentResult<TunedFrequencies> {
        if frequency <= 0.0 {
            return Err(EquipmentError::new(
                EquipmentKind::Sdr,
                1,
                "Requested frequency out of range",
                format!("cannot tune to {frequency} Hz"),
            ));
        }
        self.lo = (frequency / self.tuning_resolution).round() * self.tuning_resolution;
        self.dsp = frequency - self.lo;
        Ok(TunedFrequencies {
            lo: self.lo,
            dsp: self.dsp,
        })
    }

    fn set_sampling_frequency(&mut self, rate: f64) -> EquipmentResult<f64> {
        self.sample_rate = rate;
        Ok(rate)
    }

    fn set_clock_frequency(&mut self, frequency: f64) -> EquipmentResult<f64> {
        self.clock = frequency;
        Ok(frequency)
    }

    fn sampling_frequency(&self) -> f64 {
        self.sample_rate
    }

    fn clock_frequency(&self) -> f64 {
        self.clock
    }

    fn set_gain(&mut self, gain: f64) -> EquipmentResult<()> {
        self.gain = gain;
        Ok(())
    }

    fn take_iq_samples(
        &mut self,
        count: usize,
        conditioning: usize,
    ) -> EquipmentResult<Vec<Complex64>> {
        let path = self.path.borrow();
        let stimulus = path.rf_on && path.route == Route::Sdr;
        let input_dbm = path.power_dbm - path.attenuation_db;
        let offset = path.cw_frequency - (self.lo + self.dsp);
        drop(path);

        let mut output_dbm = input_dbm
            + self.gain
            + (self.frequency_response_db)(self.lo)
            + (self.baseband_response_db)(offset);
        if let Some(knee) = self.compression_knee_dbm {
            if input_dbm > knee {
                output_dbm -= (input_dbm - knee) * 0.5;
            }
        }
        let tone_amp = if stimulus { dbm_to_volts(output_dbm) } else { 0.0 };
        let noise_amp = dbm_to_volts(self.noise_floor_dbm + self.gain);

        let total = conditioning + count;
        let mut samples = Vec::with_capacity(count);
        for i in conditioning..total {
            let phase = 2.0 * PI * offset * i as f64 / self.sample_rate;
            let tone = Complex64::new(phase.cos(), phase.sin()) * tone_amp;
            samples.push(tone + self.noise_sample() * noise_amp * 2.0);
        }
        Ok(samples)
    }

    fn serial_number(&self) -> String {
        self.serial.clone()
    }

    fn power_down(&mut self) {
        log::debug!("mock SDR powered down");
    }
}

pub struct MockSignalGenerator {
    path: SharedRfPath,
    /// Output ceiling; asking for more is a device error.
    pub max_power_dbm: f64,
}

impl MockSignalGenerator {
    pub fn new(path: SharedRfPath) -> Self {
        Self {
            path,
            max_power_dbm: 20.0,
        }
    }
}

impl SignalGenerator for MockSignalGenerator {
    fn connect(&mut self) -> EquipmentResult<()> {
        Ok(())
    }

    fn tune(&mut self, frequency: f64) -> EquipmentResult<()> {
        self.path.borrow_mut().cw_frequency = frequency;
        Ok(())
    }

    fn set_power(&mut self, power_dbm: f64) -> EquipmentResult<()> {
        if power_dbm > self.max_power_dbm {
            return Err(EquipmentError::new(
                EquipmentKind::SignalGenerator,
                2,
                "Requested power out of range",
                format!(
                    "{power_dbm} dBm exceeds the {} dBm output ceiling",
                    self.max_power_dbm
                ),
            ));
        }
        self.path.borrow_mut().power_dbm = power_dbm;
        Ok(())
    }

    fn rf_on(&mut self) -> EquipmentResult<()> {
        self.path.borrow_mut().rf_on = true;
        Ok(())
    }

    fn rf_off(&mut self) -> EquipmentResult<()> {
        self.path.borrow_mut().rf_on = false;
        Ok(())
    }

    fn power_down(&mut self) {
        self.path.borrow_mut().rf_on = false;
    }
}

pub struct MockPowerMeter {
    path: SharedRfPath,
    tuned: f64,
}

impl MockPowerMeter {
    pub fn new(path: SharedRfPath) -> Self {
        Self { path, tuned: 0.0 }
    }
}

impl PowerMeter for MockPowerMeter {
    fn connect(&mut self) -> EquipmentResult<()> {
        Ok(())
    }

    fn tune(&mut self, frequency: f64) -> EquipmentResult<()> {
        self.tuned = frequency;
        Ok(())
    }

    fn take_measurement(&mut self) -> EquipmentResult<f64> {
        let path = self.path.borrow();
        if path.rf_on && path.route == Route::Meter {
            Ok(path.power_dbm - path.attenuation_db)
        } else {
            Ok(-120.0)
        }
    }

    fn power_down(&mut self) {}
}

pub struct MockRfSwitch {
    path: SharedRfPath,
}

impl MockRfSwitch {
    pub fn new(path: SharedRfPath) -> Self {
        Self { path }
    }
}

impl RfSwitch for MockRfSwitch {
    fn connect(&mut self) -> EquipmentResult<()> {
        Ok(())
    }

    fn select_sdr(&mut self) -> EquipmentResult<()> {
        self.path.borrow_mut().route = Route::Sdr;
        Ok(())
    }

    fn select_meter(&mut self) -> EquipmentResult<()> {
        self.path.borrow_mut().route = Route::Meter;
        Ok(())
    }

    fn set_to_default(&mut self) -> EquipmentResult<()> {
        self.select_sdr()
    }

    fn power_down(&mut self) {}
}

pub struct MockAttenuator {
    path: SharedRfPath,
}

impl MockAttenuator {
    pub fn new(path: SharedRfPath) -> Self {
        Self { path }
    }
}

impl Attenuator for MockAttenuator {
    fn connect(&mut self) -> EquipmentResult<()> {
        Ok(())
    }

    fn set_attenuation(&mut self, attenuation_db: f64) -> EquipmentResult<()> {
        if attenuation_db < 0.0 {
            return Err(EquipmentError::new(
                EquipmentKind::Attenuator,
                2,
                "Invalid attenuation",
                format!("attenuation must be non-negative, got {attenuation_db} dB"),
            ));
        }
        self.path.borrow_mut().attenuation_db = attenuation_db;
        Ok(())
    }

    fn power_down(&mut self) {}
}

/// A fully populated mock bench over a fresh RF path.
pub fn mock_bench() -> (super::Bench, SharedRfPath) {
    let path = shared_rf_path();
    let bench = super::Bench {
        sdr: Box::new(MockSdr::new(path.clone())),
        siggen: Some(Box::new(MockSignalGenerator::new(path.clone()))),
        power_meter: Some(Box::new(MockPowerMeter::new(path.clone()))),
        switch: Some(Box::new(MockRfSwitch::new(path.clone()))),
        attenuator: Some(Box::new(MockAttenuator::new(path.clone()))),
    };
    (bench, path)
}
