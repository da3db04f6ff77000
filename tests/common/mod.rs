/// This module has been created using mod.rs in a subfolder, instead of just creating a common.rs under tests
/// This is due to the test runner then not searching for runnable tests in mod.rs
/// https://doc.rust-lang.org/rust-by-example/testing/integration_testing.html
use sdr_calibrator::equipment::Bench;
use sdr_calibrator::equipment::mock::{
    MockAttenuator, MockPowerMeter, MockRfSwitch, MockSdr, MockSignalGenerator, SharedRfPath,
    shared_rf_path,
};
use sdr_calibrator::profile::{ParamKey, Profile, Value};

pub fn logging_init(module: &str) {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Error)
        .filter_module(module, log::LevelFilter::Trace)
        .try_init();
}

/// Profile with the FFT and timing settings every procedure test
/// shares. Settle times stay at zero so the suite runs fast.
#[allow(dead_code)]
pub fn base_profile() -> Profile {
    let mut profile = Profile::new();
    profile.set(ParamKey::FftNumberOfBins, Value::Int(1024));
    profile.set(ParamKey::FftAveragingNumber, Value::Int(1));
    profile.set(ParamKey::SdrSettleTime, Value::Float(0.0));
    profile.set(ParamKey::PowerSettleTime, Value::Float(0.0));
    profile
}

/// Full mock bench whose receiver compresses 2:1 above the given
/// input power.
#[allow(dead_code)]
pub fn knee_bench(knee_dbm: f64) -> (Bench, SharedRfPath) {
    bench_with_sdr(|sdr| sdr.compression_knee_dbm = Some(knee_dbm))
}

/// Full mock bench with the receiver adjusted before boxing.
#[allow(dead_code)]
pub fn bench_with_sdr(configure: impl FnOnce(&mut MockSdr)) -> (Bench, SharedRfPath) {
    let path = shared_rf_path();
    let mut sdr = MockSdr::new(path.clone());
    configure(&mut sdr);
    let bench = Bench {
        sdr: Box::new(sdr),
        siggen: Some(Box::new(MockSignalGenerator::new(path.clone()))),
        power_meter: Some(Box::new(MockPowerMeter::new(path.clone()))),
        switch: Some(Box::new(MockRfSwitch::new(path.clone()))),
        attenuator: Some(Box::new(MockAttenuator::new(path.clone()))),
    };
    (bench, path)
}
