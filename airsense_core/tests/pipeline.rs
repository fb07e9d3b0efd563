//! End-to-end numbers through model, calibration, estimation and scoring.

use std::time::Duration;

use airsense_core::{
    AirQualityStatus, CalibrationParams, CalibrationState, Classifier, GasCurve, GasTable,
    ResistanceModel, ScoreRule, calibrate, estimate,
};
use airsense_traits::GasAdc;
use airsense_traits::clock::test_clock::TestClock;

struct ConstAdc(u16);
impl GasAdc for ConstAdc {
    fn read_raw(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0)
    }
}

/// With Vs = full scale and RL = 1, V equals the code and Rs = 4095/code - 1,
/// so code 455 gives exactly 8.0.
fn unit_model() -> ResistanceModel {
    ResistanceModel {
        supply_voltage: 4095.0,
        load_resistance: 1.0,
        full_scale_code: 4095,
        saturation_sentinel: 0.1,
    }
}

#[test]
fn fifty_samples_of_eight_ohms_give_baseline_2_222() {
    let model = unit_model();
    assert_eq!(model.resistance(455), 8.0);
    let clock = TestClock::new();
    let st = calibrate(
        &mut ConstAdc(455),
        &model,
        &clock,
        &CalibrationParams {
            samples: 50,
            interval: Duration::from_millis(100),
            clean_air_factor: 3.6,
        },
    )
    .unwrap();
    assert!((st.baseline_resistance() - 8.0 / 3.6).abs() < 1e-12);
    assert!((st.baseline_resistance() - 2.222).abs() < 1e-3);
    assert_eq!(st.samples(), 50);
}

#[test]
fn resistance_at_baseline_yields_coefficient_a() {
    let cal = CalibrationState::from_baseline(8.0 / 3.6).unwrap();
    let co2 = GasCurve::new("CO2", 110.47, -2.862);
    let ppm = estimate(cal.baseline_resistance(), &co2, &cal);
    assert!((ppm - 110.47).abs() < 1e-9);
    // idempotent
    assert_eq!(ppm, estimate(cal.baseline_resistance(), &co2, &cal));
}

#[test]
fn polluted_air_walks_up_the_status_ladder() {
    let gases = GasTable::new(vec![
        GasCurve::new("CO2", 110.47, -2.862).with_offset(400.0),
        GasCurve::new("CO", 605.18, -3.937),
        GasCurve::new("NH3", 102.2, -2.473),
        GasCurve::new("Alcohol", 77.255, -3.18).with_key("alcool"),
    ])
    .unwrap();
    let rule = |gas: &str, threshold_ppm: f64, score: u32| ScoreRule {
        gas: gas.into(),
        threshold_ppm,
        score,
    };
    let classifier = Classifier::new(
        vec![
            rule("CO2", 1000.0, 30),
            rule("NH3", 10.0, 40),
            rule("CO", 10.0, 40),
            rule("Alcohol", 100.0, 20),
        ],
        40,
        80,
        &gases,
    )
    .unwrap();
    let cal = CalibrationState::from_baseline(10.0).unwrap();

    // Rs far above Ro: clean
    let clean = gases.concentrations(40.0, &cal);
    assert_eq!(classifier.classify(&clean), AirQualityStatus::Good);
    assert!((clean.get("CO2").unwrap() - 400.0).abs() < 5.0);

    // Rs at Ro: CO and NH3 over their thresholds, 80 is not above 80
    let mid = gases.concentrations(10.0, &cal);
    assert_eq!(classifier.score(&mid), 80);
    assert_eq!(classifier.classify(&mid), AirQualityStatus::Alert);

    // Rs well below Ro: everything fires
    let bad = gases.concentrations(3.0, &cal);
    assert_eq!(classifier.score(&bad), 130);
    assert_eq!(classifier.classify(&bad), AirQualityStatus::Danger);
}

#[test]
fn open_circuit_reading_estimates_zero_above_offset() {
    let model = ResistanceModel::default();
    let cal = CalibrationState::from_baseline(2.0).unwrap();
    let table = GasTable::new(vec![GasCurve::new("CO2", 110.47, -2.862).with_offset(400.0)]).unwrap();
    let c = table.concentrations(model.resistance(0), &cal);
    assert_eq!(c.get("CO2"), Some(400.0));
}

#[test]
fn shipped_configs_build_pipelines() {
    let etc = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc");

    let cfg = airsense_config::load_file(&etc.join("airsense.toml")).unwrap();
    let p = airsense_core::Pipeline::try_from(&cfg).unwrap();
    assert_eq!(p.presenter.page_count(), 2);
    assert_eq!(p.gases.curves().len(), 6);
    assert_eq!(p.period, Duration::from_secs(3));

    let cfg = airsense_config::load_file(&etc.join("airsense_mqtt.toml")).unwrap();
    let p = airsense_core::Pipeline::try_from(&cfg).unwrap();
    assert_eq!(p.presenter.page_count(), 1);
    assert_eq!(p.gases.curves().len(), 3);
    assert_eq!(p.boot.on_failure, airsense_core::control::FailurePolicy::Halt);
    assert_eq!(p.boot.calibration_attempts, 1);
}
