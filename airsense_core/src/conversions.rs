//! `From`/`TryFrom` implementations bridging `airsense_config` types to
//! `airsense_core` types. Anything the schema cannot rule out on its own
//! (template fields, cross-references) fails here as `AirError::Config`.

use std::time::Duration;

use crate::builder::Pipeline;
use crate::calibration::CalibrationParams;
use crate::classifier::{Classifier, ScoreRule};
use crate::control::{Association, BootPolicy, FailurePolicy};
use crate::display::{DisplayPresenter, LineSpec, PageLayout};
use crate::error::AirError;
use crate::estimator::{GasCurve, GasTable};
use crate::resistance::ResistanceModel;

// ── Sensor ───────────────────────────────────────────────────────────────────

impl From<&airsense_config::SensorCfg> for ResistanceModel {
    fn from(c: &airsense_config::SensorCfg) -> Self {
        Self {
            supply_voltage: c.supply_voltage,
            load_resistance: c.load_resistance_kohm,
            full_scale_code: c.full_scale_code,
            saturation_sentinel: c.saturation_sentinel,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&airsense_config::CalibrationCfg> for CalibrationParams {
    fn from(c: &airsense_config::CalibrationCfg) -> Self {
        Self {
            samples: c.samples,
            interval: Duration::from_millis(c.interval_ms),
            clean_air_factor: c.clean_air_factor,
        }
    }
}

// ── Gases ────────────────────────────────────────────────────────────────────

impl From<&airsense_config::GasCfg> for GasCurve {
    fn from(c: &airsense_config::GasCfg) -> Self {
        Self {
            name: c.name.clone(),
            key: c.payload_key(),
            a: c.a,
            b: c.b,
            offset_ppm: c.offset_ppm,
        }
    }
}

impl TryFrom<&[airsense_config::GasCfg]> for GasTable {
    type Error = AirError;

    fn try_from(c: &[airsense_config::GasCfg]) -> Result<Self, Self::Error> {
        GasTable::new(c.iter().map(GasCurve::from).collect())
    }
}

// ── Network / policy ─────────────────────────────────────────────────────────

impl From<airsense_config::FailurePolicy> for FailurePolicy {
    fn from(p: airsense_config::FailurePolicy) -> Self {
        match p {
            airsense_config::FailurePolicy::Halt => Self::Halt,
            airsense_config::FailurePolicy::Retry => Self::Retry,
        }
    }
}

impl From<&airsense_config::NetworkCfg> for Association {
    fn from(c: &airsense_config::NetworkCfg) -> Self {
        Self {
            ssid: c.ssid.clone(),
            password: c.password.clone(),
            polls: c.association_polls,
            poll_interval: Duration::from_millis(c.poll_interval_ms),
        }
    }
}

// ── Whole pipeline ───────────────────────────────────────────────────────────

fn build_presenter(
    c: &airsense_config::DisplayCfg,
    gases: &GasTable,
) -> Result<DisplayPresenter, AirError> {
    let pages = c
        .pages
        .iter()
        .map(|p| {
            p.lines
                .iter()
                .map(|l| LineSpec::parse(&l.text, l.x, l.y, gases))
                .collect::<Result<Vec<_>, _>>()
                .map(|lines| PageLayout { lines })
        })
        .collect::<Result<Vec<_>, _>>()?;
    DisplayPresenter::new(pages, c.width_chars)
}

impl TryFrom<&airsense_config::Config> for Pipeline {
    type Error = AirError;

    fn try_from(c: &airsense_config::Config) -> Result<Self, Self::Error> {
        c.validate().map_err(|e| AirError::Config(e.to_string()))?;
        let gases = GasTable::try_from(c.gases.as_slice())?;
        let rules = c
            .classifier
            .rules
            .iter()
            .map(|r| ScoreRule {
                gas: r.gas.clone(),
                threshold_ppm: r.threshold_ppm,
                score: r.score,
            })
            .collect();
        let classifier = Classifier::new(
            rules,
            c.classifier.alert_above,
            c.classifier.danger_above,
            &gases,
        )?;
        let presenter = build_presenter(&c.display, &gases)?;
        Ok(Self {
            model: ResistanceModel::from(&c.sensor),
            classifier,
            presenter,
            gases,
            calibration: CalibrationParams::from(&c.calibration),
            boot: BootPolicy {
                on_failure: c.network.on_failure.into(),
                calibration_attempts: c.calibration.max_attempts,
                backoff: Duration::from_millis(c.network.retry_backoff_ms),
            },
            association: Association::from(&c.network),
            period: Duration::from_millis(c.control.period_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdout_cfg() -> airsense_config::Config {
        airsense_config::load_toml("[telemetry]\ntransport = \"stdout\"\n").unwrap()
    }

    #[test]
    fn default_config_builds_deployed_pipeline() {
        let p = Pipeline::try_from(&stdout_cfg()).unwrap();
        assert_eq!(p.gases.curves().len(), 6);
        assert_eq!(p.presenter.page_count(), 2);
        assert_eq!(p.model, ResistanceModel::default());
        assert_eq!(p.period, Duration::from_secs(3));
        assert_eq!(p.boot.on_failure, FailurePolicy::Retry);
        assert_eq!(p.association.polls, 15);
    }

    #[test]
    fn display_template_with_unknown_gas_is_config_error() {
        let mut cfg = stdout_cfg();
        cfg.display.pages[0].lines[0].text = "{gas:Radon:1}".into();
        let err = Pipeline::try_from(&cfg).unwrap_err();
        assert!(matches!(err, AirError::Config(ref m) if m.contains("Radon")));
    }

    #[test]
    fn invalid_schema_is_config_error() {
        let mut cfg = stdout_cfg();
        cfg.control.period_ms = 0;
        assert!(matches!(
            Pipeline::try_from(&cfg),
            Err(AirError::Config(_))
        ));
    }
}
