//! Weighted threshold scoring into a three-level air-quality status.

use std::fmt;

use crate::error::AirError;
use crate::estimator::{Concentrations, GasTable};

/// Severity order is `Good < Alert < Danger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AirQualityStatus {
    Good,
    Alert,
    Danger,
}

impl AirQualityStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Alert => "Alert",
            Self::Danger => "Danger",
        }
    }
}

impl fmt::Display for AirQualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Adds `score` when the gas is strictly above `threshold_ppm`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRule {
    pub gas: String,
    pub threshold_ppm: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    rules: Vec<ScoreRule>,
    alert_above: u32,
    danger_above: u32,
}

impl Classifier {
    /// Validate rules against the registered gases.
    pub fn new(
        rules: Vec<ScoreRule>,
        alert_above: u32,
        danger_above: u32,
        gases: &GasTable,
    ) -> Result<Self, AirError> {
        if danger_above < alert_above {
            return Err(AirError::Config(
                "danger_above must be >= alert_above".into(),
            ));
        }
        for r in &rules {
            if !gases.contains(&r.gas) {
                return Err(AirError::Config(format!(
                    "classifier rule references unknown gas {:?}",
                    r.gas
                )));
            }
            if !r.threshold_ppm.is_finite() {
                return Err(AirError::Config(format!(
                    "classifier rule for {} has non-finite threshold",
                    r.gas
                )));
            }
        }
        Ok(Self {
            rules,
            alert_above,
            danger_above,
        })
    }

    /// Rules evaluated as-is, without checking them against a gas table.
    /// Rules naming a gas that is never measured simply never fire.
    pub fn unchecked(rules: Vec<ScoreRule>, alert_above: u32, danger_above: u32) -> Self {
        Self {
            rules,
            alert_above,
            danger_above: danger_above.max(alert_above),
        }
    }

    pub fn score(&self, levels: &Concentrations) -> u32 {
        self.rules
            .iter()
            .filter(|r| levels.get(&r.gas).is_some_and(|ppm| ppm > r.threshold_ppm))
            .fold(0u32, |acc, r| acc.saturating_add(r.score))
    }

    pub fn classify(&self, levels: &Concentrations) -> AirQualityStatus {
        let score = self.score(levels);
        if score > self.danger_above {
            AirQualityStatus::Danger
        } else if score > self.alert_above {
            AirQualityStatus::Alert
        } else {
            AirQualityStatus::Good
        }
    }
}
