//! Power-law gas curves: `ppm = a * (Rs/Ro)^b`.

use std::collections::HashSet;

use crate::calibration::CalibrationState;
use crate::error::AirError;

#[derive(Debug, Clone, PartialEq)]
pub struct GasCurve {
    pub name: String,
    /// Field name in the telemetry payload.
    pub key: String,
    pub a: f64,
    pub b: f64,
    /// Added after the curve (ambient CO2 background).
    pub offset_ppm: f64,
}

impl GasCurve {
    pub fn new(name: impl Into<String>, a: f64, b: f64) -> Self {
        let name = name.into();
        Self {
            key: name.to_ascii_lowercase(),
            name,
            a,
            b,
            offset_ppm: 0.0,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_offset(mut self, offset_ppm: f64) -> Self {
        self.offset_ppm = offset_ppm;
        self
    }
}

/// Raw curve value for one gas. Zero when the ratio is not positive.
pub fn estimate(resistance: f64, curve: &GasCurve, calibration: &CalibrationState) -> f64 {
    let ratio = resistance / calibration.baseline_resistance();
    if ratio.is_nan() || ratio <= 0.0 {
        return 0.0;
    }
    curve.a * ratio.powf(curve.b)
}

/// One entry of `Concentrations`.
#[derive(Debug, Clone, PartialEq)]
pub struct GasLevel {
    pub name: String,
    pub key: String,
    pub ppm: f64,
}

/// Per-gas concentrations in registration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Concentrations(Vec<GasLevel>);

impl Concentrations {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|g| g.name == name).map(|g| g.ppm)
    }

    /// Set `name` to `ppm`, appending it if absent.
    pub fn set(&mut self, name: &str, ppm: f64) {
        match self.0.iter_mut().find(|g| g.name == name) {
            Some(g) => g.ppm = ppm,
            None => self.0.push(GasLevel {
                name: name.to_string(),
                key: name.to_ascii_lowercase(),
                ppm,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GasLevel> {
        self.0.iter()
    }
}

impl<'a> FromIterator<(&'a str, f64)> for Concentrations {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut c = Self::default();
        for (name, ppm) in iter {
            c.set(name, ppm);
        }
        c
    }
}

/// Registered curves, validated once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GasTable {
    curves: Vec<GasCurve>,
}

impl GasTable {
    pub fn new(curves: Vec<GasCurve>) -> Result<Self, AirError> {
        if curves.is_empty() {
            return Err(AirError::Config("at least one gas curve is required".into()));
        }
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for c in &curves {
            if c.name.trim().is_empty() {
                return Err(AirError::Config("gas name must not be empty".into()));
            }
            if !(c.a.is_finite() && c.a > 0.0) {
                return Err(AirError::Config(format!("gas {}: a must be > 0", c.name)));
            }
            if !c.b.is_finite() {
                return Err(AirError::Config(format!("gas {}: b must be finite", c.name)));
            }
            if !(c.offset_ppm.is_finite() && c.offset_ppm >= 0.0) {
                return Err(AirError::Config(format!(
                    "gas {}: offset_ppm must be >= 0",
                    c.name
                )));
            }
            if !names.insert(c.name.clone()) {
                return Err(AirError::Config(format!("duplicate gas name {:?}", c.name)));
            }
            if !keys.insert(c.key.clone()) {
                return Err(AirError::Config(format!("duplicate gas key {:?}", c.key)));
            }
        }
        Ok(Self { curves })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.curves.iter().any(|c| c.name == name)
    }

    pub fn curves(&self) -> &[GasCurve] {
        &self.curves
    }

    /// Evaluate every curve and add its offset.
    pub fn concentrations(
        &self,
        resistance: f64,
        calibration: &CalibrationState,
    ) -> Concentrations {
        Concentrations(
            self.curves
                .iter()
                .map(|c| GasLevel {
                    name: c.name.clone(),
                    key: c.key.clone(),
                    ppm: estimate(resistance, c, calibration) + c.offset_ppm,
                })
                .collect(),
        )
    }
}
