use chrono::{DateTime, Utc};

use crate::classifier::AirQualityStatus;
use crate::estimator::Concentrations;

/// One acquisition: the gas channel plus the optional climate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub adc: u16,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
}

/// Fully processed cycle result handed to the display and telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub adc: u16,
    pub resistance: f64,
    pub concentrations: Concentrations,
    pub status: AirQualityStatus,
}
