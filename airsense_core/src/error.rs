use thiserror::Error;

/// Acquisition failure of the gas channel or the climate sensor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorFault {
    #[error("sensor timeout")]
    Timeout,
    #[error("sensor checksum mismatch")]
    Checksum,
    #[error("sensor device error: {0}")]
    Device(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration aborted: {0}")]
    Sensor(#[from] SensorFault),
    /// Averaged baseline was zero, negative or not finite (sensor disconnected).
    #[error("invalid baseline resistance {0}")]
    InvalidBaseline(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AirError {
    #[error(transparent)]
    Sensor(#[from] SensorFault),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("network association failed: {0}")]
    NetworkAssociation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("display error: {0}")]
    Display(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl AirError {
    /// Short status text that fits one display line.
    pub fn display_message(&self) -> &'static str {
        match self {
            Self::Sensor(_) => "Sensor Fault",
            Self::Calibration(_) => "Calib Failed",
            Self::NetworkAssociation(_) => "WiFi Failed!",
            Self::Transport(_) => "Pub Fail",
            Self::Display(_) => "Display Fault",
            Self::Config(_) => "Config Error",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing gas adc")]
    MissingAdc,
    #[error("missing network")]
    MissingNetwork,
    #[error("missing display")]
    MissingDisplay,
    #[error("missing telemetry publisher")]
    MissingPublisher,
    #[error("missing pipeline")]
    MissingPipeline,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
