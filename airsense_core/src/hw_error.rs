//! Maps `Box<dyn Error>` from trait boundaries to typed errors.
//!
//! The collaborator traits use `Box<dyn Error + Send + Sync>`; this module
//! converts those to `SensorFault` / `AirError`, with an optional
//! feature-gated path for `airsense_hardware::HwError` downcasting.

use crate::error::{AirError, SensorFault};

/// Map an ADC or climate-sensor error to a `SensorFault`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> SensorFault {
    #[cfg(feature = "hardware-errors")]
    {
        use airsense_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => SensorFault::Timeout,
                HwError::Checksum => SensorFault::Checksum,
                other => SensorFault::Device(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        SensorFault::Timeout
    } else if lower.contains("checksum") {
        SensorFault::Checksum
    } else {
        SensorFault::Device(s)
    }
}

/// Map a transport error. Whether the association itself dropped is decided
/// by the control loop from `Network::is_associated`, not from this error.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> AirError {
    AirError::Transport(e.to_string())
}
