//! Human-readable error descriptions, exit codes and structured JSON errors.

use airsense_core::error::{AirError, BuildError, CalibrationError};

/// Exit code for a halt during network association.
pub const EXIT_ASSOCIATION: i32 = 3;
/// Exit code for a halt during calibration.
pub const EXIT_CALIBRATION: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: The sensing loop could not be assembled ({be}).\nLikely causes: A device failed to initialize before the loop was built.\nHow to fix: Run `airsense self-check` to see which device is missing."
        );
    }

    if let Some(ae) = err.downcast_ref::<AirError>() {
        return match ae {
            AirError::NetworkAssociation(_) => {
                "What happened: The node could not join the network and the failure policy is halt.\nLikely causes: Wrong network.ssid/password, access point out of range, or interface down.\nHow to fix: Check the [network] section, or set network.on_failure = \"retry\".".to_string()
            }
            AirError::Calibration(CalibrationError::InvalidBaseline(ro)) => format!(
                "What happened: Calibration produced an unusable baseline (Ro = {ro}).\nLikely causes: Gas sensor disconnected, heater not powered, or ADC channel wrong.\nHow to fix: Check wiring and sensor.adc_channel, let the sensor warm up, then retry."
            ),
            AirError::Calibration(CalibrationError::Sensor(f)) => format!(
                "What happened: The gas sensor failed during calibration ({f}).\nLikely causes: ADC not responding or wrong IIO device.\nHow to fix: Verify sensor.iio_device and rerun `airsense self-check`."
            ),
            AirError::Sensor(f) => format!(
                "What happened: Sensor read failed ({f}).\nLikely causes: Loose wiring or a flaky climate sensor.\nHow to fix: Check connections; transient faults are skipped while running."
            ),
            AirError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing TOML file with --config. Original: {msg}"
        );
    }

    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this schema.\nLikely causes: A typo in a key or a value of the wrong type.\nHow to fix: Compare with etc/airsense.toml. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration")
        || lower.contains(" must be ")
        || lower.contains(" is required")
    {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Out-of-range values or a missing endpoint.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("open gas adc") || lower.contains("iio") {
        return format!(
            "What happened: Failed to open the sensor devices ({msg}).\nLikely causes: Wrong IIO device path or missing kernel driver.\nHow to fix: Check sensor.iio_device under /sys/bus/iio/devices."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for bootstrap halts; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<AirError>() {
        Some(AirError::NetworkAssociation(_)) => EXIT_ASSOCIATION,
        Some(AirError::Calibration(_)) => EXIT_CALIBRATION,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<AirError>() {
        Some(AirError::NetworkAssociation(_)) => "NetworkAssociation",
        Some(AirError::Calibration(_)) => "Calibration",
        Some(AirError::Sensor(_)) => "Sensor",
        Some(AirError::Transport(_)) => "Transport",
        Some(AirError::Display(_)) => "Display",
        Some(AirError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let status = err
        .downcast_ref::<AirError>()
        .map(AirError::display_message);
    json!({
        "reason": reason_name(err),
        "status": status,
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
