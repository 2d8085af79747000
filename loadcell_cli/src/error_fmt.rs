//! Human-readable error descriptions and structured JSON error formatting.

use loadcell_core::error::{BuildError, ScaleError};

/// Stable name of the error kind, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingFrontEnd => "MissingFrontEnd",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::NotReady) => "NotReady",
        Some(ScaleError::Busy) => "Busy",
        Some(ScaleError::Setup { .. }) => "Setup",
        Some(ScaleError::DegenerateCalibration { .. }) => "DegenerateCalibration",
        Some(ScaleError::InvalidReferenceWeight(_)) => "InvalidReferenceWeight",
        Some(ScaleError::State(_)) => "State",
        Some(ScaleError::Timeout) => "Timeout",
        Some(ScaleError::Hardware(_)) => "Hardware",
        Some(ScaleError::Persist(_)) => "Persist",
        Some(ScaleError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingFrontEnd => "What happened: No front end was provided to the backend.\nLikely causes: The ADC driver failed to open or was not wired into the builder.\nHow to fix: Check the [serial] or [register] section and the device permissions.".to_string(),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::Setup { frontend, reason } => format!(
                "What happened: The {frontend} front end did not come up ({reason}).\nLikely causes: Wrong I2C address or pins, no power to the ADC board, or a wiring fault.\nHow to fix: Verify wiring and the [register]/[serial] settings; for AFE timeouts raise register.afe_timeout_ms."
            ),
            ScaleError::Timeout | ScaleError::NotReady => "What happened: Not enough samples arrived in time.\nLikely causes: The ADC is not converting (no data-ready), or the request timeout is too short for the sample rate.\nHow to fix: Run `self-check`, verify wiring, or raise acquisition.request_timeout_ms.".to_string(),
            ScaleError::DegenerateCalibration { raw } => format!(
                "What happened: Tare and reference readings are identical (raw {raw}).\nLikely causes: The reference weight was not on the scale, or the load cell is not connected.\nHow to fix: Place the reference weight before confirming the second step, then calibrate again."
            ),
            ScaleError::InvalidReferenceWeight(w) => format!(
                "What happened: Reference weight {w} is not usable.\nLikely causes: Zero, negative or non-numeric --weight.\nHow to fix: Pass the known mass as a positive number."
            ),
            ScaleError::Persist(msg) => format!(
                "What happened: Calibration applied but not saved ({msg}).\nLikely causes: Read-only filesystem or missing permissions for the calibration file.\nHow to fix: Check the --calibration path and rerun the calibration."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") || lower.contains("no such file") {
        return format!(
            "What happened: The configuration could not be read ({msg}).\nHow to fix: Pass --config with the path to a TOML file."
        );
    }

    if lower.contains("must be") || lower.contains("requires a [") || lower.contains("parse") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 configuration, 3 device setup, 4 no data in time,
/// 5 calibration rejected or not saved, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Config(_)) => 2,
        Some(ScaleError::Setup { .. } | ScaleError::Hardware(_)) => 3,
        Some(ScaleError::Timeout | ScaleError::NotReady | ScaleError::Busy) => 4,
        Some(
            ScaleError::DegenerateCalibration { .. }
            | ScaleError::InvalidReferenceWeight(_)
            | ScaleError::State(_)
            | ScaleError::Persist(_),
        ) => 5,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
