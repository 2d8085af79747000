use std::fs;

use loadcell_config::{PersistedCalibration, load_calibration_file, load_toml};
use tempfile::tempdir;

#[test]
fn missing_file_is_none() {
    let dir = tempdir().unwrap();
    let got = load_calibration_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(got, None);
}

#[test]
fn file_round_trips_through_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    let cal = PersistedCalibration {
        tare_raw: -267_362,
        scale: 0.000_225_27,
    };
    fs::write(&path, cal.to_toml_string().unwrap()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[calibration]"));
    assert_eq!(load_calibration_file(&path).unwrap(), Some(cal));
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    fs::write(&path, "[calibration]\ntare_raw = 1\nscale = 0.0\n").unwrap();

    let err = load_calibration_file(&path).unwrap_err().to_string();
    assert!(err.contains("calibration.toml"), "{err}");
    assert!(err.contains("finite and non-zero"), "{err}");
}

#[test]
fn precedence_file_then_config_then_initial() {
    let cfg = load_toml(
        r#"
[serial]
initial_tare_raw = 5
initial_scale = 2.0
"#,
    )
    .unwrap();
    assert_eq!(
        cfg.effective_calibration(None),
        Some(PersistedCalibration {
            tare_raw: 5,
            scale: 2.0
        })
    );

    let cfg = load_toml(
        r#"
[serial]
initial_tare_raw = 5
initial_scale = 2.0

[calibration]
tare_raw = 7
scale = 3.0
"#,
    )
    .unwrap();
    assert_eq!(cfg.effective_calibration(None).unwrap().tare_raw, 7);

    let file = PersistedCalibration {
        tare_raw: 9,
        scale: 4.0,
    };
    assert_eq!(cfg.effective_calibration(Some(file)), Some(file));
}
