#![no_main]
use libfuzzer_sys::fuzz_target;
use loadcell_config::PersistedCalibration;

fuzz_target!(|data: &str| {
    // Whatever parses must survive a write/read cycle unchanged.
    if let Ok(cal) = PersistedCalibration::from_toml_str(data) {
        let text = cal.to_toml_string().expect("validated calibration serializes");
        let back = PersistedCalibration::from_toml_str(&text).expect("own output parses");
        assert_eq!(back.tare_raw, cal.tare_raw);
        assert_eq!(back.scale.to_bits(), cal.scale.to_bits());
    }
});
