//! Front-end assembly from the typed config: real devices with the
//! `hardware` feature on Linux, or a captured dump passed with `--replay`.

use std::path::Path;

use eyre::{WrapErr, eyre};
use loadcell_core::{FrontEndCfg, RegisterCfg};
use loadcell_hardware::nau7802::{Gain, Ldo, SampleRate};
use loadcell_hardware::{Nau7802Settings, Replay};
use loadcell_traits::{FrontEnd, RawSample};

/// Register codes for the physical settings in `[register]`.
pub fn nau7802_settings(r: &RegisterCfg) -> eyre::Result<Nau7802Settings> {
    let gain = Gain::from_factor(r.gain).ok_or_else(|| eyre!("unsupported gain x{}", r.gain))?;
    let rate = SampleRate::from_sps(r.sample_rate_sps)
        .ok_or_else(|| eyre!("unsupported sample rate {} SPS", r.sample_rate_sps))?;
    let ldo = Ldo::from_millivolts(r.ldo_mv)
        .ok_or_else(|| eyre!("unsupported LDO voltage {} mV", r.ldo_mv))?;
    Ok(Nau7802Settings {
        ldo_code: ldo.code(),
        gain_code: gain.code(),
        sample_rate_code: rate.code(),
        afe_timeout: r.afe_timeout,
        ..Nau7802Settings::default()
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn make_frontend(fe: &FrontEndCfg) -> eyre::Result<Box<dyn FrontEnd + Send>> {
    use loadcell_hardware::GainPulses;
    use loadcell_hardware::rpi::{open_hx711, open_nau7802};

    match fe {
        FrontEndCfg::Serial(s) => {
            let gain = GainPulses::from_count(s.gain_pulses)
                .ok_or_else(|| eyre!("gain_pulses must be 1..=3, got {}", s.gain_pulses))?;
            let hx = open_hx711(s.data_pin, s.clock_pin, s.pulse_width, gain)
                .wrap_err("open hx711 pins")?;
            Ok(Box::new(hx))
        }
        FrontEndCfg::Register(r) => {
            let nau = open_nau7802(r.i2c_address, nau7802_settings(r)?)
                .wrap_err("open nau7802 i2c bus")?;
            Ok(Box::new(nau))
        }
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn make_frontend(fe: &FrontEndCfg) -> eyre::Result<Box<dyn FrontEnd + Send>> {
    if let FrontEndCfg::Register(r) = fe {
        nau7802_settings(r)?;
    }
    Err(eyre::Report::new(loadcell_core::ScaleError::Config(
        "built without hardware support; pass --replay FILE to run on a captured dump".into(),
    )))
}

/// Reads the `raw` column of a capture written by `dump` (`index,raw`).
pub fn read_capture(path: &Path) -> eyre::Result<Vec<RawSample>> {
    let mut rdr = csv::Reader::from_path(path)
        .wrap_err_with(|| format!("open capture {}", path.display()))?;
    let col = rdr
        .headers()
        .wrap_err("read capture header")?
        .iter()
        .position(|h| h.trim() == "raw")
        .ok_or_else(|| eyre!("capture {} has no `raw` column", path.display()))?;

    let mut codes = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec.wrap_err_with(|| format!("capture row {}", line + 1))?;
        let field = rec
            .get(col)
            .ok_or_else(|| eyre!("capture row {} is missing the raw field", line + 1))?;
        let code = field
            .trim()
            .parse::<RawSample>()
            .wrap_err_with(|| format!("capture row {}: {field:?}", line + 1))?;
        codes.push(code);
    }
    Ok(codes)
}

/// Captured codes played back in a loop, paced like the configured device.
pub fn replay_frontend(fe: &FrontEndCfg, path: &Path) -> eyre::Result<Box<dyn FrontEnd + Send>> {
    let mut replay = Replay::new(read_capture(path)?).looping(true);
    if let FrontEndCfg::Register(r) = fe {
        nau7802_settings(r)?;
        replay = replay.with_period(r.poll_interval);
    }
    tracing::info!(capture = %path.display(), samples = replay.remaining(), "replaying capture");
    Ok(Box::new(replay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn register(gain: u16, sps: u16, ldo_mv: u16) -> RegisterCfg {
        RegisterCfg {
            i2c_address: 0x2A,
            poll_interval: Duration::from_millis(10),
            sample_rate_sps: sps,
            gain,
            ldo_mv,
            afe_timeout: Duration::from_millis(750),
        }
    }

    #[test]
    fn physical_settings_map_to_codes() {
        let s = nau7802_settings(&register(128, 80, 3300)).unwrap();
        assert_eq!(s.gain_code, 7);
        assert_eq!(s.sample_rate_code, 3);
        assert_eq!(s.ldo_code, 4);
        assert_eq!(s.afe_timeout, Duration::from_millis(750));
    }

    #[test]
    fn capture_reads_raw_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.csv");
        std::fs::write(&path, "index,raw\n0,-5\n1, 12\n2,8388607\n").unwrap();
        assert_eq!(read_capture(&path).unwrap(), vec![-5, 12, 8_388_607]);
    }

    #[test]
    fn capture_with_garbage_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.csv");
        std::fs::write(&path, "index,raw\n0,1\n1,abc\n").unwrap();
        let err = read_capture(&path).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"), "{err:#}");
    }

    #[test]
    fn unsupported_gain_is_rejected() {
        let err = nau7802_settings(&register(3, 80, 3300)).unwrap_err();
        assert!(err.to_string().contains("gain"));
    }
}
