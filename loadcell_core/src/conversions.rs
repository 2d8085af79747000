//! Bridges from `loadcell_config` types to runtime types.
use std::time::Duration;

use loadcell_config::{Config, FrontEndKind, PersistedCalibration};

use crate::calibration::CalibrationState;
use crate::config::{AcquisitionCfg, BackendCfg, FrontEndCfg, RegisterCfg, SerialCfg};
use crate::error::ScaleError;

impl From<&loadcell_config::SerialSection> for SerialCfg {
    fn from(s: &loadcell_config::SerialSection) -> Self {
        Self {
            data_pin: s.data_pin,
            clock_pin: s.clock_pin,
            pulse_width: Duration::from_micros(s.pulse_width_us),
            gain_pulses: s.gain_pulses,
            edge_timeout: Duration::from_millis(s.edge_timeout_ms),
        }
    }
}

impl From<&loadcell_config::RegisterSection> for RegisterCfg {
    fn from(r: &loadcell_config::RegisterSection) -> Self {
        Self {
            i2c_address: r.i2c_address,
            poll_interval: Duration::from_millis(r.poll_interval_ms),
            sample_rate_sps: r.sample_rate_sps,
            gain: r.gain,
            ldo_mv: r.ldo_mv,
            afe_timeout: Duration::from_millis(r.afe_timeout_ms),
        }
    }
}

impl From<PersistedCalibration> for CalibrationState {
    fn from(c: PersistedCalibration) -> Self {
        Self::new(c.tare_raw, c.scale)
    }
}

impl From<CalibrationState> for PersistedCalibration {
    fn from(c: CalibrationState) -> Self {
        Self {
            tare_raw: c.tare_raw,
            scale: c.scale,
        }
    }
}

/// The front end selected by `frontend = ...`.
pub fn frontend_cfg(cfg: &Config) -> Result<FrontEndCfg, ScaleError> {
    match cfg.frontend {
        FrontEndKind::Serial => cfg
            .serial
            .as_ref()
            .map(|s| FrontEndCfg::Serial(s.into()))
            .ok_or_else(|| ScaleError::Config("missing [serial] section".into())),
        FrontEndKind::Register => cfg
            .register
            .as_ref()
            .map(|r| FrontEndCfg::Register(r.into()))
            .ok_or_else(|| ScaleError::Config("missing [register] section".into())),
    }
}

pub fn backend_cfg(cfg: &Config) -> Result<BackendCfg, ScaleError> {
    let frontend = frontend_cfg(cfg)?;
    let queue_capacity = cfg
        .queue_capacity()
        .ok_or_else(|| ScaleError::Config("missing front end section".into()))?;
    Ok(BackendCfg {
        queue_capacity,
        acquisition: AcquisitionCfg {
            samples_per_weight: cfg.samples_per_weight(),
            calibration_samples: cfg.acquisition.calibration_samples,
            request_timeout: Duration::from_millis(cfg.acquisition.request_timeout_ms),
        },
        drive: frontend.drive(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Drive;

    #[test]
    fn register_config_maps_to_paced_drive() {
        let cfg = loadcell_config::load_toml(
            "frontend = \"register\"\n[register]\npoll_interval_ms = 50\n[acquisition]\ncalibration_samples = 12\n",
        )
        .unwrap();
        let b = backend_cfg(&cfg).unwrap();
        assert_eq!(
            b.drive,
            Drive::Paced {
                interval: Duration::from_millis(50)
            }
        );
        assert_eq!(b.queue_capacity, 20);
        assert_eq!(b.acquisition.samples_per_weight, 5);
        assert_eq!(b.acquisition.calibration_samples, 12);
    }

    #[test]
    fn serial_config_maps_to_event_drive() {
        let cfg = loadcell_config::load_toml("[serial]\npulse_width_us = 3\n").unwrap();
        let FrontEndCfg::Serial(s) = frontend_cfg(&cfg).unwrap() else {
            panic!("expected serial front end");
        };
        assert_eq!(s.pulse_width, Duration::from_micros(3));
        assert_eq!(
            s.drive(),
            Drive::Event {
                edge_timeout: Duration::from_millis(200)
            }
        );
    }

    #[test]
    fn missing_section_is_config_error() {
        let cfg = loadcell_config::load_toml("frontend = \"register\"\n").unwrap();
        assert!(matches!(backend_cfg(&cfg), Err(ScaleError::Config(_))));
    }

    #[test]
    fn calibration_conversions() {
        let p = PersistedCalibration {
            tare_raw: -5,
            scale: 0.5,
        };
        let s = CalibrationState::from(p);
        assert_eq!(s, CalibrationState::new(-5, 0.5));
        assert_eq!(PersistedCalibration::from(s), p);
    }
}
