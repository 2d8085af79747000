//! Runtime configuration for the backend and its front ends.
//!
//! Separate from the TOML schema in `loadcell_config`; see `conversions`.
use std::time::Duration;

use crate::sampler::Drive;

/// Bit-banged serial front end.
#[derive(Debug, Clone)]
pub struct SerialCfg {
    pub data_pin: u8,
    pub clock_pin: u8,
    pub pulse_width: Duration,
    /// Extra clock pulses after the data bits (1..=3).
    pub gain_pulses: u8,
    pub edge_timeout: Duration,
}

impl SerialCfg {
    pub fn drive(&self) -> Drive {
        Drive::Event {
            edge_timeout: self.edge_timeout,
        }
    }
}

/// I2C register front end. Gain, rate and LDO are kept in physical units
/// and turned into register codes by the driver.
#[derive(Debug, Clone)]
pub struct RegisterCfg {
    pub i2c_address: u16,
    pub poll_interval: Duration,
    pub sample_rate_sps: u16,
    pub gain: u16,
    pub ldo_mv: u16,
    pub afe_timeout: Duration,
}

impl RegisterCfg {
    pub fn drive(&self) -> Drive {
        Drive::Paced {
            interval: self.poll_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionCfg {
    pub samples_per_weight: usize,
    pub calibration_samples: usize,
    pub request_timeout: Duration,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            samples_per_weight: 8,
            calibration_samples: 10,
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FrontEndCfg {
    Serial(SerialCfg),
    Register(RegisterCfg),
}

impl FrontEndCfg {
    pub fn drive(&self) -> Drive {
        match self {
            Self::Serial(s) => s.drive(),
            Self::Register(r) => r.drive(),
        }
    }
}

/// Everything the builder needs apart from the front end itself.
#[derive(Debug, Clone)]
pub struct BackendCfg {
    pub queue_capacity: usize,
    pub acquisition: AcquisitionCfg,
    pub drive: Drive,
}

impl Default for BackendCfg {
    fn default() -> Self {
        Self {
            queue_capacity: 20,
            acquisition: AcquisitionCfg::default(),
            drive: Drive::Event {
                edge_timeout: Duration::from_millis(200),
            },
        }
    }
}
