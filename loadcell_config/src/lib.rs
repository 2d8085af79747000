#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and persisted calibration for the load-cell stack.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The calibration file is a small TOML document holding one
//!   `[calibration]` table; it takes precedence over the config's own
//!   `[calibration]` table, which takes precedence over `initial_*`.
use std::path::Path;

use serde::{Deserialize, Serialize};

/// PGA gains the register front end supports.
pub const REGISTER_GAINS: [u16; 8] = [1, 2, 4, 8, 16, 32, 64, 128];
/// Conversion rates (samples/s) the register front end supports.
pub const REGISTER_SAMPLE_RATES: [u16; 5] = [10, 20, 40, 80, 320];
/// LDO voltages (mV) the register front end supports.
pub const REGISTER_LDO_MV: [u16; 8] = [2400, 2700, 3000, 3300, 3600, 3900, 4200, 4500];

/// Serial clock high time at which the device powers down.
pub const SERIAL_POWER_DOWN_US: u64 = 60;
/// Longest pulse width accepted, leaving margin under the power-down time.
pub const SERIAL_MAX_PULSE_US: u64 = 50;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrontEndKind {
    /// Bit-banged HX711.
    #[default]
    Serial,
    /// NAU7802 on I2C.
    Register,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialSection {
    /// BCM pin numbers.
    pub data_pin: u8,
    pub clock_pin: u8,
    pub pulse_width_us: u64,
    /// Extra pulses after the data bits: 1 = gain 128, 2 = 32, 3 = 64.
    pub gain_pulses: u8,
    pub queue_capacity: usize,
    /// How long the producer blocks for a data-ready edge per cycle.
    pub edge_timeout_ms: u64,
    pub initial_tare_raw: i32,
    pub initial_scale: f64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            data_pin: 21,
            clock_pin: 20,
            pulse_width_us: 2,
            gain_pulses: 1,
            queue_capacity: 20,
            edge_timeout_ms: 200,
            initial_tare_raw: -267_362,
            initial_scale: 0.000_225_27,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RegisterSection {
    pub i2c_address: u16,
    pub poll_interval_ms: u64,
    pub sample_rate_sps: u16,
    pub gain: u16,
    pub ldo_mv: u16,
    pub queue_capacity: usize,
    pub afe_timeout_ms: u64,
    pub initial_tare_raw: i32,
    pub initial_scale: f64,
}

impl Default for RegisterSection {
    fn default() -> Self {
        Self {
            i2c_address: 0x2A,
            poll_interval_ms: 100,
            sample_rate_sps: 20,
            gain: 64,
            ldo_mv: 3300,
            // 10 samples/s polled for 2 s
            queue_capacity: 20,
            afe_timeout_ms: 1000,
            initial_tare_raw: 0,
            initial_scale: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquisitionSection {
    /// Samples averaged per weight; defaults depend on the front end.
    pub samples_per_weight: Option<usize>,
    /// Samples averaged for each calibration capture.
    pub calibration_samples: usize,
    /// Deadline for a collection waiting on fresh samples.
    pub request_timeout_ms: u64,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            samples_per_weight: None,
            calibration_samples: 10,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PersistedCalibration {
    /// Raw code at zero load.
    pub tare_raw: i32,
    /// Weight units per raw count.
    pub scale: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct CalibrationFile {
    calibration: PersistedCalibration,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub frontend: FrontEndKind,
    pub serial: Option<SerialSection>,
    pub register: Option<RegisterSection>,
    #[serde(default)]
    pub acquisition: AcquisitionSection,
    #[serde(default)]
    pub logging: Logging,
    /// Optional persisted calibration; preferred over `initial_*`.
    #[serde(default)]
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn samples_per_weight(&self) -> usize {
        self.acquisition
            .samples_per_weight
            .unwrap_or(match self.frontend {
                FrontEndKind::Serial => 8,
                FrontEndKind::Register => 5,
            })
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        match self.frontend {
            FrontEndKind::Serial => self.serial.as_ref().map(|s| s.queue_capacity),
            FrontEndKind::Register => self.register.as_ref().map(|r| r.queue_capacity),
        }
    }

    /// Calibration to start from: `persisted`, else `[calibration]`, else
    /// the selected section's `initial_*` values.
    pub fn effective_calibration(
        &self,
        persisted: Option<PersistedCalibration>,
    ) -> Option<PersistedCalibration> {
        persisted.or(self.calibration).or_else(|| match self.frontend {
            FrontEndKind::Serial => self.serial.as_ref().map(|s| PersistedCalibration {
                tare_raw: s.initial_tare_raw,
                scale: s.initial_scale,
            }),
            FrontEndKind::Register => self.register.as_ref().map(|r| PersistedCalibration {
                tare_raw: r.initial_tare_raw,
                scale: r.initial_scale,
            }),
        })
    }

    pub fn validate(&self) -> eyre::Result<()> {
        match self.frontend {
            FrontEndKind::Serial => {
                let Some(s) = &self.serial else {
                    eyre::bail!("frontend = \"serial\" requires a [serial] section");
                };
                s.validate()?;
            }
            FrontEndKind::Register => {
                let Some(r) = &self.register else {
                    eyre::bail!("frontend = \"register\" requires a [register] section");
                };
                r.validate()?;
            }
        }

        // Acquisition
        if let Some(n) = self.acquisition.samples_per_weight
            && n < 2
        {
            eyre::bail!("acquisition.samples_per_weight must be >= 2");
        }
        if self.acquisition.calibration_samples < 2 {
            eyre::bail!("acquisition.calibration_samples must be >= 2");
        }
        if self.acquisition.request_timeout_ms == 0 {
            eyre::bail!("acquisition.request_timeout_ms must be >= 1");
        }

        // Calibration
        if let Some(c) = &self.calibration {
            c.validate()?;
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {r:?}");
        }

        Ok(())
    }
}

impl SerialSection {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.data_pin == self.clock_pin {
            eyre::bail!("serial.data_pin and serial.clock_pin must differ");
        }
        if self.pulse_width_us == 0 || self.pulse_width_us >= SERIAL_MAX_PULSE_US {
            eyre::bail!(
                "serial.pulse_width_us must be in 1..{SERIAL_MAX_PULSE_US} (device powers down after {SERIAL_POWER_DOWN_US} us)"
            );
        }
        if !(1..=3).contains(&self.gain_pulses) {
            eyre::bail!("serial.gain_pulses must be 1, 2 or 3");
        }
        if self.queue_capacity == 0 {
            eyre::bail!("serial.queue_capacity must be >= 1");
        }
        if self.edge_timeout_ms == 0 {
            eyre::bail!("serial.edge_timeout_ms must be >= 1");
        }
        check_scale("serial.initial_scale", self.initial_scale)
    }
}

impl RegisterSection {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.i2c_address > 0x7F {
            eyre::bail!("register.i2c_address must be a 7-bit address");
        }
        if self.poll_interval_ms == 0 {
            eyre::bail!("register.poll_interval_ms must be >= 1");
        }
        if !REGISTER_SAMPLE_RATES.contains(&self.sample_rate_sps) {
            eyre::bail!(
                "register.sample_rate_sps must be one of {REGISTER_SAMPLE_RATES:?}, got {}",
                self.sample_rate_sps
            );
        }
        if !REGISTER_GAINS.contains(&self.gain) {
            eyre::bail!(
                "register.gain must be one of {REGISTER_GAINS:?}, got {}",
                self.gain
            );
        }
        if !REGISTER_LDO_MV.contains(&self.ldo_mv) {
            eyre::bail!(
                "register.ldo_mv must be one of {REGISTER_LDO_MV:?}, got {}",
                self.ldo_mv
            );
        }
        if self.queue_capacity == 0 {
            eyre::bail!("register.queue_capacity must be >= 1");
        }
        if self.afe_timeout_ms == 0 {
            eyre::bail!("register.afe_timeout_ms must be >= 1");
        }
        check_scale("register.initial_scale", self.initial_scale)
    }
}

impl PersistedCalibration {
    pub fn validate(&self) -> eyre::Result<()> {
        check_scale("calibration.scale", self.scale)
    }

    /// Render as a standalone calibration file.
    pub fn to_toml_string(&self) -> eyre::Result<String> {
        self.validate()?;
        let file = CalibrationFile { calibration: *self };
        toml::to_string(&file).map_err(|e| eyre::eyre!("serialize calibration: {e}"))
    }

    pub fn from_toml_str(s: &str) -> eyre::Result<Self> {
        let file: CalibrationFile =
            toml::from_str(s).map_err(|e| eyre::eyre!("parse calibration: {e}"))?;
        file.calibration.validate()?;
        Ok(file.calibration)
    }
}

fn check_scale(field: &str, scale: f64) -> eyre::Result<()> {
    if !scale.is_finite() || scale == 0.0 {
        eyre::bail!("{field} must be finite and non-zero");
    }
    Ok(())
}

/// Read a calibration file. A missing file is not an error.
pub fn load_calibration_file(path: &Path) -> eyre::Result<Option<PersistedCalibration>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(eyre::eyre!("read calibration file {}: {e}", path.display())),
    };
    PersistedCalibration::from_toml_str(&text)
        .map(Some)
        .map_err(|e| eyre::eyre!("{}: {e}", path.display()))
}
