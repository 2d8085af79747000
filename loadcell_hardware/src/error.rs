use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("bus error: {0}")]
    Bus(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("nau7802 power-up ready bit not set after {retries} polls")]
    PowerUpTimeout { retries: u32 },
    #[error("nau7802 AFE calibration timeout after {timeout_ms} ms")]
    AfeCalibrationTimeout { timeout_ms: u64 },
    #[error("nau7802 AFE calibration reported an error")]
    AfeCalibrationFailed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<loadcell_traits::BoxError> for HwError {
    fn from(e: loadcell_traits::BoxError) -> Self {
        match e.downcast::<HwError>() {
            Ok(hw) => *hw,
            Err(other) => HwError::Bus(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
