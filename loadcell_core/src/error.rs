use loadcell_traits::RawSample;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("not enough samples buffered")]
    NotReady,
    #[error("another collection request is still pending")]
    Busy,
    #[error("{frontend} setup failed: {reason}")]
    Setup {
        frontend: &'static str,
        reason: String,
    },
    #[error("degenerate calibration: tare and reference both average {raw}")]
    DegenerateCalibration { raw: RawSample },
    #[error("reference weight must be finite and > 0, got {0}")]
    InvalidReferenceWeight(f64),
    #[error("invalid state: {0}")]
    State(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("calibration not persisted: {0}")]
    Persist(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing front end")]
    MissingFrontEnd,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
