#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Load-cell acquisition and calibration (hardware-agnostic).
//!
//! Device access goes through `loadcell_traits::FrontEnd`; everything here
//! runs against any implementation of it.
//!
//! ## Architecture
//!
//! - **Producer**: a [`Sampler`] thread services the front end and pushes
//!   raw codes into a bounded [`SampleQueue`]
//! - **Filtering**: median with outlier clamping (`processor` module)
//! - **Requests**: one pending collection at a time, answered when enough
//!   fresh samples exist or the deadline passes (`controller` module)
//! - **Calibration**: linear tare/scale model plus a persistence seam
//!   (`calibration` module) and the interactive two-point flow (`session`)
//! - **Backend**: [`Scale`] ties the above together behind [`ScaleBackend`]

pub mod atomic;
pub mod backend;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod processor;
pub mod queue;
pub mod sampler;
pub mod session;
pub mod status;

pub use backend::{Scale, ScaleBackend};
pub use builder::ScaleBuilder;
pub use calibration::{CalibrationState, CalibrationStore};
pub use config::{AcquisitionCfg, BackendCfg, FrontEndCfg, RegisterCfg, SerialCfg};
pub use controller::{
    AcquisitionController, Collected, CollectionMode, CollectionRequest, CollectionResult,
};
pub use error::{BuildError, Result, ScaleError};
pub use queue::SampleQueue;
pub use sampler::{Drive, Sampler};
pub use session::{CalibrationPhase, Calibrator, StepOutcome};
pub use status::Acquisition;
