//! Builder for [`Scale`].
//!
//! `try_build()` validates the configuration, runs the front end's setup
//! sequence and only then spawns the producer thread, so a device that
//! fails bring-up never yields a usable backend.

use std::num::NonZeroUsize;
use std::sync::Arc;

use loadcell_traits::{Clock, FrontEnd, MonotonicClock};
use tracing::info;

use crate::backend::Scale;
use crate::calibration::{CalibrationState, CalibrationStore};
use crate::config::BackendCfg;
use crate::controller::AcquisitionController;
use crate::error::{BuildError, Result, ScaleError};
use crate::mocks::NullStore;
use crate::queue::SampleQueue;
use crate::sampler::{Drive, Sampler};

pub struct ScaleBuilder {
    frontend: Option<Box<dyn FrontEnd + Send>>,
    cfg: BackendCfg,
    calibration: CalibrationState,
    store: Option<Box<dyn CalibrationStore + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for ScaleBuilder {
    fn default() -> Self {
        Self {
            frontend: None,
            cfg: BackendCfg::default(),
            calibration: CalibrationState::new(0, 1.0),
            store: None,
            clock: None,
        }
    }
}

impl Scale {
    pub fn builder() -> ScaleBuilder {
        ScaleBuilder::default()
    }
}

fn validate(cfg: &BackendCfg, calibration: &CalibrationState) -> Result<NonZeroUsize> {
    let Some(capacity) = NonZeroUsize::new(cfg.queue_capacity) else {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "queue_capacity must be >= 1",
        )));
    };
    if cfg.acquisition.samples_per_weight < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "samples_per_weight must be >= 2",
        )));
    }
    if cfg.acquisition.calibration_samples < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "calibration_samples must be >= 2",
        )));
    }
    if cfg.acquisition.request_timeout.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "request_timeout must be > 0",
        )));
    }
    match cfg.drive {
        Drive::Paced { interval } if interval.is_zero() => {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "poll interval must be > 0",
            )));
        }
        Drive::Event { edge_timeout } if edge_timeout.is_zero() => {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "edge timeout must be > 0",
            )));
        }
        _ => {}
    }
    if !calibration.scale.is_finite() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "calibration scale must be finite",
        )));
    }
    Ok(capacity)
}

impl ScaleBuilder {
    pub fn with_frontend(mut self, frontend: impl FrontEnd + Send + 'static) -> Self {
        self.frontend = Some(Box::new(frontend));
        self
    }

    pub fn with_config(mut self, cfg: BackendCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Starting tare/scale, typically from the persisted calibration.
    pub fn with_calibration(mut self, calibration: CalibrationState) -> Self {
        self.calibration = calibration;
        self
    }

    /// Where calibration changes are written. Defaults to nowhere.
    pub fn with_store(mut self, store: impl CalibrationStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate, run the front end's setup and start the producer thread.
    pub fn try_build(mut self) -> Result<Scale> {
        let mut frontend = self
            .frontend
            .take()
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFrontEnd))?;
        let capacity = validate(&self.cfg, &self.calibration)?;
        let name = frontend.name();

        frontend.setup().map_err(|e| {
            eyre::Report::new(ScaleError::Setup {
                frontend: name,
                reason: e.to_string(),
            })
        })?;
        info!(frontend = name, drive = ?self.cfg.drive, "front end ready");

        let queue = Arc::new(SampleQueue::new(capacity));
        let drive = self.cfg.drive;
        let mut scale = self.assemble(name, queue.clone());
        scale.sampler = Some(Sampler::spawn(frontend, queue, drive, scale.clock.clone()));
        Ok(scale)
    }

    /// Build without a producer thread; the caller pushes samples into the
    /// returned queue. A front end, if one was given, is ignored.
    pub fn build_with_external_producer(self) -> Result<(Scale, Arc<SampleQueue>)> {
        let capacity = validate(&self.cfg, &self.calibration)?;
        let queue = Arc::new(SampleQueue::new(capacity));
        let scale = self.assemble("external", queue.clone());
        Ok((scale, queue))
    }

    fn assemble(self, frontend: &'static str, queue: Arc<SampleQueue>) -> Scale {
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let controller = AcquisitionController::new(
            queue.clone(),
            clock.clone(),
            self.cfg.acquisition.request_timeout,
        );
        Scale {
            frontend,
            queue,
            controller,
            calibration: self.calibration,
            store: self.store.unwrap_or_else(|| Box::new(NullStore)),
            acquisition: self.cfg.acquisition,
            polling: true,
            clock,
            sampler: None,
        }
    }
}

