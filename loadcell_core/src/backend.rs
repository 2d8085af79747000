//! The owned backend instance and the operation surface it exposes.
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use loadcell_traits::{Clock, RawSample};
use tracing::{info, warn};

use crate::calibration::{CalibrationState, CalibrationStore};
use crate::config::AcquisitionCfg;
use crate::controller::{AcquisitionController, Collected, CollectionRequest, CollectionResult};
use crate::error::ScaleError;
use crate::queue::SampleQueue;
use crate::sampler::Sampler;
use crate::status::Acquisition;

/// Sleep between checks while waiting for fresh samples.
const FRESH_POLL: Duration = Duration::from_millis(5);

/// Operations offered to the application layer. Both front ends expose the
/// same surface.
pub trait ScaleBackend {
    fn frontend_name(&self) -> &'static str;

    /// Filtered, calibrated weight from buffered samples. Not clamped;
    /// callers decide how to show negative values.
    fn request_weight(&mut self) -> Acquisition<f64>;

    fn request_raw_average(&mut self, n: usize) -> Acquisition<RawSample>;

    /// Unfiltered buffered samples, oldest first; may be shorter than `n`.
    fn request_raw_dump(&mut self, n: usize) -> Acquisition<Vec<RawSample>>;

    /// Filtered average of `n` samples taken after the call; blocks until
    /// they arrive or the request deadline passes.
    fn capture_raw_average(&mut self, n: usize) -> Acquisition<RawSample>;

    fn set_calibration_data(
        &mut self,
        tare_raw: RawSample,
        weight_raw: RawSample,
        actual_weight: f64,
    ) -> Result<CalibrationState, ScaleError>;

    fn calibration_data(&self) -> CalibrationState;

    fn set_tare(&mut self, tare_raw: RawSample) -> Result<(), ScaleError>;

    /// Pause the application's periodic weight polling (sampling goes on).
    fn suspend_polling(&mut self);

    fn resume_polling(&mut self);

    fn polling_enabled(&self) -> bool;
}

pub struct Scale {
    pub(crate) frontend: &'static str,
    pub(crate) queue: Arc<SampleQueue>,
    pub(crate) controller: AcquisitionController,
    pub(crate) calibration: CalibrationState,
    pub(crate) store: Box<dyn CalibrationStore + Send>,
    pub(crate) acquisition: AcquisitionCfg,
    pub(crate) polling: bool,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) sampler: Option<Sampler>,
}

impl core::fmt::Debug for Scale {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scale")
            .field("frontend", &self.frontend)
            .field("calibration", &self.calibration)
            .field("buffered", &self.queue.len())
            .field("pending", &self.controller.pending_request())
            .field("polling", &self.polling)
            .finish()
    }
}

impl Scale {
    pub fn acquisition_cfg(&self) -> &AcquisitionCfg {
        &self.acquisition
    }

    /// Start an asynchronous collection; see [`AcquisitionController::submit`].
    #[must_use]
    pub fn submit(&mut self, request: CollectionRequest) -> bool {
        self.controller.submit(request)
    }

    /// Drive the pending collection. Returns `true` when a result was
    /// published on [`Scale::results`].
    pub fn poll_pending(&mut self) -> bool {
        self.controller.poll(&self.calibration)
    }

    pub fn results(&self) -> xch::Receiver<CollectionResult> {
        self.controller.results()
    }

    /// Submit `request` and block until its result is published. Results
    /// of earlier submissions still sitting in the channel are dropped.
    pub fn collect_fresh(&mut self, request: CollectionRequest) -> Acquisition<Collected> {
        if !self.controller.submit(request) {
            return Acquisition::Rejected;
        }
        while !self.controller.poll(&self.calibration) {
            self.clock.sleep(FRESH_POLL);
        }
        self.controller
            .results()
            .try_iter()
            .last()
            .map_or(Acquisition::NotReady, |r| r.outcome)
    }

    /// Most recent sample, unfiltered.
    pub fn latest_raw(&self) -> Option<RawSample> {
        self.queue.latest()
    }

    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Milliseconds since the producer last pushed a sample. `None` when
    /// samples come from an external producer.
    pub fn stalled_for_ms(&self) -> Option<u64> {
        self.sampler.as_ref().map(Sampler::stalled_for_now)
    }

    pub fn producer_errors(&self) -> u64 {
        self.sampler.as_ref().map_or(0, Sampler::error_count)
    }

    fn persist(&mut self) -> Result<(), ScaleError> {
        self.store.persist(&self.calibration).map_err(|e| {
            warn!(error = %e, "calibration persistence failed");
            ScaleError::Persist(e.to_string())
        })
    }
}

impl ScaleBackend for Scale {
    fn frontend_name(&self) -> &'static str {
        self.frontend
    }

    fn request_weight(&mut self) -> Acquisition<f64> {
        let request = CollectionRequest::weight(self.acquisition.samples_per_weight);
        self.controller
            .collect(request, &self.calibration)
            .map(|c| c.weight().unwrap_or_default())
    }

    fn request_raw_average(&mut self, n: usize) -> Acquisition<RawSample> {
        self.controller
            .collect(CollectionRequest::raw_avg(n), &self.calibration)
            .map(|c| c.raw_average().unwrap_or_default())
    }

    fn request_raw_dump(&mut self, n: usize) -> Acquisition<Vec<RawSample>> {
        self.controller
            .collect(CollectionRequest::raw(n), &self.calibration)
            .map(|c| c.raw().unwrap_or_default())
    }

    fn capture_raw_average(&mut self, n: usize) -> Acquisition<RawSample> {
        self.collect_fresh(CollectionRequest::raw_avg(n))
            .map(|c| c.raw_average().unwrap_or_default())
    }

    fn set_calibration_data(
        &mut self,
        tare_raw: RawSample,
        weight_raw: RawSample,
        actual_weight: f64,
    ) -> Result<CalibrationState, ScaleError> {
        self.calibration
            .set_calibration_data(tare_raw, weight_raw, actual_weight)?;
        info!(
            tare_raw,
            weight_raw,
            actual_weight,
            scale = self.calibration.scale,
            "calibration updated"
        );
        self.persist()?;
        Ok(self.calibration)
    }

    fn calibration_data(&self) -> CalibrationState {
        self.calibration
    }

    fn set_tare(&mut self, tare_raw: RawSample) -> Result<(), ScaleError> {
        self.calibration.set_tare(tare_raw);
        info!(tare_raw, "tare updated");
        self.persist()
    }

    fn suspend_polling(&mut self) {
        self.polling = false;
    }

    fn resume_polling(&mut self) {
        self.polling = true;
    }

    fn polling_enabled(&self) -> bool {
        self.polling
    }
}
