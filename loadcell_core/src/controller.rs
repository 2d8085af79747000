//! Collection requests against the sample queue.
//!
//! Two paths share one guard:
//! - [`AcquisitionController::collect`] answers immediately from whatever is
//!   buffered.
//! - [`AcquisitionController::submit`] + [`AcquisitionController::poll`] wait
//!   for `count` samples pushed after submission, or the request deadline,
//!   and publish a [`CollectionResult`] on a channel.
//!
//! While a submitted request is pending every other request is rejected on
//! the spot; nothing is queued behind it.
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use loadcell_traits::{Clock, RawSample};
use tracing::debug;

use crate::calibration::CalibrationState;
use crate::processor::{self, Filtered};
use crate::queue::SampleQueue;
use crate::status::Acquisition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Unfiltered samples.
    Raw,
    RawAvg,
    Weight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionRequest {
    pub mode: CollectionMode,
    pub count: usize,
}

impl CollectionRequest {
    pub fn raw(count: usize) -> Self {
        Self {
            mode: CollectionMode::Raw,
            count,
        }
    }

    pub fn raw_avg(count: usize) -> Self {
        Self {
            mode: CollectionMode::RawAvg,
            count,
        }
    }

    pub fn weight(count: usize) -> Self {
        Self {
            mode: CollectionMode::Weight,
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    Raw(Vec<RawSample>),
    RawAverage { value: RawSample, filtered: Filtered },
    Weight { value: f64, filtered: Filtered },
}

impl Collected {
    pub fn raw(self) -> Option<Vec<RawSample>> {
        match self {
            Self::Raw(v) => Some(v),
            _ => None,
        }
    }

    pub fn raw_average(&self) -> Option<RawSample> {
        match self {
            Self::RawAverage { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn weight(&self) -> Option<f64> {
        match self {
            Self::Weight { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// A finished request together with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResult {
    pub request: CollectionRequest,
    pub outcome: Acquisition<Collected>,
}

#[derive(Debug)]
struct Pending {
    request: CollectionRequest,
    mark: u64,
    deadline: Instant,
}

pub struct AcquisitionController {
    queue: Arc<SampleQueue>,
    clock: Arc<dyn Clock + Send + Sync>,
    request_timeout: Duration,
    pending: Option<Pending>,
    tx: xch::Sender<CollectionResult>,
    rx: xch::Receiver<CollectionResult>,
}

impl AcquisitionController {
    pub fn new(
        queue: Arc<SampleQueue>,
        clock: Arc<dyn Clock + Send + Sync>,
        request_timeout: Duration,
    ) -> Self {
        let (tx, rx) = xch::unbounded();
        Self {
            queue,
            clock,
            request_timeout,
            pending: None,
            tx,
            rx,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_request(&self) -> Option<CollectionRequest> {
        self.pending.as_ref().map(|p| p.request)
    }

    /// Receiving end of the result channel.
    pub fn results(&self) -> xch::Receiver<CollectionResult> {
        self.rx.clone()
    }

    /// Answer from the samples already buffered. `Raw` always succeeds
    /// (possibly short or empty); the filtered modes need at least two.
    pub fn collect(
        &mut self,
        request: CollectionRequest,
        calibration: &CalibrationState,
    ) -> Acquisition<Collected> {
        if let Some(p) = &self.pending {
            debug!(?request, pending = ?p.request, "collection rejected");
            return Acquisition::Rejected;
        }
        let samples = self.queue.snapshot_last(request.count);
        debug!(?request, got = samples.len(), "collect from buffer");
        evaluate(request, samples, calibration)
    }

    /// Start waiting for fresh samples. Returns `false` when another request
    /// is still pending.
    #[must_use]
    pub fn submit(&mut self, request: CollectionRequest) -> bool {
        if let Some(p) = &self.pending {
            debug!(?request, pending = ?p.request, "submit rejected");
            return false;
        }
        self.pending = Some(Pending {
            request,
            mark: self.queue.total_pushed(),
            deadline: self.clock.now() + self.request_timeout,
        });
        debug!(?request, "collection submitted");
        true
    }

    /// Finish the pending request if enough fresh samples arrived or its
    /// deadline passed. Returns `true` when a result was published.
    pub fn poll(&mut self, calibration: &CalibrationState) -> bool {
        let Some(p) = &self.pending else {
            return false;
        };
        let request = p.request;
        let outcome = match self.queue.fresh_since(p.mark, request.count) {
            Some(samples) => evaluate(request, samples, calibration),
            None if self.clock.now() >= p.deadline => {
                debug!(?request, "collection deadline passed");
                Acquisition::NotReady
            }
            None => return false,
        };
        self.pending = None;
        // We hold a receiver ourselves, so the channel cannot be disconnected.
        let _ = self.tx.send(CollectionResult { request, outcome });
        true
    }

    /// Next published result, if any.
    pub fn try_result(&self) -> Option<CollectionResult> {
        self.rx.try_recv().ok()
    }

    /// Drop the pending request without publishing anything.
    pub fn cancel(&mut self) -> Option<CollectionRequest> {
        self.pending.take().map(|p| p.request)
    }
}

fn evaluate(
    request: CollectionRequest,
    samples: Vec<RawSample>,
    calibration: &CalibrationState,
) -> Acquisition<Collected> {
    if request.mode == CollectionMode::Raw {
        return Acquisition::Ready(Collected::Raw(samples));
    }
    let Some(filtered) = processor::process(&samples) else {
        return Acquisition::NotReady;
    };
    match request.mode {
        CollectionMode::RawAvg => Acquisition::Ready(Collected::RawAverage {
            value: filtered.mean_raw(),
            filtered,
        }),
        _ => match calibration.weight_of_batch(&filtered.samples) {
            Some(value) => Acquisition::Ready(Collected::Weight { value, filtered }),
            None => Acquisition::NotReady,
        },
    }
}
