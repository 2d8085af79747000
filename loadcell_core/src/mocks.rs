//! Test and helper doubles for loadcell_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadcell_traits::{BoxError, FrontEnd, RawSample};

use crate::calibration::{CalibrationState, CalibrationStore};

/// Discards every calibration change. Default store of the builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl CalibrationStore for NullStore {
    fn persist(&mut self, _state: &CalibrationState) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Keeps every persisted state; clones share the log.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub saved: Arc<Mutex<Vec<CalibrationState>>>,
}

impl MemoryStore {
    pub fn last(&self) -> Option<CalibrationState> {
        self.saved.lock().ok().and_then(|v| v.last().copied())
    }
}

impl CalibrationStore for MemoryStore {
    fn persist(&mut self, state: &CalibrationState) -> Result<(), BoxError> {
        self.saved
            .lock()
            .map_err(|_| "memory store poisoned")?
            .push(*state);
        Ok(())
    }
}

/// Plays back a fixed list of codes, one per `service` call, then idles.
#[derive(Debug)]
pub struct ScriptedFrontEnd {
    samples: VecDeque<RawSample>,
    setup_error: Option<String>,
}

impl ScriptedFrontEnd {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            setup_error: None,
        }
    }

    /// A front end whose bring-up fails with `reason`.
    pub fn failing_setup(reason: impl Into<String>) -> Self {
        Self {
            samples: VecDeque::new(),
            setup_error: Some(reason.into()),
        }
    }
}

impl FrontEnd for ScriptedFrontEnd {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn setup(&mut self) -> Result<(), BoxError> {
        match &self.setup_error {
            Some(reason) => Err(reason.clone().into()),
            None => Ok(()),
        }
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<RawSample>, BoxError> {
        match self.samples.pop_front() {
            Some(raw) => Ok(Some(raw)),
            None => {
                // Behave like a device with no data-ready edge.
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }
}
