//! Two-point calibration, driven by explicit user confirmations.
//!
//! ```text
//! NoCal --begin--> AwaitTareConfirm --confirm--> AwaitReferenceConfirm --confirm--> NoCal
//!                         |                              |
//!                         +------------cancel------------+--> NoCal
//! ```
//!
//! Periodic weight polling is suspended for the whole session and resumed
//! whenever it ends, whether by completion, cancellation or error.
use loadcell_traits::RawSample;
use tracing::{info, warn};

use crate::backend::ScaleBackend;
use crate::calibration::CalibrationState;
use crate::error::ScaleError;
use crate::status::Acquisition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    NoCal,
    AwaitTareConfirm,
    AwaitReferenceConfirm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSession {
    pub reference_weight: f64,
    pub tare_raw_avg: Option<RawSample>,
    pub reference_raw_avg: Option<RawSample>,
}

/// What a `confirm_step` achieved.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Tare captured; waiting for the reference weight.
    TareCaptured(RawSample),
    /// Calibration applied and persisted; the session is over.
    Calibrated(CalibrationState),
    /// The capture could not complete; the phase is unchanged, confirm again.
    Retry,
}

#[derive(Debug)]
pub struct Calibrator {
    samples: usize,
    session: Option<CalibrationSession>,
}

impl Calibrator {
    /// `samples`: raw-average size for each capture.
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            session: None,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        match &self.session {
            None => CalibrationPhase::NoCal,
            Some(s) if s.tare_raw_avg.is_none() => CalibrationPhase::AwaitTareConfirm,
            Some(_) => CalibrationPhase::AwaitReferenceConfirm,
        }
    }

    pub fn session(&self) -> Option<&CalibrationSession> {
        self.session.as_ref()
    }

    pub fn begin<B: ScaleBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        reference_weight: f64,
    ) -> Result<(), ScaleError> {
        if self.session.is_some() {
            return Err(ScaleError::State(
                "calibration already in progress".into(),
            ));
        }
        if !reference_weight.is_finite() || reference_weight <= 0.0 {
            return Err(ScaleError::InvalidReferenceWeight(reference_weight));
        }
        backend.suspend_polling();
        self.session = Some(CalibrationSession {
            reference_weight,
            tare_raw_avg: None,
            reference_raw_avg: None,
        });
        info!(reference_weight, "calibration started");
        Ok(())
    }

    pub fn confirm_step<B: ScaleBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<StepOutcome, ScaleError> {
        let phase = self.phase();
        let Some(session) = self.session.as_mut() else {
            return Err(ScaleError::State("no calibration in progress".into()));
        };

        let raw = match backend.capture_raw_average(self.samples) {
            Acquisition::Ready(raw) => raw,
            other => {
                warn!(?phase, outcome = ?other, "calibration capture incomplete");
                return Ok(StepOutcome::Retry);
            }
        };

        if phase == CalibrationPhase::AwaitTareConfirm {
            session.tare_raw_avg = Some(raw);
            info!(tare_raw_avg = raw, "tare captured");
            return Ok(StepOutcome::TareCaptured(raw));
        }

        session.reference_raw_avg = Some(raw);
        let tare = session.tare_raw_avg.unwrap_or_default();
        let weight = session.reference_weight;
        let result = backend.set_calibration_data(tare, raw, weight);
        self.finish(backend);
        result.map(StepOutcome::Calibrated)
    }

    /// Abandon the session. Returns `false` when none was running.
    pub fn cancel<B: ScaleBackend + ?Sized>(&mut self, backend: &mut B) -> bool {
        if self.session.is_none() {
            return false;
        }
        info!("calibration cancelled");
        self.finish(backend);
        true
    }

    fn finish<B: ScaleBackend + ?Sized>(&mut self, backend: &mut B) {
        self.session = None;
        backend.resume_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Backend double: scripted capture results, records calibration calls.
    struct FakeBackend {
        captures: VecDeque<Acquisition<RawSample>>,
        calibration: CalibrationState,
        polling: bool,
    }

    impl FakeBackend {
        fn with(captures: Vec<Acquisition<RawSample>>) -> Self {
            Self {
                captures: captures.into(),
                calibration: CalibrationState::new(0, 1.0),
                polling: true,
            }
        }
    }

    impl ScaleBackend for FakeBackend {
        fn frontend_name(&self) -> &'static str {
            "fake"
        }
        fn request_weight(&mut self) -> Acquisition<f64> {
            Acquisition::NotReady
        }
        fn request_raw_average(&mut self, _n: usize) -> Acquisition<RawSample> {
            Acquisition::NotReady
        }
        fn request_raw_dump(&mut self, _n: usize) -> Acquisition<Vec<RawSample>> {
            Acquisition::Ready(Vec::new())
        }
        fn capture_raw_average(&mut self, _n: usize) -> Acquisition<RawSample> {
            self.captures.pop_front().unwrap_or(Acquisition::NotReady)
        }
        fn set_calibration_data(
            &mut self,
            tare_raw: RawSample,
            weight_raw: RawSample,
            actual_weight: f64,
        ) -> Result<CalibrationState, ScaleError> {
            self.calibration
                .set_calibration_data(tare_raw, weight_raw, actual_weight)?;
            Ok(self.calibration)
        }
        fn calibration_data(&self) -> CalibrationState {
            self.calibration
        }
        fn set_tare(&mut self, tare_raw: RawSample) -> Result<(), ScaleError> {
            self.calibration.set_tare(tare_raw);
            Ok(())
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

    #[test]
    fn full_session_updates_calibration() {
        let mut b = FakeBackend::with(vec![Acquisition::Ready(1000), Acquisition::Ready(5000)]);
        let mut cal = Calibrator::new(10);
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);

        cal.begin(&mut b, 10.0).unwrap();
        assert_eq!(cal.phase(), CalibrationPhase::AwaitTareConfirm);
        assert!(!b.polling_enabled());

        assert_eq!(cal.confirm_step(&mut b).unwrap(), StepOutcome::TareCaptured(1000));
        assert_eq!(cal.phase(), CalibrationPhase::AwaitReferenceConfirm);

        let StepOutcome::Calibrated(state) = cal.confirm_step(&mut b).unwrap() else {
            panic!("expected calibration");
        };
        assert_eq!(state.tare_raw, 1000);
        assert!((state.scale - 0.0025).abs() < 1e-12);
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);
        assert!(b.polling_enabled());
    }

    #[test]
    fn begin_only_from_nocal() {
        let mut b = FakeBackend::with(vec![]);
        let mut cal = Calibrator::new(10);
        cal.begin(&mut b, 5.0).unwrap();
        assert!(matches!(cal.begin(&mut b, 5.0), Err(ScaleError::State(_))));
    }

    #[test]
    fn begin_rejects_bad_reference_weight() {
        let mut b = FakeBackend::with(vec![]);
        let mut cal = Calibrator::new(10);
        assert!(matches!(
            cal.begin(&mut b, -1.0),
            Err(ScaleError::InvalidReferenceWeight(_))
        ));
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);
        assert!(b.polling_enabled());
    }

    #[test]
    fn confirm_without_session_is_state_error() {
        let mut b = FakeBackend::with(vec![]);
        let mut cal = Calibrator::new(10);
        assert!(matches!(cal.confirm_step(&mut b), Err(ScaleError::State(_))));
    }

    #[test]
    fn incomplete_capture_keeps_phase() {
        let mut b = FakeBackend::with(vec![Acquisition::NotReady, Acquisition::Ready(1000)]);
        let mut cal = Calibrator::new(10);
        cal.begin(&mut b, 10.0).unwrap();
        assert_eq!(cal.confirm_step(&mut b).unwrap(), StepOutcome::Retry);
        assert_eq!(cal.phase(), CalibrationPhase::AwaitTareConfirm);
        assert_eq!(cal.confirm_step(&mut b).unwrap(), StepOutcome::TareCaptured(1000));
    }

    #[test]
    fn cancel_from_either_await_state() {
        let mut b = FakeBackend::with(vec![Acquisition::Ready(1000)]);
        let mut cal = Calibrator::new(10);
        assert!(!cal.cancel(&mut b));

        cal.begin(&mut b, 10.0).unwrap();
        assert!(cal.cancel(&mut b));
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);
        assert!(b.polling_enabled());

        cal.begin(&mut b, 10.0).unwrap();
        cal.confirm_step(&mut b).unwrap();
        assert!(cal.cancel(&mut b));
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);
        assert_eq!(b.calibration_data(), CalibrationState::new(0, 1.0));
    }

    #[test]
    fn degenerate_capture_aborts_session_untouched() {
        let mut b = FakeBackend::with(vec![Acquisition::Ready(1234), Acquisition::Ready(1234)]);
        let mut cal = Calibrator::new(10);
        cal.begin(&mut b, 10.0).unwrap();
        cal.confirm_step(&mut b).unwrap();

        let err = cal.confirm_step(&mut b).unwrap_err();
        assert_eq!(err, ScaleError::DegenerateCalibration { raw: 1234 });
        assert_eq!(cal.phase(), CalibrationPhase::NoCal);
        assert!(b.polling_enabled());
        assert_eq!(b.calibration_data(), CalibrationState::new(0, 1.0));
    }
}
