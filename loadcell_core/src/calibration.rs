//! Linear raw-to-weight model: `weight = (raw - tare_raw) * scale`.
use loadcell_traits::{BoxError, RawSample};

use crate::error::ScaleError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    pub tare_raw: RawSample,
    /// Weight units per raw count.
    pub scale: f64,
}

impl CalibrationState {
    pub fn new(tare_raw: RawSample, scale: f64) -> Self {
        Self { tare_raw, scale }
    }

    #[inline]
    pub fn weight_of(&self, raw: RawSample) -> f64 {
        (f64::from(raw) - f64::from(self.tare_raw)) * self.scale
    }

    /// Mean of the per-sample weights. Every weight this crate reports goes
    /// through here.
    pub fn weight_of_batch(&self, samples: &[RawSample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let total: f64 = samples.iter().map(|&s| self.weight_of(s)).sum();
        Some(total / samples.len() as f64)
    }

    /// Derive both fields from a tare average, a reference average and the
    /// reference's known weight. Nothing changes when the inputs are rejected.
    pub fn set_calibration_data(
        &mut self,
        tare_raw: RawSample,
        weight_raw: RawSample,
        actual_weight: f64,
    ) -> Result<(), ScaleError> {
        let scale = compute_scale(tare_raw, weight_raw, actual_weight)?;
        self.tare_raw = tare_raw;
        self.scale = scale;
        Ok(())
    }

    /// Replace the tare, keeping the scale.
    pub fn set_tare(&mut self, tare_raw: RawSample) {
        self.tare_raw = tare_raw;
    }
}

pub fn compute_scale(
    tare_raw_avg: RawSample,
    reference_raw_avg: RawSample,
    reference_weight: f64,
) -> Result<f64, ScaleError> {
    if !reference_weight.is_finite() || reference_weight <= 0.0 {
        return Err(ScaleError::InvalidReferenceWeight(reference_weight));
    }
    if reference_raw_avg == tare_raw_avg {
        return Err(ScaleError::DegenerateCalibration {
            raw: tare_raw_avg,
        });
    }
    Ok(reference_weight / (f64::from(reference_raw_avg) - f64::from(tare_raw_avg)))
}

/// Persistence collaborator, called after every calibration mutation.
pub trait CalibrationStore {
    fn persist(&mut self, state: &CalibrationState) -> Result<(), BoxError>;
}

impl<S: CalibrationStore + ?Sized> CalibrationStore for Box<S> {
    fn persist(&mut self, state: &CalibrationState) -> Result<(), BoxError> {
        (**self).persist(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_round_trip() {
        let scale = compute_scale(1000, 5000, 10.0).unwrap();
        assert!((scale - 0.0025).abs() < 1e-12);

        let cal = CalibrationState::new(1000, scale);
        assert!((cal.weight_of(5000) - 10.0).abs() < 1e-9);
        assert_eq!(cal.weight_of(1000), 0.0);
    }

    #[test]
    fn equal_averages_are_rejected_without_mutation() {
        let mut cal = CalibrationState::new(7, 0.5);
        let err = cal.set_calibration_data(1234, 1234, 10.0).unwrap_err();
        assert_eq!(err, ScaleError::DegenerateCalibration { raw: 1234 });
        assert_eq!(cal, CalibrationState::new(7, 0.5));
    }

    #[test]
    fn bad_reference_weight_is_rejected() {
        assert!(matches!(
            compute_scale(0, 100, 0.0),
            Err(ScaleError::InvalidReferenceWeight(_))
        ));
        assert!(matches!(
            compute_scale(0, 100, f64::NAN),
            Err(ScaleError::InvalidReferenceWeight(_))
        ));
    }

    #[test]
    fn negative_slope_is_allowed() {
        let scale = compute_scale(5000, 1000, 10.0).unwrap();
        assert!(scale < 0.0);
        let cal = CalibrationState::new(5000, scale);
        assert!((cal.weight_of(1000) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn set_tare_keeps_scale() {
        let mut cal = CalibrationState::new(-267_362, 0.000_225_27);
        cal.set_tare(-260_000);
        assert_eq!(cal.tare_raw, -260_000);
        assert_eq!(cal.scale, 0.000_225_27);
    }

    #[test]
    fn batch_weight_is_mean_of_sample_weights() {
        let cal = CalibrationState::new(1000, 0.0025);
        assert_eq!(cal.weight_of_batch(&[]), None);
        let w = cal.weight_of_batch(&[3000, 5000, 5000, 7000]).unwrap();
        assert!((w - 10.0).abs() < 1e-9);
    }
}
