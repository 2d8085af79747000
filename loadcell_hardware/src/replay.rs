//! Playback of captured raw codes through the `FrontEnd` seam, for offline
//! analysis of a recorded dump on a machine without the ADC attached.
use std::ops::RangeInclusive;
use std::time::Duration;

use loadcell_traits::{BoxError, FrontEnd, RawSample};

use crate::error::HwError;
use crate::hx711::RAW_MIN;

/// Capture rate assumed when none is given (HX711 at 80 SPS is 12.5 ms).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// Codes a capture may hold. The register variant stores fields as read
/// (`RAW_MIN..=RAW_MAX`); the serial variant stores them negated, so a
/// saturated `0x800000` lands on `-RAW_MIN`.
pub const CAPTURE_RANGE: RangeInclusive<RawSample> = RAW_MIN..=-RAW_MIN;

#[derive(Debug, Clone)]
pub struct Replay {
    codes: Vec<RawSample>,
    next: usize,
    period: Duration,
    looping: bool,
}

impl Replay {
    pub fn new(codes: Vec<RawSample>) -> Self {
        Self {
            codes,
            next: 0,
            period: DEFAULT_PERIOD,
            looping: false,
        }
    }

    /// Spacing between samples when driven by edge waits.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start over after the last code instead of going quiet.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn remaining(&self) -> usize {
        self.codes.len().saturating_sub(self.next)
    }

    fn next_code(&mut self) -> Option<RawSample> {
        if self.next >= self.codes.len() && self.looping {
            self.next = 0;
        }
        let code = self.codes.get(self.next).copied()?;
        self.next += 1;
        Some(code)
    }
}

impl FrontEnd for Replay {
    fn name(&self) -> &'static str {
        "replay"
    }

    /// Rejects empty captures and codes neither decoder could have produced.
    fn setup(&mut self) -> Result<(), BoxError> {
        if self.codes.is_empty() {
            return Err(Box::new(HwError::Bus("replay capture holds no samples".into())));
        }
        if let Some((i, c)) = self
            .codes
            .iter()
            .enumerate()
            .find(|(_, c)| !CAPTURE_RANGE.contains(*c))
        {
            return Err(Box::new(HwError::Bus(format!(
                "replay code {c} at index {i} is outside the 24-bit range"
            ))));
        }
        Ok(())
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<RawSample>, BoxError> {
        // Paced callers pass a zero timeout and do their own sleeping.
        if !timeout.is_zero() {
            std::thread::sleep(self.period.min(timeout));
        }
        Ok(self.next_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_once_then_goes_quiet() {
        let mut r = Replay::new(vec![1, 2]);
        assert_eq!(r.service(Duration::ZERO).unwrap(), Some(1));
        assert_eq!(r.service(Duration::ZERO).unwrap(), Some(2));
        assert_eq!(r.service(Duration::ZERO).unwrap(), None);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn looping_wraps_around() {
        let mut r = Replay::new(vec![7, 8]).looping(true);
        let got: Vec<_> = (0..5).map(|_| r.service(Duration::ZERO).unwrap()).collect();
        assert_eq!(got, vec![Some(7), Some(8), Some(7), Some(8), Some(7)]);
    }

    #[test]
    fn setup_rejects_empty_and_out_of_range_captures() {
        assert!(Replay::new(vec![]).setup().is_err());

        let err = Replay::new(vec![0, -RAW_MIN + 1]).setup().unwrap_err();
        assert!(err.to_string().contains("index 1"), "{err}");
        assert!(Replay::new(vec![RAW_MIN - 1]).setup().is_err());

        assert!(Replay::new(vec![RAW_MIN, -RAW_MIN]).setup().is_ok());
    }
}
