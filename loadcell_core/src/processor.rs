//! Median-anchored outlier clamp applied to every batch before averaging.
//!
//! Samples farther than `|median / 10|` (integer division) from the median
//! are replaced by the median, so the batch size and therefore the
//! averaging denominator never change.
use loadcell_traits::RawSample;

/// Batches smaller than this produce no result.
pub const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// The ascending sort of the input with outliers replaced in place by
    /// `median`; a replaced slot may break the ordering.
    pub samples: Vec<RawSample>,
    pub median: RawSample,
    pub threshold: RawSample,
    /// How many samples were replaced.
    pub clamped: usize,
}

impl Filtered {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sum(&self) -> i64 {
        self.samples.iter().map(|&s| i64::from(s)).sum()
    }

    /// Integer mean, truncated toward zero.
    pub fn mean_raw(&self) -> RawSample {
        let n = i64::try_from(self.samples.len().max(1)).unwrap_or(i64::MAX);
        // The mean of i32 values always fits back into an i32.
        RawSample::try_from(self.sum() / n).unwrap_or_default()
    }
}

/// Median of an ascending slice: the middle element for odd lengths, the
/// truncated mean of the two middle elements for even lengths.
pub fn median_of_sorted(sorted: &[RawSample]) -> Option<RawSample> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        return Some(sorted[mid]);
    }
    let pair = i64::from(sorted[mid - 1]) + i64::from(sorted[mid]);
    RawSample::try_from(pair / 2).ok()
}

/// `median / 10`, truncated toward zero. Medians in `-9..=9` give a zero
/// threshold, which clamps every sample that differs from the median at all.
#[inline]
pub fn outlier_threshold(median: RawSample) -> RawSample {
    median / 10
}

pub fn process(raw: &[RawSample]) -> Option<Filtered> {
    if raw.len() < MIN_SAMPLES {
        return None;
    }
    let mut samples = raw.to_vec();
    samples.sort_unstable();

    let median = median_of_sorted(&samples)?;
    let threshold = outlier_threshold(median);
    let limit = i64::from(threshold).abs();

    let mut clamped = 0;
    for s in &mut samples {
        if (i64::from(*s) - i64::from(median)).abs() > limit {
            *s = median;
            clamped += 1;
        }
    }

    Some(Filtered {
        samples,
        median,
        threshold,
        clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], None)]
    #[case(&[5], Some(5))]
    #[case(&[1, 2, 9], Some(2))]
    #[case(&[1, 2, 4, 9], Some(3))]
    #[case(&[-3, -2], Some(-2))]
    #[case(&[i32::MAX, i32::MAX], Some(i32::MAX))]
    fn median_cases(#[case] sorted: &[RawSample], #[case] expected: Option<RawSample>) {
        assert_eq!(median_of_sorted(sorted), expected);
    }

    #[test]
    fn fewer_than_two_samples_is_no_result() {
        assert_eq!(process(&[]), None);
        assert_eq!(process(&[42]), None);
    }

    #[test]
    fn clamps_single_spike() {
        let f = process(&[10, 12, 11, 100]).unwrap();
        assert_eq!(f.median, 11);
        assert_eq!(f.threshold, 1);
        assert_eq!(f.samples, vec![10, 11, 12, 11]);
        assert_eq!(f.clamped, 1);
        assert_eq!(f.mean_raw(), 11);
    }

    #[test]
    fn small_median_rejects_every_deviation() {
        // median 9 -> threshold 0
        let f = process(&[8, 9, 9, 10, 9]).unwrap();
        assert_eq!(f.threshold, 0);
        assert_eq!(f.samples, vec![9; 5]);
        assert_eq!(f.clamped, 2);
    }

    #[test]
    fn negative_median_uses_absolute_threshold() {
        let f = process(&[-1000, -1050, -1100, -2000, -1020]).unwrap();
        assert_eq!(f.median, -1050);
        assert_eq!(f.threshold, -105);
        assert_eq!(f.samples, vec![-1050, -1100, -1050, -1020, -1000]);
        assert_eq!(f.clamped, 1);
    }

    #[test]
    fn mean_truncates_toward_zero() {
        let f = process(&[-3, -4]).unwrap();
        // median -3 (truncated from -3.5), threshold 0: both become -3
        assert_eq!(f.samples, vec![-3, -3]);
        assert_eq!(f.mean_raw(), -3);

        let f = Filtered {
            samples: vec![-3, -4],
            median: -3,
            threshold: 0,
            clamped: 0,
        };
        assert_eq!(f.sum(), -7);
        assert_eq!(f.mean_raw(), -3);
    }
}
