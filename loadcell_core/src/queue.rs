//! Bounded FIFO of raw ADC codes shared between the producer thread and
//! the acquisition side.
//!
//! Every operation takes a short-held mutex, so a push (append plus eviction)
//! is atomic from the reader's point of view and snapshots never observe a
//! half-applied push. A running push counter lets readers wait for samples
//! taken *after* a given point.
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use loadcell_traits::RawSample;

#[derive(Debug)]
struct Ring {
    buf: VecDeque<RawSample>,
    total_pushed: u64,
}

#[derive(Debug)]
pub struct SampleQueue {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl SampleQueue {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            ring: Mutex::new(Ring {
                buf: VecDeque::with_capacity(capacity),
                total_pushed: 0,
            }),
            capacity,
        }
    }

    // A panicking producer must not take the reader down with it; the ring
    // is always left consistent between statements.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one sample, evicting the oldest when full. Never blocks on
    /// anything but the (short) internal lock.
    pub fn push(&self, sample: RawSample) {
        let mut ring = self.lock();
        if ring.buf.len() == self.capacity {
            ring.buf.pop_front();
        }
        ring.buf.push_back(sample);
        ring.total_pushed = ring.total_pushed.wrapping_add(1);
    }

    /// Up to `n` most recent samples, oldest first.
    pub fn snapshot_last(&self, n: usize) -> Vec<RawSample> {
        let ring = self.lock();
        let skip = ring.buf.len().saturating_sub(n);
        ring.buf.iter().skip(skip).copied().collect()
    }

    /// Push counter value; pass it to [`SampleQueue::fresh_since`] later.
    pub fn total_pushed(&self) -> u64 {
        self.lock().total_pushed
    }

    /// The last `n` samples, but only once at least `n` samples have been
    /// pushed since `mark`. Fewer than `n` are returned only when `n`
    /// exceeds the capacity.
    pub fn fresh_since(&self, mark: u64, n: usize) -> Option<Vec<RawSample>> {
        let ring = self.lock();
        let fresh = ring.total_pushed.wrapping_sub(mark);
        if fresh < n as u64 {
            return None;
        }
        let skip = ring.buf.len().saturating_sub(n);
        Some(ring.buf.iter().skip(skip).copied().collect())
    }

    pub fn latest(&self) -> Option<RawSample> {
        self.lock().buf.back().copied()
    }

    pub fn len(&self) -> usize {
        self.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop buffered samples. The push counter keeps counting.
    pub fn clear(&self) {
        self.lock().buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(cap: usize) -> SampleQueue {
        SampleQueue::new(NonZeroUsize::new(cap).unwrap())
    }

    #[test]
    fn empty_snapshot_is_empty() {
        let q = queue(4);
        assert!(q.snapshot_last(3).is_empty());
        assert!(q.snapshot_last(0).is_empty());
        assert_eq!(q.latest(), None);
    }

    #[test]
    fn eviction_keeps_last_capacity_samples() {
        let q = queue(3);
        for s in 1..=5 {
            q.push(s);
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.snapshot_last(10), vec![3, 4, 5]);
        assert_eq!(q.snapshot_last(2), vec![4, 5]);
        assert_eq!(q.total_pushed(), 5);
    }

    #[test]
    fn fresh_since_waits_for_new_pushes() {
        let q = queue(8);
        q.push(1);
        q.push(2);
        let mark = q.total_pushed();
        assert_eq!(q.fresh_since(mark, 2), None);
        q.push(3);
        assert_eq!(q.fresh_since(mark, 2), None);
        q.push(4);
        assert_eq!(q.fresh_since(mark, 2), Some(vec![3, 4]));
    }

    #[test]
    fn fresh_since_larger_than_capacity_returns_what_fits() {
        let q = queue(2);
        let mark = q.total_pushed();
        for s in 0..4 {
            q.push(s);
        }
        assert_eq!(q.fresh_since(mark, 4), Some(vec![2, 3]));
    }

    fn assert_consecutive(window: &[RawSample], cap: usize) {
        assert!(window.len() <= cap, "{} > capacity {cap}", window.len());
        assert!(
            window.windows(2).all(|w| w[1] == w[0] + 1),
            "torn or reordered window: {window:?}"
        );
    }

    #[test]
    fn concurrent_pushes_are_seen_whole_and_in_order() {
        use std::sync::atomic::{AtomicBool, Ordering};

        const PUSHES: RawSample = 200_000;
        let cap = 16;
        let q = queue(cap);
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                for v in 0..PUSHES {
                    q.push(v);
                }
                done.store(true, Ordering::Release);
            });

            let mut newest = -1;
            while !done.load(Ordering::Acquire) {
                let snap = q.snapshot_last(cap);
                assert_consecutive(&snap, cap);
                if let Some(&last) = snap.last() {
                    assert!(last >= newest, "snapshot went backwards: {last} < {newest}");
                    newest = last;
                }

                let mark = q.total_pushed();
                if let Some(fresh) = q.fresh_since(mark, 4) {
                    assert_eq!(fresh.len(), 4);
                    assert_consecutive(&fresh, cap);
                    // Everything returned was pushed after the mark.
                    let mark = RawSample::try_from(mark).unwrap();
                    assert!(fresh[0] >= mark, "{fresh:?} predates mark {mark}");
                }
            }
        });

        assert_eq!(q.total_pushed(), PUSHES as u64);
        assert_eq!(q.snapshot_last(cap), ((PUSHES - 16)..PUSHES).collect::<Vec<_>>());
    }

    #[test]
    fn clear_keeps_counter() {
        let q = queue(2);
        q.push(7);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.total_pushed(), 1);
        assert_eq!(q.capacity(), 2);
    }
}
