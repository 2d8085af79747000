//! Producer thread.
//!
//! Owns the `FrontEnd` and pushes every decoded sample into the shared
//! [`SampleQueue`]. Two drive modes:
//! - paced: call `service` once per fixed interval (register front ends,
//!   which poll a ready bit);
//! - event: call `service` back to back and let it block on the device's
//!   data-ready edge (serial front ends).
//!
//! The thread is stopped and joined when the `Sampler` is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use loadcell_traits::{Clock, FrontEnd};

use crate::error::ScaleError;
use crate::hw_error::map_hw_error;
use crate::queue::SampleQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Paced { interval: Duration },
    Event { edge_timeout: Duration },
}

#[derive(Debug, Default)]
struct Counters {
    /// ms since epoch of the last pushed sample, 0 = none yet.
    last_ok: AtomicU64,
    errors: AtomicU64,
}

pub struct Sampler {
    counters: Arc<Counters>,
    epoch: Instant,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<F>(
        frontend: F,
        queue: Arc<SampleQueue>,
        drive: Drive,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self
    where
        F: FrontEnd + Send + 'static,
    {
        match drive {
            Drive::Paced { interval } => Self::spawn_paced(frontend, queue, interval, clock),
            Drive::Event { edge_timeout } => {
                Self::spawn_event(frontend, queue, edge_timeout, clock)
            }
        }
    }

    pub fn spawn_paced<F>(
        frontend: F,
        queue: Arc<SampleQueue>,
        interval: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self
    where
        F: FrontEnd + Send + 'static,
    {
        Self::start(frontend, queue, Duration::ZERO, Some(interval), clock)
    }

    pub fn spawn_event<F>(
        frontend: F,
        queue: Arc<SampleQueue>,
        edge_timeout: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self
    where
        F: FrontEnd + Send + 'static,
    {
        Self::start(frontend, queue, edge_timeout, None, clock)
    }

    fn start<F>(
        mut frontend: F,
        queue: Arc<SampleQueue>,
        timeout: Duration,
        period: Option<Duration>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self
    where
        F: FrontEnd + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let epoch = clock.now();

        let stop = shutdown.clone();
        let shared = counters.clone();
        let thread_clock = clock.clone();
        let join_handle = std::thread::spawn(move || {
            let name = frontend.name();
            tracing::debug!(frontend = name, paced = period.is_some(), "sampler thread started");
            while !stop.load(Ordering::Relaxed) {
                match frontend.service(timeout) {
                    Ok(Some(raw)) => {
                        queue.push(raw);
                        let now = thread_clock.ms_since(epoch).max(1);
                        shared.last_ok.store(now, Ordering::Relaxed);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let n = shared.errors.fetch_add(1, Ordering::Relaxed) + 1;
                        match map_hw_error(&*e) {
                            ScaleError::Timeout => {
                                tracing::debug!(frontend = name, errors = n, "producer timeout");
                            }
                            other if n == 1 || n % 100 == 0 => {
                                tracing::warn!(frontend = name, errors = n, error = %other, "producer cycle failed");
                            }
                            _ => {}
                        }
                    }
                }

                if let Some(period) = period {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    thread_clock.sleep(period);
                }
            }
            tracing::trace!(frontend = name, "sampler thread exiting");
        });

        Self {
            counters,
            epoch,
            clock,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Milliseconds since the last pushed sample, or since start when none
    /// has arrived yet.
    pub fn stalled_for_now(&self) -> u64 {
        let now = self.clock.ms_since(self.epoch);
        now.saturating_sub(self.counters.last_ok.load(Ordering::Relaxed))
    }

    pub fn has_produced(&self) -> bool {
        self.counters.last_ok.load(Ordering::Relaxed) != 0
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // An event-driven thread may be inside `service`; it returns within
        // one edge timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
