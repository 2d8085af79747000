use std::time::{Duration, Instant};

use loadcell_traits::Clock;

use crate::error::Result;

/// Poll `ready` until it reports true or `timeout` elapses on `clock`.
/// Sleeps `poll_interval` between probes. Returns `Ok(false)` on timeout;
/// probe errors abort the wait.
pub fn wait_until<C: Clock>(
    clock: &C,
    timeout: Duration,
    poll_interval: Duration,
    mut ready: impl FnMut() -> Result<bool>,
) -> Result<bool> {
    let begin = clock.now();
    loop {
        if ready()? {
            return Ok(true);
        }
        if elapsed(clock, begin) > timeout {
            return Ok(false);
        }
        clock.sleep(poll_interval);
    }
}

/// Probe `ready` at most `max_retries + 1` times, sleeping `poll_interval`
/// between probes. Returns `Ok(false)` once the retry budget is spent.
pub fn retry_until<C: Clock>(
    clock: &C,
    max_retries: u32,
    poll_interval: Duration,
    mut ready: impl FnMut() -> Result<bool>,
) -> Result<bool> {
    for attempt in 0..=max_retries {
        if ready()? {
            return Ok(true);
        }
        if attempt < max_retries {
            clock.sleep(poll_interval);
        }
    }
    Ok(false)
}

/// Busy-wait for `d`. Used for sub-10µs clock pulses where a sleep would
/// overshoot by orders of magnitude.
#[inline]
pub fn spin_delay(d: Duration) {
    if d.is_zero() {
        return;
    }
    let deadline = Instant::now() + d;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[inline]
fn elapsed<C: Clock>(clock: &C, begin: Instant) -> Duration {
    clock.now().saturating_duration_since(begin)
}
