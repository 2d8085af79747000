//! Real-time scheduling for the acquisition process (Linux SCHED_FIFO and
//! mlockall). The bit-banged serial read must finish each clock pulse
//! within the converter's power-down window, so preemption mid-frame
//! corrupts or loses samples.

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
fn mem_lock(lock: RtLock) -> std::io::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    // SAFETY: mlockall only takes flags and touches no Rust-managed memory.
    let rc = unsafe { mlockall(flags) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn memlock_limit_hint() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit on success; read only then.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 above.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    Some(if cur == libc::RLIM_INFINITY {
        "memlock limit: unlimited".to_string()
    } else {
        format!("memlock limit: {} KiB", cur / 1024)
    })
}

#[cfg(target_os = "linux")]
fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    // SAFETY: plain queries without pointers.
    let (min, max) = unsafe { (sched_get_priority_min(SCHED_FIFO), sched_get_priority_max(SCHED_FIFO)) };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: prio,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling process.
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            eyre::bail!("{err}; hint: needs CAP_SYS_NICE or root");
        }
        return Err(eyre::eyre!(err));
    }
    Ok(prio)
}

/// Apply real-time settings once per process. Failures are logged and the
/// program keeps running with normal scheduling.
#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        match mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "rt memory lock applied"),
            Err(err) => {
                let hint = memlock_limit_hint().unwrap_or_default();
                tracing::warn!(?lock, error = %err, hint, "mlockall failed");
            }
        }
        match fifo_priority(prio) {
            Ok(p) => tracing::info!(priority = p, "SCHED_FIFO applied"),
            Err(err) => tracing::warn!(error = %err, "SCHED_FIFO not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, _lock: RtLock) {
    if rt {
        tracing::warn!("real-time mode is only supported on Linux; ignoring --rt");
    }
}
