/*!
 * Thread CPU Clock
 * Samples the user and system CPU time consumed by the calling OS thread
 */

use crate::core::errors::{Result, RuntimeError};
use crate::core::types::CpuTimes;

/// Sample CPU time of the calling OS thread
///
/// Vehicles call this at bootstrap and around every resumed quantum, so the
/// difference between two samples is the CPU time spent by whichever user
/// thread ran in between.
#[cfg(target_os = "linux")]
pub fn thread_cpu_time() -> Result<CpuTimes> {
    use nix::sys::resource::{getrusage, UsageWho};

    let usage = getrusage(UsageWho::RUSAGE_THREAD).map_err(|errno| {
        RuntimeError::Unimplemented(format!("per-thread CPU clock unavailable: {}", errno))
    })?;

    Ok(CpuTimes::new(
        timeval_to_duration(usage.user_time()),
        timeval_to_duration(usage.system_time()),
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn thread_cpu_time() -> Result<CpuTimes> {
    Err(RuntimeError::Unimplemented(
        "per-thread CPU accounting requires getrusage(RUSAGE_THREAD)".into(),
    ))
}

#[cfg(target_os = "linux")]
fn timeval_to_duration(tv: nix::sys::time::TimeVal) -> std::time::Duration {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u32::try_from(tv.tv_usec()).unwrap_or(0);
    std::time::Duration::new(secs, micros.saturating_mul(1_000))
}
