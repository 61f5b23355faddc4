//! OS process-table probing.
//!
//! `pid_alive` answers "does this pid still exist?" via `kill(pid, 0)`,
//! which checks existence without delivering a signal. A zombie still
//! counts as existing; callers holding a child handle should reap it first.

use std::io;

/// Check whether `pid` is present in the OS process table.
///
/// `EPERM` means the process exists but belongs to someone else, so it is
/// reported as alive. Any errno other than `ESRCH` is returned as an error
/// for the caller to treat as transient.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> io::Result<bool> {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return Ok(false);
    };
    if raw <= 0 {
        return Ok(false);
    }
    // SAFETY: kill with signal 0 checks existence without sending a signal.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(false),
        Some(libc::EPERM) => Ok(true),
        _ => Err(err),
    }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> io::Result<bool> {
    // No portable probe; assume alive so nothing is torn down by mistake.
    Ok(true)
}

/// Ask `pid` to terminate (`SIGTERM`). Returns `Ok(false)` if it was already gone.
#[cfg(unix)]
pub fn request_terminate(pid: u32) -> io::Result<bool> {
    let raw = libc::pid_t::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: plain signal delivery to a pid we spawned.
    if unsafe { libc::kill(raw, libc::SIGTERM) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub fn request_terminate(_pid: u32) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "graceful termination is only supported on unix",
    ))
}

/// Terminate the calling process immediately, skipping destructors,
/// `atexit` handlers and stdio flushing.
pub fn exit_immediately(code: i32) -> ! {
    #[cfg(unix)]
    {
        // SAFETY: _exit never returns and touches no Rust state.
        unsafe { libc::_exit(code) }
    }
    #[cfg(not(unix))]
    {
        let _ = code;
        std::process::abort()
    }
}
