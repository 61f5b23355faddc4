#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lifeline_core::config::{CompanionConfig, Config, TimingConfig};
use lifeline_supervisor::{ExitHook, Supervisor};

/// Shell companion that ignores SIGTERM and only dies to SIGKILL.
pub const STUBBORN: &[&str] = &["-c", "trap '' TERM; exec sleep 30"];

pub fn config(state_dir: &Path, program: &str, args: &[&str]) -> Config {
    let mut cfg = Config::default();
    cfg.companion = CompanionConfig {
        base_dir: None,
        program: program.into(),
        args: args.iter().map(|a| a.to_string()).collect(),
    };
    cfg.timing = TimingConfig {
        poll_interval_ms: 100,
        launch_grace_ms: 100,
        graceful_timeout_ms: 1_000,
        forceful_timeout_ms: 1_000,
        force_exit_delay_ms: 300,
    };
    cfg.state.dir = Some(state_dir.to_path_buf());
    cfg
}

pub fn sleeper_config(state_dir: &Path) -> Config {
    config(state_dir, "/bin/sleep", &["30"])
}

/// Records forced-exit requests instead of exiting the test process.
#[derive(Clone, Default)]
pub struct ExitRecorder {
    calls: Arc<Mutex<Vec<(i32, Instant)>>>,
}

impl ExitRecorder {
    pub fn hook(&self) -> ExitHook {
        let calls = self.calls.clone();
        Arc::new(move |code: i32| calls.lock().unwrap().push((code, Instant::now())))
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn first(&self) -> Option<(i32, Instant)> {
        self.calls.lock().unwrap().first().copied()
    }
}

/// Counts shutdown callback invocations.
#[derive(Clone, Default)]
pub struct CallbackCounter {
    calls: Arc<AtomicUsize>,
}

impl CallbackCounter {
    pub fn install(&self, supervisor: &Supervisor) {
        let calls = self.calls.clone();
        supervisor.set_shutdown_callback(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn supervisor(cfg: &Config) -> (Supervisor, ExitRecorder) {
    let recorder = ExitRecorder::default();
    (Supervisor::with_exit_hook(cfg, recorder.hook()), recorder)
}

pub fn kill_externally(pid: u32) {
    // SAFETY: signalling a child this test spawned.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    assert_eq!(rc, 0, "failed to kill pid {pid}");
}

pub fn os_pid_exists(pid: u32) -> bool {
    lifeline_core::process::pid_alive(pid).unwrap_or(true)
}

/// Poll `cond` every 20ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
