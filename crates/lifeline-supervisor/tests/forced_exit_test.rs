#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use lifeline_supervisor::Supervisor;

use common::{kill_externally, sleeper_config};

/// Set on the re-executed test binary; names the directory it reports into.
const HOST_DIR_ENV: &str = "LIFELINE_FORCED_EXIT_HOST_DIR";

/// Runs only inside the re-executed binary: a supervisor with the real
/// process-exit fallback and a callback that leaves the process running.
#[tokio::test]
async fn host_with_idle_callback() {
    let Some(dir) = std::env::var_os(HOST_DIR_ENV) else {
        return;
    };
    let dir = PathBuf::from(dir);
    let supervisor = Supervisor::new(&sleeper_config(&dir));
    supervisor.set_shutdown_callback(|| Ok(()));

    let pid = supervisor.start().await.expect("start");
    std::fs::write(dir.join("companion.pid"), pid.to_string()).expect("write pid");
    kill_externally(pid);

    tokio::time::sleep(Duration::from_secs(30)).await;
    std::fs::write(dir.join("survived"), "").expect("write marker");
}

fn wait_for_file(path: &Path, timeout: Duration) -> Option<Instant> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return Some(Instant::now());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    None
}

#[test]
fn idle_callback_cannot_keep_process_alive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exe = std::env::current_exe().expect("test binary path");
    let mut host = Command::new(exe)
        .args(["--exact", "host_with_idle_callback", "--test-threads=1"])
        .env(HOST_DIR_ENV, dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn host");

    let Some(lost_at) = wait_for_file(&dir.path().join("companion.pid"), Duration::from_secs(10)) else {
        let _ = host.kill();
        panic!("host never launched its companion");
    };

    // One poll interval plus the forced-exit delay, with slack.
    let deadline = lost_at + Duration::from_secs(3);
    let status = loop {
        if let Some(status) = host.try_wait().expect("try_wait") {
            break status;
        }
        if Instant::now() > deadline {
            let _ = host.kill();
            let _ = host.wait();
            panic!("host outlived the forced-exit delay");
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    assert_eq!(status.code(), Some(lifeline_supervisor::orchestrator::FORCED_EXIT_CODE));
    assert!(!dir.path().join("survived").exists());
}
