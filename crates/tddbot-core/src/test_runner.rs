use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(300);

/// How long pipes are still read once the command's process group is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of one test-command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    pub output: String,
}

impl TestOutcome {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
        }
    }
}

pub trait TestRunner {
    fn run(&self, command: &str, cwd: &Path) -> TestOutcome;
}

/// Runs the configured test command through `sh -c` in the repository root.
#[derive(Debug, Clone)]
pub struct ShellTestRunner {
    timeout: Duration,
}

impl Default for ShellTestRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_TIMEOUT)
    }
}

impl ShellTestRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TestRunner for ShellTestRunner {
    fn run(&self, command: &str, cwd: &Path) -> TestOutcome {
        info!(command, "running tests");
        let outcome = execute_with_timeout(command, cwd, self.timeout);
        info!(passed = outcome.passed, "tests finished");
        outcome
    }
}

/// Spawn `sh -c command` as the leader of its own process group. When it
/// exits or times out the whole group is killed, so background jobs can
/// neither outlive the run nor hold its pipes open.
fn execute_with_timeout(command: &str, cwd: &Path, timeout: Duration) -> TestOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to run tests");
            return TestOutcome::failed(format!("Failed to run tests: {e}"));
        }
    };

    let stdout = spawn_drain(child.stdout.take());
    let stderr = spawn_drain(child.stderr.take());

    let waited = child.wait_timeout(timeout);
    kill_group(&child);

    let status = match waited {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            error!(timeout_secs = timeout.as_secs(), "test execution timed out");
            return TestOutcome::failed(timeout_message(timeout));
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            error!(error = %e, "failed while waiting for tests");
            return TestOutcome::failed(format!("Failed to run tests: {e}"));
        }
    };

    let until = Instant::now() + DRAIN_GRACE;
    let stdout = collect(&stdout, until);
    let stderr = collect(&stderr, until);

    TestOutcome {
        passed: status.success(),
        output: format!("STDOUT:\n{stdout}\n\nSTDERR:\n{stderr}"),
    }
}

/// Forward everything read from `pipe` in chunks. The channel disconnects
/// at EOF.
fn spawn_drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        std::thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
    rx
}

/// Gather chunks until EOF or `until`, whichever comes first.
fn collect(rx: &Receiver<Vec<u8>>, until: Instant) -> String {
    let mut bytes = Vec::new();
    loop {
        let left = until.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("test output pipe still open after the command exited; output may be cut short");
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    if pgid <= 0 {
        return;
    }
    // SAFETY: kill(2) only takes integers. A negative pid targets the group
    // created by `process_group(0)`, whose id is the child's pid.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn timeout_message(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("Test execution timed out after {} minutes", secs / 60)
    } else {
        format!("Test execution timed out after {secs} seconds")
    }
}
