//! Bounded execution of the project's test command.

use crate::error::{GateError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cap on captured stdout/stderr. The head is kept; the rest is drained
/// and discarded so the child never blocks on a full pipe.
pub const MAX_CAPTURE: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub success: bool,
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Stdout or stderr went past [`MAX_CAPTURE`] and was cut.
    pub truncated: bool,
    pub duration: Duration,
}

/// Output of one stream, read up to a byte limit.
#[derive(Debug, Default, PartialEq, Eq)]
struct Captured {
    text: String,
    truncated: bool,
}

/// Run `command` through `sh -c` in `cwd`, killing it after `timeout`.
///
/// Stdout and stderr are drained on dedicated threads so a chatty test
/// suite cannot fill a pipe and stall; the wait happens on a third thread
/// so the timeout needs no polling.
pub fn run_command(command: &str, cwd: &Path, timeout: Duration) -> Result<RunOutput> {
    if command.trim().is_empty() {
        return Err(GateError::NoTestCommand);
    }

    debug!(command, cwd = %cwd.display(), timeout_secs = timeout.as_secs(), "running tests");
    let start = Instant::now();

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group so a timeout also reaches runner subprocesses.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| GateError::RunnerSpawn(e.to_string()))?;

    let child_pid = child.id();
    let stdout_thread = spawn_reader(child.stdout.take());
    let stderr_thread = spawn_reader(child.stderr.take());

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    let (status, timed_out): (Option<ExitStatus>, bool) = match rx.recv_timeout(timeout) {
        Ok(Ok(status)) => (Some(status), false),
        Ok(Err(e)) => return Err(GateError::Io(e)),
        Err(_) => {
            warn!(command, timeout_secs = timeout.as_secs(), "test command timed out");
            kill_process(child_pid);
            (None, true)
        }
    };

    // A killed run may leave descendants holding the pipes; its partial
    // output is not worth waiting for.
    let (stdout, stderr) = if timed_out {
        (Captured::default(), Captured::default())
    } else {
        (join_reader(stdout_thread)?, join_reader(stderr_thread)?)
    };

    Ok(RunOutput {
        success: status.is_some_and(|s| s.success()),
        exit_code: status.and_then(|s| s.code()),
        truncated: stdout.truncated || stderr.truncated,
        stdout: stdout.text,
        stderr: stderr.text,
        timed_out,
        duration: if timed_out { timeout } else { start.elapsed() },
    })
}

type ReaderHandle = std::thread::JoinHandle<std::io::Result<Captured>>;

fn spawn_reader<R: Read + Send + 'static>(handle: Option<R>) -> ReaderHandle {
    std::thread::spawn(move || match handle {
        Some(r) => read_capped(r, MAX_CAPTURE),
        None => Ok(Captured::default()),
    })
}

fn join_reader(handle: ReaderHandle) -> Result<Captured> {
    match handle.join() {
        Ok(Ok(captured)) => Ok(captured),
        Ok(Err(e)) => Err(GateError::RunnerOutput(e.to_string())),
        Err(_) => Err(GateError::RunnerOutput("reader thread panicked".to_string())),
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes from the start.
fn read_capped<R: Read>(mut reader: R, limit: usize) -> std::io::Result<Captured> {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut truncated = false;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let room = limit.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
    if truncated {
        warn!(limit, "test output truncated");
    }
    Ok(Captured {
        text: String::from_utf8_lossy(&buf).into_owned(),
        truncated,
    })
}

/// SIGKILL the process group led by `pid`. Best-effort; errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit() {
        let out = run_command("echo 'test a ... ok'", Path::new("/tmp"), Duration::from_secs(10))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.trim(), "test a ... ok");
        assert!(!out.timed_out);
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let out = run_command("echo oops >&2; exit 3", Path::new("/tmp"), Duration::from_secs(10))
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn timeout_kills_command() {
        let start = Instant::now();
        let out = run_command("exec sleep 60", Path::new("/tmp"), Duration::from_millis(150))
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success);
        assert_eq!(out.exit_code, None);
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn runs_in_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let out = run_command("cat marker", dir.path(), Duration::from_secs(10)).unwrap();
        assert_eq!(out.stdout, "here");
    }

    #[test]
    fn read_capped_keeps_the_head() {
        let mut data = b"{\"numTotalTests\":1}".to_vec();
        data.extend(std::iter::repeat(b' ').take(200_000));
        let out = read_capped(&data[..], 1000).unwrap();
        assert!(out.truncated);
        assert_eq!(out.text.len(), 1000);
        assert!(out.text.starts_with("{\"numTotalTests\":1}"));

        let out = read_capped(&b"small"[..], 1000).unwrap();
        assert!(!out.truncated);
        assert_eq!(out.text, "small");
    }

    #[test]
    fn read_capped_surfaces_read_errors() {
        struct Broken(bool);
        impl Read for Broken {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if std::mem::replace(&mut self.0, true) {
                    Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
                } else {
                    buf[..4].copy_from_slice(b"test");
                    Ok(4)
                }
            }
        }
        let err = read_capped(Broken(false), 1000).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn large_output_is_drained_without_blocking() {
        let out = run_command(
            "head -c 20000000 /dev/zero | tr '\\0' x; echo",
            Path::new("/tmp"),
            Duration::from_secs(60),
        )
        .unwrap();
        assert!(out.success);
        assert!(out.truncated);
        assert_eq!(out.stdout.len(), MAX_CAPTURE);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            run_command("  ", Path::new("/tmp"), Duration::from_secs(1)),
            Err(GateError::NoTestCommand)
        ));
    }
}
