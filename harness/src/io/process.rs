//! Running child processes with a timeout and bounded output capture.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Timeout and capture bound for one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes of stdout and of stderr kept in memory; the rest is drained and counted.
    pub output_limit_bytes: usize,
}

impl ProcessLimits {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exited with status zero before the timeout.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }

    /// Short human-readable description of how the process ended.
    pub fn describe_exit(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        match self.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

type TeeFile = Arc<Option<Mutex<File>>>;

/// Run `cmd`, capturing stdout/stderr concurrently so neither pipe can fill up
/// and block the child.
///
/// When `tee_path` is set, every line of stdout and stderr is also appended to
/// that file as it arrives. Spawn failures are returned as errors. On unix the
/// child leads its own process group, and on timeout the whole group is killed
/// so grandchildren holding the pipes cannot outlive the deadline. Timeouts
/// are reported through `CommandOutput::timed_out`.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = limits.timeout.as_secs()))]
pub fn run_captured(
    mut cmd: Command,
    limits: ProcessLimits,
    tee_path: Option<&Path>,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let tee: TeeFile = Arc::new(match tee_path {
        Some(path) => Some(Mutex::new(open_tee(path)?)),
        None => None,
    });

    debug!(args = ?cmd.get_args().collect::<Vec<_>>(), "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(err = %err, "failed to spawn command");
            return Err(err).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_tee = Arc::clone(&tee);
    let stdout_handle = thread::spawn(move || read_lines_limited(stdout, limit, stdout_tee));
    let stderr_tee = Arc::clone(&tee);
    let stderr_handle = thread::spawn(move || read_lines_limited(stderr, limit, stderr_tee));

    let mut timed_out = false;
    let status = match child.wait_timeout(limits.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_group(&mut child).context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn open_tee(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log {}", path.display()))
}

/// SIGKILL the process group led by `child`.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg(2) only sends a signal. `pgid` names the group created by
    // `process_group(0)` at spawn, which still exists because the child has not
    // been reaped yet.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read `reader` to EOF line by line, keeping at most `limit` bytes and
/// tee-ing every line to the shared log file when present.
fn read_lines_limited<R: Read>(reader: R, limit: usize, tee: TeeFile) -> Result<(Vec<u8>, usize)> {
    let mut reader = BufReader::new(reader);
    let mut kept = Vec::new();
    let mut truncated = 0usize;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).context("read output")?;
        if n == 0 {
            break;
        }

        if let Some(mutex) = &*tee
            && let Ok(mut file) = mutex.lock()
            && let Err(err) = file.write_all(&line).and_then(|()| file.flush())
        {
            warn!(err = %err, "failed to write command log");
        }

        let remaining = limit.saturating_sub(kept.len());
        let keep = n.min(remaining);
        kept.extend_from_slice(&line[..keep]);
        truncated += n - keep;
    }

    Ok((kept, truncated))
}
