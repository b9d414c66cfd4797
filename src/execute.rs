use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::errors::MpibenchError;
use crate::types::RawRun;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Launches one benchmark process and reports how long it took.
pub trait Executor {
    fn execute(
        &mut self,
        command: &str,
        arguments: &[String],
        timeout: Option<Duration>,
    ) -> Result<RawRun, MpibenchError>;
}

/// Runs commands as real child processes.
///
/// On unix each child leads its own process group. Whatever it forks is
/// killed with it on timeout, and leftovers are killed once it exits, so no
/// benchmark process outlives its run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(
        &mut self,
        command: &str,
        arguments: &[String],
        timeout: Option<Duration>,
    ) -> Result<RawRun, MpibenchError> {
        let started = Instant::now();
        let deadline = timeout.map(|limit| started + limit);

        let mut cmd = Command::new(command);
        cmd.args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| MpibenchError::LaunchFailure {
            command: command.to_string(),
            source,
        })?;

        // Both pipes are drained on their own threads so a chatty child
        // cannot block on a full pipe while we wait for it.
        let (tx, rx) = mpsc::channel();
        drain(child.stdout.take(), Pipe::Stdout, &tx);
        drain(child.stderr.take(), Pipe::Stderr, &tx);
        drop(tx);

        let timed_out = |limit: Duration| MpibenchError::Timeout {
            command: command.to_string(),
            timeout: limit,
        };
        let wait_failed = |source: std::io::Error| MpibenchError::LaunchFailure {
            command: command.to_string(),
            source,
        };

        let status = match timeout {
            Some(limit) => match wait_until(&mut child, started + limit) {
                Ok(status) => status,
                Err(WaitError::TimedOut) => return Err(timed_out(limit)),
                Err(WaitError::Io(source)) => {
                    kill_group(&mut child);
                    return Err(wait_failed(source));
                }
            },
            None => child.wait().map_err(wait_failed)?,
        };

        // A grandchild may still hold the pipes open after the child exits;
        // the deadline covers that wait too.
        let output = collect(&rx, deadline);
        let overall_seconds = started.elapsed().as_secs_f64();
        kill_group(&mut child);

        let Some((stdout, stderr)) = output else {
            return Err(timed_out(timeout.unwrap_or_default()));
        };

        if !status.success() {
            return Err(MpibenchError::ProcessFailure {
                command: command.to_string(),
                status,
                stderr: tail(&stderr, 10),
            });
        }

        debug!(command, overall_seconds, "process finished");

        Ok(RawRun {
            overall_seconds,
            stdout,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

enum WaitError {
    TimedOut,
    Io(std::io::Error),
}

/// Wait for the child to exit, killing its process group at `deadline`.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<ExitStatus, WaitError> {
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            debug!(pid = child.id(), "timeout exceeded, killing process group");
            kill_group(child);
            // Reap so the pipes close and the reader threads finish.
            let _ = child.wait();
            return Err(WaitError::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill every process in the child's group, including ones that outlived it.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret == -1 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already empty
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(%err, "failed to kill process");
    }
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    which: Pipe,
    tx: &Sender<(Pipe, Vec<u8>)>,
) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let tx = tx.clone();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut buf) {
            debug!(?which, %err, "failed to read pipe");
        }
        let _ = tx.send((which, buf));
    });
}

/// Gather stdout and stderr as text, or `None` if `deadline` passed first.
/// Readers still blocked at that point are left detached.
fn collect(rx: &Receiver<(Pipe, Vec<u8>)>, deadline: Option<Instant>) -> Option<(String, String)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    loop {
        let received = match deadline {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => return None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };
        match received {
            (Pipe::Stdout, buf) => stdout = buf,
            (Pipe::Stderr, buf) => stderr = buf,
        }
    }

    Some((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

/// Last `max_lines` lines of `text`.
fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].join("\n")
}
