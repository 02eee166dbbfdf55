//! Harness driver: spawns the test binary, wires its stdout (and
//! optionally stderr) to a single pipe, drives the parser over it, and
//! reaps the child via `SIGCHLD` with a grace period before `SIGKILL`.

use std::os::unix::io::{IntoRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::SIGCHLD;
use signal_hook::iterator::Signals;

use crate::lexical::chomp;
use crate::logsink::LogSink;
use crate::reader::{LineOutcome, LineReader};
use crate::session::Session;

/// Grace period between EOF-on-the-pipe and `SIGKILL`, long enough for a
/// cooperative child to have already exited, short enough not to stall a
/// batch run on one that ignores its pipe closing.
const GRACE_PERIOD: Duration = Duration::from_micros(10);

/// Final disposition of one harness run, derived from the child's exit
/// status and the parser's `failed` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessVerdict {
    Success,
    Failed,
    /// Nonzero exit code, or `-signum` for signal termination.
    Aborted(i32),
}

/// The only state touched by the `SIGCHLD` reaper thread and read by the
/// driving thread, behind an atomic cell so neither side needs a lock.
struct ChildState {
    exited: AtomicBool,
    status: AtomicI32,
}

impl ChildState {
    fn new() -> Self {
        Self {
            exited: AtomicBool::new(false),
            status: AtomicI32::new(0),
        }
    }
}

/// Spawn-time options for one test invocation.
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    pub capture_stderr: bool,
    pub envs: Vec<(String, String)>,
}

pub struct HarnessOutcome {
    pub verdict: HarnessVerdict,
}

/// Runs `path` to completion, feeding its output line by line into
/// `session`, optionally tee-ing raw lines to `log`.
pub fn run_test(
    path: &Path,
    options: &HarnessOptions,
    session: &mut Session,
    mut log: Option<&mut LogSink>,
) -> Result<HarnessOutcome> {
    let mut command = Command::new(path);
    command.stdout(Stdio::piped());
    for (key, value) in &options.envs {
        command.env(key, value);
    }

    if options.capture_stderr {
        command.stderr(Stdio::piped());
        // Merge stderr into the same pipe stdout already points at, so the
        // reader observes both streams as one ordered byte stream.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::dup2(1, 2)?;
                Ok(())
            });
        }
    } else {
        command.stderr(Stdio::null());
    }

    let mut child = command.spawn().with_context(|| {
        format!("spawning test binary {}", path.display())
    })?;
    let pid = Pid::from_raw(child.id() as i32);

    let stdout = child.stdout.take().expect("stdout was piped");
    let fd: RawFd = stdout.into_raw_fd();
    let mut reader = LineReader::new(fd).context("setting up harness line reader")?;

    let state = Arc::new(ChildState::new());
    let reaper_state = Arc::clone(&state);
    let mut signals = Signals::new([SIGCHLD]).context("registering SIGCHLD handler")?;
    let signals_handle = signals.handle();
    let reaper_handle = thread::spawn(move || {
        for _ in signals.forever() {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    reaper_state.status.store(code, Ordering::SeqCst);
                    reaper_state.exited.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    reaper_state
                        .status
                        .store(-(sig as i32), Ordering::SeqCst);
                    reaper_state.exited.store(true, Ordering::SeqCst);
                    break;
                }
                _ => continue,
            }
        }
    });

    loop {
        match reader.read_line()? {
            LineOutcome::Line(raw) => {
                if let Some(sink) = log.as_deref_mut() {
                    sink.write_raw(&raw)?;
                }
                let trimmed = chomp(&raw);
                for event in session.classify(trimmed) {
                    tracing::trace!(?event, "classified line");
                }
                if session.bailed {
                    break;
                }
            }
            LineOutcome::EndOfInput => break,
        }
    }

    if !state.exited.load(Ordering::SeqCst) {
        thread::sleep(GRACE_PERIOD);
    }
    if !state.exited.load(Ordering::SeqCst) {
        let _ = kill(pid, Signal::SIGKILL);
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                state.status.store(code, Ordering::SeqCst);
                state.exited.store(true, Ordering::SeqCst);
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                state.status.store(-(sig as i32), Ordering::SeqCst);
                state.exited.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
    }
    // Unblock the reaper thread even if it never sees another SIGCHLD (e.g.
    // this thread won the race to reap the child itself).
    signals_handle.close();
    let _ = reaper_handle.join();

    let status = state.status.load(Ordering::SeqCst);
    let verdict = if status == 0 {
        if session.failed == 0 {
            HarnessVerdict::Success
        } else {
            HarnessVerdict::Failed
        }
    } else {
        HarnessVerdict::Aborted(status)
    };

    Ok(HarnessOutcome { verdict })
}
