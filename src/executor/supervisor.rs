//! Runs one external command under a deadline.
//!
//! The child is started in a process group of its own. A spawned worker task
//! drains its output while the caller waits for the child with a deadline.
//! When the deadline passes first, the whole group is killed so helpers the
//! command started do not outlive the test.
use super::transcript::Transcript;
use crate::errors::{Error, Result, RichResult};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
    time,
};
use tracing::{debug, trace};

/// How long to wait for pipes to close after the process group was killed.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Longest deadline honoured; anything beyond is as good as none.
const MAX_TIMEOUT: Duration = Duration::from_secs(86400 * 365 * 30);

/// Where the output of a process goes.
#[derive(Debug)]
pub enum Capture {
    /// Capture stdout and stderr separately.
    Split,
    /// Capture stdout and stderr through one pipe, in the order written.
    Interleaved,
    /// Write both streams into a file.
    File(File),
}

/// Output collected from a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Split { stdout: String, stderr: String },
    Interleaved(String),
    /// Output went to a file.
    Redirected,
}

impl Captured {
    /// Print the output into a transcript, stdout before stderr.
    pub fn surface(&self, log: &mut Transcript) {
        match self {
            Captured::Split { stdout, stderr } => {
                log.block(stdout);
                log.block(stderr);
            }
            Captured::Interleaved(out) => log.block(out),
            Captured::Redirected => {}
        }
    }
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    Signal(i32),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub exit: Exit,
    pub output: Captured,
}

impl Outcome {
    pub fn timed_out(&self) -> bool {
        self.exit == Exit::TimedOut
    }
}

type Stream = Box<dyn AsyncRead + Send + Unpin>;

/// Bytes drained from stdout and stderr.
type Drained = (Vec<u8>, Vec<u8>);

async fn drain(stream: Option<Stream>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Resolve the program to execute. Relative paths with a directory
/// component are taken relative to `dir`.
fn program_path(program: &str, dir: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

fn merged_pipe() -> io::Result<(File, Stdio, Stdio)> {
    use std::os::unix::io::{FromRawFd, OwnedFd};

    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` has room for the two descriptors `pipe` writes.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: both descriptors were just created and are owned by nobody else.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    for fd in &fds {
        // SAFETY: `fd` is open; only the close-on-exec flag is changed.
        if unsafe { libc::fcntl(*fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    let write2 = write.try_clone()?;
    Ok((File::from(read), Stdio::from(write), Stdio::from(write2)))
}

/// Kill every process in the child's group.
fn kill_group(pid: Option<u32>, child: &mut Child) {
    match pid {
        // The child leads its own group, so its pid is the group id.
        // SAFETY: killpg has no memory-safety preconditions.
        Some(pid) => {
            if unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) } != 0 {
                debug!(pid, err = %io::Error::last_os_error(), "killpg failed");
            }
        }
        None => {
            let _ = child.start_kill();
        }
    }
}

fn exit_of(status: ExitStatus) -> Exit {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => Exit::Code(code),
        (None, Some(sig)) => Exit::Signal(sig),
        (None, None) => Exit::Code(-1),
    }
}

/// Run `argv` in `dir` and wait at most `timeout` for it.
///
/// Emits `TIMED OUT` into `log` when the deadline passes before the process
/// exits. Fails only when the process cannot be started.
pub async fn run_with_timeout(
    argv: &[String],
    dir: &Path,
    capture: Capture,
    timeout: Duration,
    log: &mut Transcript,
) -> Result<Outcome> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        Error::MalformedInstruction("no command to run".to_string())
    })?;
    let launch = |source: io::Error| Error::Launch {
        program: program.clone(),
        source,
    };

    let mut cmd = Command::new(program_path(program, dir));
    cmd.args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .process_group(0)
        .kill_on_drop(true);

    let (merged, redirected) = match capture {
        Capture::Split => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            (None, false)
        }
        Capture::Interleaved => {
            let (read, out, err) = merged_pipe().map_err(launch)?;
            cmd.stdout(out).stderr(err);
            (Some(read), false)
        }
        Capture::File(file) => {
            cmd.stdout(file.try_clone().map_err(launch)?).stderr(file);
            (None, true)
        }
    };
    let interleaved = merged.is_some();

    let mut child = cmd.spawn().map_err(launch)?;
    // The command holds our copies of the write ends; they must be closed
    // for the readers to see end of file.
    drop(cmd);
    let pid = child.id();
    debug!(?pid, ?argv, dir = %dir.display(), "spawned");

    let (stdout, stderr): (Option<Stream>, Option<Stream>) = match merged {
        Some(read) => (Some(Box::new(tokio::fs::File::from_std(read))), None),
        None => (
            child.stdout.take().map(|s| Box::new(s) as Stream),
            child.stderr.take().map(|s| Box::new(s) as Stream),
        ),
    };

    let mut worker: JoinHandle<io::Result<Drained>> = tokio::spawn(async move {
        let (out, err) = tokio::join!(drain(stdout), drain(stderr));
        Ok((out?, err?))
    });

    let deadline = time::Instant::now() + timeout.min(MAX_TIMEOUT);
    let (status, timed_out) = match time::timeout_at(deadline, child.wait()).await {
        Ok(status) => (status?, false),
        // Decide under a single reap attempt: a child that exited right at
        // the deadline keeps its own exit status.
        Err(_) => match child.try_wait()? {
            Some(status) => (status, false),
            None => {
                debug!(?pid, ?timeout, "deadline passed, killing process group");
                kill_group(pid, &mut child);
                (child.wait().await?, true)
            }
        },
    };
    trace!(?pid, ?status, timed_out, "reaped");
    if timed_out {
        log.line("TIMED OUT");
    }

    let drained = match time::timeout_at(deadline, &mut worker).await {
        Ok(joined) => Some(joined),
        Err(_) => {
            // Whatever still holds the pipes belongs to the group.
            kill_group(pid, &mut child);
            match time::timeout(KILL_GRACE, &mut worker).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    worker.abort();
                    None
                }
            }
        }
    };
    let (out, err) = match drained {
        Some(joined) => joined
            .map_err(|err| Error::Internal(err.to_string()))
            .map(|res| res.map_err(Error::from))
            .collapse()?,
        None => (Vec::new(), Vec::new()),
    };

    let exit = if timed_out {
        Exit::TimedOut
    } else {
        exit_of(status)
    };
    let output = if redirected {
        Captured::Redirected
    } else if interleaved {
        Captured::Interleaved(String::from_utf8_lossy(&out).into_owned())
    } else {
        Captured::Split {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        }
    };
    Ok(Outcome { exit, output })
}
