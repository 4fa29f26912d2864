//! Reference file handling for `ref` tests.
//!
//! Each `ref` test owns a reference file `<name>.ref` holding its expected
//! output. The selected [RefOp] decides whether that file is generated,
//! compared against, printed, or ignored.
use super::{
    results::{Status, ERROR_CODE, FAILURE_CODE, TIMEOUT_CODE},
    supervisor::{self, Capture, Exit, Outcome},
    transcript::Transcript,
};
use crate::{diff::TextDiff, errors::Error};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tempfile::NamedTempFile;
use tracing::debug;

/// Reference file operation applied to `ref` tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefOp {
    /// Compare output against the reference file.
    Cmp,
    /// Write output into the reference file.
    Gen,
    /// Ignore the reference file.
    None,
    /// Print the reference file without running anything.
    Dump,
}

impl FromStr for RefOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cmp" => Ok(RefOp::Cmp),
            "gen" => Ok(RefOp::Gen),
            "none" => Ok(RefOp::None),
            "dump" => Ok(RefOp::Dump),
            _ => Err("Must be one of cmp, gen, none, dump.".to_string()),
        }
    }
}

impl fmt::Display for RefOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RefOp::Cmp => "cmp",
            RefOp::Gen => "gen",
            RefOp::None => "none",
            RefOp::Dump => "dump",
        };
        write!(f, "{}", s)
    }
}

/// Path of the reference file for test `name` run from `dir`.
pub fn reference_path(name: &str, refdir: Option<&Path>, dir: &Path) -> PathBuf {
    let base = match refdir {
        Some(refdir) => dir.join(refdir),
        None => dir.to_path_buf(),
    };
    base.join(format!("{}.ref", name))
}

/// How a test will be classified, decided before anything runs.
#[derive(Debug)]
enum Plan {
    /// Run and classify by exit code.
    Plain,
    /// Run into a file beside the reference, moved over it once the process
    /// has run. Always passes once started.
    Generate(NamedTempFile),
    /// Print the stored reference.
    Dump(String),
    /// Run and fail: there is nothing to compare against.
    Unverifiable,
    /// Run and diff the output against these lines.
    Compare(Vec<String>),
    /// The plan could not be made.
    Broken(Error),
}

/// Read a reference file. Output is captured lossily, so the file is read
/// the same way.
fn read_reference(path: &Path) -> Result<String, Error> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(Error::MissingReference(path.to_path_buf()))
        }
        Err(err) => Err(Error::Io(err)),
    }
}

/// Scratch file in the reference's directory, so it can be renamed over it.
fn scratch_for(reference: &Path) -> io::Result<NamedTempFile> {
    let dir = reference
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    NamedTempFile::new_in(dir)
}

/// Permissions a regenerated reference keeps: those of the file it replaces,
/// or world-readable for a new one.
fn reference_mode(reference: &Path) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(reference)
        .map(|meta| meta.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(0o644))
}

fn plan(op: RefOp, reference: &Path) -> Plan {
    match op {
        RefOp::None => Plan::Plain,
        RefOp::Gen => match scratch_for(reference) {
            Ok(scratch) => Plan::Generate(scratch),
            Err(err) => Plan::Broken(Error::Io(err)),
        },
        RefOp::Dump => match read_reference(reference) {
            Ok(text) => Plan::Dump(text),
            Err(err) => Plan::Broken(err),
        },
        RefOp::Cmp => match read_reference(reference) {
            Ok(text) => Plan::Compare(text.lines().map(String::from).collect()),
            Err(Error::MissingReference(_)) => Plan::Unverifiable,
            Err(err) => Plan::Broken(err),
        },
    }
}

fn command_line(argv: &[String]) -> String {
    format!("Command: {}", argv.join(" "))
}

/// Classify a finished process by its exit status alone.
fn exit_status(outcome: &Outcome) -> Status {
    match outcome.exit {
        Exit::Code(code) => Status::from_code(code),
        Exit::Signal(sig) => Status::Fail(128 + sig),
        Exit::TimedOut => Status::Fail(TIMEOUT_CODE),
    }
}

fn launch_failure(err: Error, log: &mut Transcript) -> Status {
    log.line(err.to_string());
    Status::Fail(ERROR_CODE)
}

/// Run a test without looking at any reference file. Used for `cmd` tests.
pub async fn command(
    argv: &[String],
    dir: &Path,
    timeout: Duration,
    log: &mut Transcript,
) -> Status {
    match supervisor::run_with_timeout(argv, dir, Capture::Split, timeout, log).await {
        Ok(outcome) => {
            outcome.output.surface(log);
            exit_status(&outcome)
        }
        Err(err) => launch_failure(err, log),
    }
}

/// Run a `ref` test under `op` against the reference file at `reference`.
pub async fn check(
    argv: &[String],
    dir: &Path,
    reference: &Path,
    op: RefOp,
    timeout: Duration,
    differ: &dyn TextDiff,
    log: &mut Transcript,
) -> Status {
    match plan(op, reference) {
        Plan::Plain => command(argv, dir, timeout, log).await,

        Plan::Generate(scratch) => {
            log.line(format!("Generating ref file {}", reference.display()));
            debug!(reference = %reference.display(), scratch = %scratch.path().display(), "generating");
            let file = match scratch.as_file().try_clone() {
                Ok(file) => file,
                Err(err) => return launch_failure(Error::Io(err), log),
            };
            // A process that never started leaves the old reference alone;
            // dropping the scratch file removes it.
            if let Err(err) =
                supervisor::run_with_timeout(argv, dir, Capture::File(file), timeout, log).await
            {
                return launch_failure(err, log);
            }
            if let Err(err) = scratch.as_file().set_permissions(reference_mode(reference)) {
                return launch_failure(Error::Io(err), log);
            }
            match scratch.persist(reference) {
                Ok(_) => Status::Pass,
                Err(err) => launch_failure(Error::Io(err.error), log),
            }
        }

        Plan::Dump(text) => {
            for line in text.lines() {
                log.line(line.trim_end());
            }
            Status::Pass
        }

        Plan::Unverifiable => {
            log.line(format!(
                "Ref file {} does not exist.  Test output follows:",
                reference.display()
            ));
            match supervisor::run_with_timeout(argv, dir, Capture::Split, timeout, log).await {
                Ok(outcome) => outcome.output.surface(log),
                Err(err) => log.line(err.to_string()),
            }
            log.line(command_line(argv));
            Status::Fail(FAILURE_CODE)
        }

        Plan::Compare(expected) => {
            let outcome = match supervisor::run_with_timeout(
                argv,
                dir,
                Capture::Interleaved,
                timeout,
                log,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(err) => return launch_failure(err, log),
            };
            if outcome.timed_out() {
                log.line(command_line(argv));
                return Status::Fail(TIMEOUT_CODE);
            }
            let actual: Vec<String> = match &outcome.output {
                supervisor::Captured::Interleaved(out) => out.lines().map(String::from).collect(),
                _ => Vec::new(),
            };
            let diff = differ.diff(&expected, &actual);
            if diff.is_empty() {
                Status::Pass
            } else {
                for line in &diff {
                    log.line(line);
                }
                log.line(command_line(argv));
                Status::Fail(FAILURE_CODE)
            }
        }

        Plan::Broken(err) => {
            log.line(err.to_string());
            Status::Fail(match err {
                Error::MissingReference(_) => FAILURE_CODE,
                _ => ERROR_CODE,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ContextDiff;

    const LIMIT: Duration = Duration::from_secs(10);

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn parses_ref_ops() {
        assert_eq!("gen".parse::<RefOp>(), Ok(RefOp::Gen));
        assert_eq!("dump".parse::<RefOp>(), Ok(RefOp::Dump));
        assert!("diff".parse::<RefOp>().is_err());
    }

    #[test]
    fn reference_path_honours_refdir() {
        let dir = Path::new("/work");
        assert_eq!(reference_path("t", None, dir), PathBuf::from("/work/t.ref"));
        assert_eq!(
            reference_path("t", Some(Path::new("refs")), dir),
            PathBuf::from("/work/refs/t.ref")
        );
    }

    #[tokio::test]
    async fn gen_then_cmp_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        let argv = sh("echo one; echo two >&2; echo three");
        let differ = ContextDiff::default();

        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Gen, LIMIT, &differ, &mut log).await;
        assert_eq!(status, Status::Pass);
        assert_eq!(fs::read_to_string(&reference).unwrap(), "one\ntwo\nthree\n");

        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Cmp, LIMIT, &differ, &mut log).await;
        assert_eq!(status, Status::Pass, "{}", log.as_str());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn gen_passes_even_when_the_command_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        let mut log = Transcript::new();
        let status = check(
            &sh("echo broken; exit 3"),
            tmp.path(),
            &reference,
            RefOp::Gen,
            LIMIT,
            &ContextDiff::default(),
            &mut log,
        )
        .await;
        assert_eq!(status, Status::Pass);
        assert_eq!(fs::read_to_string(&reference).unwrap(), "broken\n");
        assert!(log.as_str().starts_with("Generating ref file"));
    }

    #[tokio::test]
    async fn cmp_mismatch_fails_with_context_diff() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        fs::write(&reference, "a\nb\nc\n").unwrap();
        let argv = sh("printf 'a\\nB\\nc\\n'");
        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Cmp, LIMIT, &ContextDiff::default(), &mut log).await;
        assert_eq!(status, Status::Fail(FAILURE_CODE));
        let text = log.as_str();
        assert!(text.contains("*** Expected\n--- Actual\n"));
        assert!(text.contains("! b\n"));
        assert!(text.contains("! B\n"));
        assert!(text.trim_end().ends_with("Command: sh -c printf 'a\\nB\\nc\\n'"));
    }

    #[tokio::test]
    async fn cmp_ignores_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        fs::write(&reference, "same\n").unwrap();
        let mut log = Transcript::new();
        let status = check(
            &sh("echo same; exit 1"),
            tmp.path(),
            &reference,
            RefOp::Cmp,
            LIMIT,
            &ContextDiff::default(),
            &mut log,
        )
        .await;
        assert_eq!(status, Status::Pass);
    }

    #[tokio::test]
    async fn cmp_without_reference_fails_and_shows_output() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("missing.ref");
        let mut log = Transcript::new();
        let status = check(&sh("echo hello"), tmp.path(), &reference, RefOp::Cmp, LIMIT, &ContextDiff::default(), &mut log).await;
        assert_eq!(status, Status::Fail(FAILURE_CODE));
        let text = log.as_str();
        assert!(text.contains("does not exist.  Test output follows:"));
        assert!(text.contains("hello\n"));
        assert!(text.contains("Command: sh -c echo hello"));
        assert!(!reference.exists());
    }

    #[tokio::test]
    async fn dump_prints_reference_without_running() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        fs::write(&reference, "stored\noutput\n").unwrap();
        let marker = tmp.path().join("ran");
        let argv = sh(&format!("touch {}", marker.display()));
        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Dump, LIMIT, &ContextDiff::default(), &mut log).await;
        assert_eq!(status, Status::Pass);
        assert_eq!(log.as_str(), "stored\noutput\n");
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn dump_without_reference_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        let mut log = Transcript::new();
        let status = check(&sh("true"), tmp.path(), &reference, RefOp::Dump, LIMIT, &ContextDiff::default(), &mut log).await;
        assert_eq!(status, Status::Fail(FAILURE_CODE));
        assert!(log.as_str().contains("does not exist."));
    }

    #[tokio::test]
    async fn none_uses_exit_code_only() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        let differ = ContextDiff::default();
        let mut log = Transcript::new();
        let ok = check(&sh("echo hi"), tmp.path(), &reference, RefOp::None, LIMIT, &differ, &mut log).await;
        assert_eq!(ok, Status::Pass);
        let failed = check(&sh("exit 5"), tmp.path(), &reference, RefOp::None, LIMIT, &differ, &mut log).await;
        assert_eq!(failed, Status::Fail(5));
        assert!(!reference.exists());
    }

    #[tokio::test]
    async fn gen_then_cmp_passes_for_non_utf8_output() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("latin1.ref");
        let argv = sh("printf 'caf\\351\\n'");
        let differ = ContextDiff::default();

        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Gen, LIMIT, &differ, &mut log).await;
        assert_eq!(status, Status::Pass);
        assert_eq!(fs::read(&reference).unwrap(), b"caf\xe9\n");

        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Cmp, LIMIT, &differ, &mut log).await;
        assert_eq!(status, Status::Pass, "{}", log.as_str());

        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Dump, LIMIT, &differ, &mut log).await;
        assert_eq!(status, Status::Pass);
        assert_eq!(log.as_str(), "caf\u{fffd}\n");
    }

    #[tokio::test]
    async fn gen_that_cannot_start_keeps_existing_reference() {
        let tmp = tempfile::tempdir().unwrap();
        let reference = tmp.path().join("t.ref");
        fs::write(&reference, "precious baseline\n").unwrap();
        let argv = vec!["./no-such-binary".to_string()];
        let mut log = Transcript::new();
        let status = check(&argv, tmp.path(), &reference, RefOp::Gen, LIMIT, &ContextDiff::default(), &mut log).await;
        assert_eq!(status, Status::Fail(ERROR_CODE));
        assert_eq!(fs::read_to_string(&reference).unwrap(), "precious baseline\n");
        let leftovers: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn command_that_cannot_start_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = Transcript::new();
        let argv = vec!["./definitely-not-here".to_string()];
        let status = command(&argv, tmp.path(), LIMIT, &mut log).await;
        assert_eq!(status, Status::Fail(ERROR_CODE));
        assert!(log.as_str().contains("definitely-not-here"));
    }
}
