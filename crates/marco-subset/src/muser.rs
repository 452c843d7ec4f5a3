use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use marco_core::{ConstraintStore, ErrorInfo, Interrupt, MarcoError, Seed};
use regex::Regex;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::gcnf::write_gcnf;
use crate::inprocess::InProcessSolver;
use crate::SubsetSolver;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MINIMIZER_FLAGS: [&str; 4] = ["-comp", "-grp", "-v", "-1"];
/// Result line of the minimizer, with or without a carriage return.
pub const V_LINE_PATTERN: &str = r"(?m)^v [\d ]+\r?$";

/// Kills and reaps the child on every exit path.
struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn process_error(code: &str, message: impl Into<String>, binary: &Path) -> MarcoError {
    MarcoError::Process(
        ErrorInfo::new(code, message).with_context("binary", binary.display().to_string()),
    )
}

fn protocol_error(code: &str, message: impl Into<String>) -> MarcoError {
    MarcoError::Protocol(ErrorInfo::new(code, message))
}

/// Subset solver that delegates shrink to a MUSer2-compatible binary.
///
/// Checks and grows run on an embedded [`InProcessSolver`].
pub struct MuserSolver {
    inner: InProcessSolver,
    binary: PathBuf,
    v_line: Regex,
}

impl std::fmt::Debug for MuserSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuserSolver")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

impl MuserSolver {
    /// Validates `binary` and loads `store`.
    ///
    /// The binary must be a regular file that can be spawned; otherwise a
    /// [`MarcoError::Config`] is returned before any work is done.
    pub fn new(store: Arc<ConstraintStore>, binary: impl Into<PathBuf>) -> Result<Self, MarcoError> {
        let binary = binary.into();
        if !binary.is_file() {
            return Err(MarcoError::Config(
                ErrorInfo::new("minimizer-missing", "minimizer binary not found")
                    .with_context("binary", binary.display().to_string())
                    .with_hint("pass --muser PATH or use --force-minisat"),
            ));
        }
        let probe = Command::new(&binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                MarcoError::Config(
                    ErrorInfo::new("minimizer-not-runnable", err.to_string())
                        .with_context("binary", binary.display().to_string())
                        .with_hint("it may be built for a different platform"),
                )
            })?;
        drop(ChildGuard { child: probe });

        let v_line = Regex::new(V_LINE_PATTERN).map_err(|err| {
            MarcoError::Config(ErrorInfo::new("bad-pattern", err.to_string()))
        })?;
        debug!(binary = %binary.display(), "external minimizer ready");
        Ok(Self {
            inner: InProcessSolver::new(store)?,
            binary,
            v_line,
        })
    }

    /// Polls `interrupt` in checks, grows and while waiting on the child.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.inner = self.inner.with_interrupt(interrupt);
        self
    }

    /// Path of the minimizer binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run_minimizer(&self, seed: &[usize], hard: &[usize]) -> Result<Seed, MarcoError> {
        let store = self.inner.store();
        let mut document = tempfile::NamedTempFile::new()
            .map_err(|err| process_error("tempfile", err.to_string(), &self.binary))?;
        {
            let mut writer = BufWriter::new(document.as_file_mut());
            write_gcnf(store, seed, hard, &mut writer)
                .and_then(|_| writer.flush())
                .map_err(|err| process_error("write-gcnf", err.to_string(), &self.binary))?;
        }

        let child = Command::new(&self.binary)
            .args(MINIMIZER_FLAGS)
            .arg(document.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| process_error("spawn-failed", err.to_string(), &self.binary))?;
        let mut guard = ChildGuard { child };

        let mut stdout = guard
            .child
            .stdout
            .take()
            .ok_or_else(|| process_error("no-stdout", "child stdout was not captured", &self.binary))?;
        let reader = thread::spawn(move || {
            let mut text = String::new();
            stdout.read_to_string(&mut text).map(|_| text)
        });

        let interrupt = self.inner.interrupt();
        let status = loop {
            match guard.child.wait_timeout(POLL_INTERVAL) {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if interrupt.is_triggered() {
                        drop(guard);
                        interrupt.check()?;
                        return Err(MarcoError::Interrupted(ErrorInfo::new(
                            "interrupted",
                            "minimizer interrupted",
                        )));
                    }
                }
                Err(err) => return Err(process_error("wait-failed", err.to_string(), &self.binary)),
            }
        };
        if !status.success() {
            debug!(%status, "minimizer exited with non-zero status");
        }

        let output = reader
            .join()
            .map_err(|_| process_error("read-failed", "stdout reader panicked", &self.binary))?
            .map_err(|err| process_error("read-failed", err.to_string(), &self.binary))?;
        drop(guard);

        let mus = parse_minimizer_output(&self.v_line, &output, seed, hard).map_err(|err| {
            warn!(error = %err, "minimizer output rejected");
            err
        })?;
        debug!(seed = seed.len(), mus = mus.len(), "external shrink finished");
        Ok(mus)
    }
}

/// Extracts the MUS from minimizer stdout.
///
/// The first line matching `pattern` is read as `v t1 t2 ... 0`; tag `t` names
/// the seed element at position `t - 1`. The indices of `hard` present in the
/// seed are added back.
pub fn parse_minimizer_output(
    pattern: &Regex,
    output: &str,
    seed: &[usize],
    hard: &[usize],
) -> Result<Seed, MarcoError> {
    let line = pattern.find(output).ok_or_else(|| {
        MarcoError::Protocol(
            ErrorInfo::new("missing-v-line", "minimizer printed no result line")
                .with_context("output_bytes", output.len().to_string()),
        )
    })?;
    let tokens: Vec<&str> = line.as_str().split_whitespace().skip(1).collect();
    let Some((&last, tags)) = tokens.split_last() else {
        return Err(protocol_error("missing-terminator", "empty result line"));
    };
    if last != "0" {
        return Err(protocol_error(
            "missing-terminator",
            format!("result line ends with {last} instead of 0"),
        ));
    }

    let mut mus: Seed = Vec::with_capacity(tags.len() + hard.len());
    for token in tags {
        let tag: usize = token
            .parse()
            .map_err(|_| protocol_error("bad-tag", format!("invalid group tag {token}")))?;
        if tag == 0 {
            return Err(protocol_error("early-terminator", "tag 0 before the end of the line"));
        }
        let Some(&idx) = seed.get(tag - 1) else {
            return Err(MarcoError::Protocol(
                ErrorInfo::new("tag-out-of-range", format!("tag {tag} exceeds the seed"))
                    .with_context("seed_len", seed.len().to_string()),
            ));
        };
        if hard.contains(&idx) {
            return Err(protocol_error(
                "hard-tag",
                format!("tag {tag} names a hard constraint"),
            ));
        }
        mus.push(idx);
    }
    mus.extend(seed.iter().copied().filter(|idx| hard.contains(idx)));
    mus.sort_unstable();
    mus.dedup();
    Ok(mus)
}

impl SubsetSolver for MuserSolver {
    fn name(&self) -> &'static str {
        "muser"
    }

    fn n(&self) -> usize {
        self.inner.n()
    }

    fn check_subset(&mut self, seed: &[usize]) -> Result<bool, MarcoError> {
        self.inner.check_subset(seed)
    }

    fn grow(&mut self, seed: &[usize]) -> Result<Seed, MarcoError> {
        self.inner.grow(seed)
    }

    fn grow_current(&mut self) -> Result<Seed, MarcoError> {
        self.inner.grow_current()
    }

    fn shrink(&mut self, seed: &[usize], hard: &[usize]) -> Result<Seed, MarcoError> {
        self.run_minimizer(seed, hard)
    }

    fn shrink_current(&mut self, hard: &[usize]) -> Result<Seed, MarcoError> {
        let seed = self
            .inner
            .last_unsat_seed()
            .map(<[usize]>::to_vec)
            .ok_or_else(|| {
                MarcoError::Solver(ErrorInfo::new(
                    "no-unsatisfiable-check",
                    "shrink_current needs a preceding unsatisfiable check",
                ))
            })?;
        self.run_minimizer(&seed, hard)
    }
}
