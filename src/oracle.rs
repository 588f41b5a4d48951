//! Running the solver under test and classifying its behaviour.
//!
//! The solver is invoked as `<command tokens> <candidate path>`. Only its exit
//! code and captured output are observed. Output is spooled to anonymous
//! temporary files rather than pipes, so a chatty solver can never block on a
//! full pipe while we wait for it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use thiserror::Error;
use wait_timeout::ChildExt;

use crate::error::Result;
use crate::formula::Formula;
use crate::writer;

/// Interval between checks of the interrupt flag and the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit code of a run killed by SIGINT.
const KILLED_BY_SIGINT: i32 = -2;

/// How long the Ctrl-C handler may lag behind a solver killed by the same
/// SIGINT.
const SIGINT_GRACE: Duration = Duration::from_millis(250);

/// Outcome of testing one candidate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    /// The candidate reproduces the original failure.
    Failed,
    Passed,
    /// Neither the failing nor the passing exit code was observed.
    Unresolved,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("initial test run timed out")]
    BaselineTimeout,

    #[error("initial test run killed unexpectedly (exit code {0})")]
    BaselineKilled(i32),

    #[error("given input is no failing instance: expected exit code {expected}, got {actual}")]
    NotFailing { expected: i32, actual: i32 },

    #[error("test run killed unexpectedly (exit code {code})")]
    Killed { code: i32, stdout: String, stderr: String },

    #[error("interrupted")]
    Interrupted,

    #[error("solver I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// How to run the solver and how to interpret what it does.
#[derive(Debug, Clone, Default)]
pub struct OracleConfig {
    /// Program and leading arguments; the candidate path is appended.
    pub command: Vec<String>,
    /// Exit code of failing runs.
    pub fail_code: Option<i32>,
    /// Exit code of passing runs.
    pub pass_code: Option<i32>,
    /// Wall-clock limit per run, `None` to wait forever.
    pub timeout: Option<Duration>,
    /// Ignore output when comparing against the initial run.
    pub skip_output: bool,
}

impl OracleConfig {
    /// Splits a command line on whitespace.
    pub fn split_command(command: &str) -> Vec<String> {
        command.split_whitespace().map(str::to_string).collect()
    }
}

/// Captured result of a run that terminated on its own.
#[derive(Debug, Clone, Eq, PartialEq)]
struct Run {
    code: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

enum Outcome {
    Exited(Run),
    TimedOut,
}

/// The solver, together with its behaviour on the original input.
pub struct Oracle {
    config: OracleConfig,
    interrupt: Arc<AtomicBool>,
    baseline: Run,
    fail_code: Option<i32>,
    runs: usize,
    timeouts: usize,
}

impl Oracle {
    /// Runs the solver on the original input and records the failure to
    /// preserve.
    ///
    /// This run is not counted in [`Oracle::runs`].
    pub fn establish_baseline(
        config: OracleConfig,
        interrupt: Arc<AtomicBool>,
        path: &Path,
    ) -> Result<Self, OracleError> {
        let baseline = match execute(&config, &interrupt, path)? {
            Outcome::Exited(run) => run,
            Outcome::TimedOut => return Err(OracleError::BaselineTimeout),
        };
        debug!("initial test run exited with {}", baseline.code);

        if baseline.code == KILLED_BY_SIGINT && interrupt_follows(&interrupt) {
            return Err(OracleError::Interrupted);
        }

        let mut fail_code = config.fail_code;
        match config.fail_code {
            Some(_) if baseline.code < 0 => return Err(OracleError::BaselineKilled(baseline.code)),
            Some(expected) if expected != baseline.code => {
                return Err(OracleError::NotFailing {
                    expected,
                    actual: baseline.code,
                })
            }
            Some(_) => {}
            None => {
                if config.pass_code.is_some() && baseline.code >= 0 {
                    fail_code = Some(baseline.code);
                }
            }
        }

        Ok(Self {
            config,
            interrupt,
            baseline,
            fail_code,
            runs: 0,
            timeouts: 0,
        })
    }

    /// Runs the solver on `path` and classifies the result.
    pub fn test(&mut self, path: &Path) -> Result<Verdict, OracleError> {
        self.runs += 1;
        let run = match execute(&self.config, &self.interrupt, path)? {
            Outcome::Exited(run) => run,
            Outcome::TimedOut => {
                self.timeouts += 1;
                warn!("test run {} aborted (timeout)", self.runs);
                return Ok(Verdict::Passed);
            }
        };
        let verdict = match self.classify(run) {
            Err(OracleError::Killed {
                code: KILLED_BY_SIGINT, ..
            }) if interrupt_follows(&self.interrupt) => return Err(OracleError::Interrupted),
            result => result?,
        };
        trace!("test run {}: {:?}", self.runs, verdict);
        Ok(verdict)
    }

    fn classify(&self, run: Run) -> Result<Verdict, OracleError> {
        let verdict = match (self.fail_code, self.config.pass_code) {
            (None, _) => {
                let same_output = self.config.skip_output
                    || (run.stdout == self.baseline.stdout && run.stderr == self.baseline.stderr);
                if run.code == self.baseline.code && same_output {
                    Verdict::Failed
                } else {
                    Verdict::Passed
                }
            }
            (Some(fail), None) => {
                if run.code < 0 {
                    return Err(OracleError::Killed {
                        code: run.code,
                        stdout: String::from_utf8_lossy(&run.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&run.stderr).into_owned(),
                    });
                }
                if run.code == fail {
                    Verdict::Failed
                } else {
                    Verdict::Passed
                }
            }
            (Some(fail), Some(pass)) => {
                if run.code == fail {
                    Verdict::Failed
                } else if run.code == pass {
                    Verdict::Passed
                } else {
                    Verdict::Unresolved
                }
            }
        };
        Ok(verdict)
    }

    /// Exit code of the initial run.
    pub fn baseline_code(&self) -> i32 {
        self.baseline.code
    }

    /// Number of test runs so far, excluding the initial one.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Number of test runs aborted by the timeout.
    pub fn timeouts(&self) -> usize {
        self.timeouts
    }
}

fn execute(config: &OracleConfig, interrupt: &AtomicBool, path: &Path) -> Result<Outcome, OracleError> {
    let spawn_error = |source| OracleError::Spawn {
        command: config.command.join(" "),
        source,
    };
    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| spawn_error(io::Error::new(io::ErrorKind::InvalidInput, "empty command")))?;

    let mut stdout = tempfile::tempfile()?;
    let mut stderr = tempfile::tempfile()?;
    let mut child = Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(stdout.try_clone()?)
        .stderr(stderr.try_clone()?)
        .spawn()
        .map_err(spawn_error)?;

    let start = Instant::now();
    let status = loop {
        if interrupt.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(OracleError::Interrupted);
        }
        let slice = match config.timeout {
            Some(limit) => {
                let elapsed = start.elapsed();
                if elapsed >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(Outcome::TimedOut);
                }
                (limit - elapsed).min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };
        if let Some(status) = child.wait_timeout(slice)? {
            break status;
        }
    };
    // Ctrl-C reaches the whole process group, the child may have died from it
    if interrupt.load(Ordering::SeqCst) {
        return Err(OracleError::Interrupted);
    }

    Ok(Outcome::Exited(Run {
        code: exit_code(status),
        stdout: read_back(&mut stdout)?,
        stderr: read_back(&mut stderr)?,
    }))
}

/// Waits for the interrupt flag for at most [SIGINT_GRACE].
fn interrupt_follows(interrupt: &AtomicBool) -> bool {
    let start = Instant::now();
    while !interrupt.load(Ordering::SeqCst) {
        if start.elapsed() >= SIGINT_GRACE {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    true
}

fn read_back(file: &mut File) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Exit code of a finished process; a signal `s` is reported as `-s`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Decides whether a candidate formula still fails.
///
/// The reduction engine and the quantifier manipulator only ever see this
/// trait, so they can be driven by in-memory predicates in tests.
pub trait Tester {
    /// Tests a candidate in the exact form it would be handed to the solver.
    fn test(&mut self, candidate: &Formula) -> Result<Verdict>;

    /// Records a failing candidate as the best result so far.
    fn persist(&mut self, formula: &Formula) -> Result<()>;
}

/// [Tester] backed by a real solver process.
///
/// Candidates are written to the working file before each run; failing ones
/// are also written to the output file, so an interrupted session still leaves
/// its best result behind.
pub struct SolverTester {
    oracle: Oracle,
    work_file: PathBuf,
    output: PathBuf,
}

impl SolverTester {
    pub fn new(oracle: Oracle, work_file: PathBuf, output: PathBuf) -> Self {
        Self {
            oracle,
            work_file,
            output,
        }
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }
}

impl Tester for SolverTester {
    fn test(&mut self, candidate: &Formula) -> Result<Verdict> {
        writer::write_file(&self.work_file, candidate, &[])?;
        Ok(self.oracle.test(&self.work_file)?)
    }

    fn persist(&mut self, formula: &Formula) -> Result<()> {
        writer::write_file(&self.output, formula, &[])
    }
}
