//! Session configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::oracle::OracleConfig;
use crate::reduce::Mode;

/// Which sequences the driver minimizes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Granularity {
    /// Clauses, then the literals of each clause.
    #[default]
    Both,
    /// The clause list only.
    Clauses,
    /// The literals of each clause only.
    Literals,
}

impl Granularity {
    pub fn flag(self) -> &'static str {
        match self {
            Granularity::Both => "b",
            Granularity::Clauses => "c",
            Granularity::Literals => "l",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "b" => Ok(Granularity::Both),
            "c" => Ok(Granularity::Clauses),
            "l" => Ok(Granularity::Literals),
            _ => Err(Error::Config(format!("invalid granularity: {}", s))),
        }
    }
}

/// Everything a [Session][crate::driver::Session] needs to know.
#[derive(Debug, Clone)]
pub struct Options {
    /// The failure-inducing QDIMACS file.
    pub input: PathBuf,
    /// Solver command line; the candidate path is appended to it.
    pub command: String,
    /// Where the reduced formula goes, see [Options::output_path].
    pub output: Option<PathBuf>,
    /// Working file handed to the solver; a fresh temporary file if `None`.
    pub work_file: Option<PathBuf>,
    pub fail_code: Option<i32>,
    pub pass_code: Option<i32>,
    pub mode: Mode,
    pub granularity: Granularity,
    /// Try quantifier manipulations once clauses and literals are minimal.
    pub shift: bool,
    /// Compare exit codes only, not solver output.
    pub skip_output: bool,
    /// Per-run limit in seconds, 0 disables it.
    pub timeout: u64,
    /// Keep every tested candidate QDIMACS compliant.
    pub compliant: bool,
}

impl Options {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(input: P, command: S) -> Self {
        Self {
            input: input.into(),
            command: command.into(),
            output: None,
            work_file: None,
            fail_code: None,
            pass_code: None,
            mode: Mode::default(),
            granularity: Granularity::default(),
            shift: false,
            skip_output: false,
            timeout: 0,
            compliant: true,
        }
    }

    /// Rejects option combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.command.split_whitespace().next().is_none() {
            return Err(Error::Config("empty solver command".to_string()));
        }
        if let (Some(fail), Some(pass)) = (self.fail_code, self.pass_code) {
            if fail == pass {
                return Err(Error::Config(format!(
                    "exit codes for failed and passed runs must differ (both are {})",
                    fail
                )));
            }
        }
        if self.work_file.is_some() && self.work_file == self.output {
            return Err(Error::Config("working file and output file must differ".to_string()));
        }
        Ok(())
    }

    /// The explicit output path, or the input file name with `_reduced`
    /// inserted before its extension, in the current directory.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => default_output(&self.input),
        }
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            command: OracleConfig::split_command(&self.command),
            fail_code: self.fail_code,
            pass_code: self.pass_code,
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            skip_output: self.skip_output,
        }
    }

    /// A command line reproducing this session, for the output header.
    pub fn command_line(&self) -> String {
        let absolute = |path: &Path| {
            std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf())
                .display()
                .to_string()
        };
        let mut line = format!("qbfdd {} \"{}\"", absolute(&self.input), self.command);
        if let Some(fail) = self.fail_code {
            line.push_str(&format!(" -f {}", fail));
        }
        if let Some(pass) = self.pass_code {
            line.push_str(&format!(" -p {}", pass));
        }
        line.push_str(&format!(" -m {} -g {}", self.mode, self.granularity));
        if self.timeout > 0 {
            line.push_str(&format!(" -t {}", self.timeout));
        }
        let mut flags = String::new();
        if !self.compliant {
            flags.push('q');
        }
        if self.shift {
            flags.push('s');
        }
        if self.skip_output {
            flags.push('S');
        }
        if !flags.is_empty() {
            line.push_str(" -");
            line.push_str(&flags);
        }
        line
    }
}

fn default_output(input: &Path) -> PathBuf {
    let name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => PathBuf::from(format!("{}_reduced.{}", stem, ext)),
        _ => PathBuf::from(format!("{}_reduced", name)),
    }
}
