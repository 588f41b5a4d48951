//! The delta debugging session.
//!
//! [Minimizer] alternates clause reduction, per-clause literal minimization
//! and (optionally) quantifier manipulation until nothing changes any more.
//! [Session] wraps it with everything around a real solver: parsing the
//! input, the working file, the initial run, and the final write.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use tempfile::TempPath;

use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::normalize::restrict_prefix;
use crate::options::{Granularity, Options};
use crate::oracle::{Oracle, SolverTester, Tester};
use crate::parser;
use crate::quantifier::Manipulator;
use crate::reduce::{Mode, Reducer, Target};
use crate::types::is_single_universal;
use crate::utils::percent;
use crate::writer;

/// Counters reported by [Minimizer::minimize].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Progress {
    /// Reduction rounds that did some work.
    pub rounds: usize,
    /// Adopted quantifier manipulations.
    pub manipulations: usize,
}

#[derive(Debug, Copy, Clone)]
pub struct Minimizer {
    reducer: Reducer,
    manipulator: Manipulator,
    granularity: Granularity,
    shift: bool,
}

impl Minimizer {
    pub fn new(mode: Mode, granularity: Granularity, shift: bool, compliant: bool) -> Self {
        Self {
            reducer: Reducer::new(mode, compliant),
            manipulator: Manipulator::new(compliant),
            granularity,
            shift,
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self::new(options.mode, options.granularity, options.shift, options.compliant)
    }

    /// Minimizes `formula` until neither reductions nor quantifier
    /// manipulations succeed.
    pub fn minimize<T>(&self, tester: &mut T, formula: &mut Formula) -> Result<Progress>
    where
        T: Tester + ?Sized,
    {
        let mut progress = Progress::default();

        loop {
            loop {
                progress.rounds += 1;
                info!(
                    "round {}: {} clauses, {} variables, {} literals",
                    progress.rounds,
                    formula.num_clauses(),
                    formula.num_live_vars(),
                    formula.num_literals()
                );

                if self.granularity != Granularity::Literals {
                    let reduced = self.reducer.run(tester, formula, Target::Clauses)?.success;
                    debug!("clause reduction {}", if reduced { "successful" } else { "not successful" });
                    // a failed clause step means the last round already reached
                    // the fixpoint, unless the prefix changed in between
                    if !reduced
                        && ((progress.rounds > 1 && progress.manipulations == 0)
                            || self.granularity == Granularity::Clauses)
                    {
                        progress.rounds -= 1;
                        break;
                    }
                }

                if self.granularity != Granularity::Clauses {
                    let mut minimized = false;
                    for i in 0..formula.num_clauses() {
                        minimized |= self.reducer.run(tester, formula, Target::Literals(i))?.success;
                    }
                    debug!("clause minimization {}", if minimized { "successful" } else { "not successful" });
                    if !minimized {
                        break;
                    }
                }
            }

            if !self.shift {
                break;
            }
            match formula.quantsets() {
                [] => break,
                [q] if !q.is_universal() => break,
                _ => {}
            }
            if !self.manipulator.run(tester, formula)? {
                break;
            }
            progress.manipulations += 1;
        }

        Ok(progress)
    }
}

/// Size of a formula, as reported in the summary.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Stats {
    pub clauses: usize,
    pub variables: usize,
    pub literals: usize,
}

impl Stats {
    fn of(formula: &Formula, variables: usize) -> Self {
        Self {
            clauses: formula.num_clauses(),
            variables,
            literals: formula.num_literals(),
        }
    }
}

/// Outcome of a completed [Session].
#[derive(Debug, Clone)]
pub struct Summary {
    pub output: PathBuf,
    pub mode: Mode,
    pub progress: Progress,
    pub runs: usize,
    pub timeouts: usize,
    pub elapsed: Duration,
    pub before: Stats,
    pub after: Stats,
}

impl Summary {
    /// Lines of the comment block written on top of the result.
    pub fn comments(&self, options: &Options) -> Vec<String> {
        let mut comments = vec![
            format!(
                "{} by qbfdd v{}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                env!("CARGO_PKG_VERSION")
            ),
            options.command_line(),
            String::new(),
            format!("mode: {}", self.mode),
            format!("rounds: {}", self.progress.rounds),
        ];
        if options.shift {
            comments.push(format!("quants manipulated: {}", self.progress.manipulations));
        }
        comments.push(format!("test runs: {}", self.runs));
        comments.push(format!("time elapsed: {:5.2}s", self.elapsed.as_secs_f64()));
        comments.extend(self.reduction_lines());
        comments.push(String::new());
        comments
    }

    fn reduction_lines(&self) -> [String; 3] {
        let line = |label: &str, before: usize, after: usize| {
            let removed = before.saturating_sub(after);
            format!("{}: -{} ({:.2}%)", label, removed, percent(removed, before))
        };
        [
            line("total: clauses  ", self.before.clauses, self.after.clauses),
            line("       variables", self.before.variables, self.after.variables),
            line("       literals ", self.before.literals, self.after.literals),
        ]
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "result written to {}", self.output.display())?;
        writeln!(f, "rounds: {}", self.progress.rounds)?;
        if self.progress.manipulations > 0 {
            writeln!(f, "quants manipulated: {}", self.progress.manipulations)?;
        }
        write!(f, "test runs: {}", self.runs)?;
        if self.timeouts > 0 {
            write!(f, " ({} timed out)", self.timeouts)?;
        }
        writeln!(f)?;
        writeln!(f, "time elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        for line in self.reduction_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// One delta debugging run against a real solver.
pub struct Session {
    options: Options,
    interrupt: Arc<AtomicBool>,
}

impl Session {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Setting this flag aborts the session with [Error::Interrupted].
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn run(&self) -> Result<Summary> {
        let start = Instant::now();
        let options = &self.options;

        let mut formula = parser::parse_file(&options.input)?;
        info!(
            "parsed {}: {} clauses, {} variables, {} literals",
            options.input.display(),
            formula.num_clauses(),
            formula.num_vars(),
            formula.num_literals()
        );
        if options.compliant {
            check_compliable(&formula)?;
        }
        let before = Stats::of(&formula, formula.num_vars() as usize);

        // removed on drop, so also when the session is aborted
        let work_file = self.work_file()?;
        writer::write_file(&work_file, &formula, &[])?;
        let oracle = Oracle::establish_baseline(options.oracle_config(), self.interrupt_flag(), &work_file)?;
        info!("initial test run exited with {}", oracle.baseline_code());

        let output = options.output_path();
        let mut tester = SolverTester::new(oracle, work_file.to_path_buf(), output.clone());
        let progress = Minimizer::from_options(options).minimize(&mut tester, &mut formula)?;

        if options.compliant {
            formula = formula.normalized();
            if let Err(violation) = formula.check_compliance() {
                panic!("Reduced formula is not QDIMACS compliant: {}", violation);
            }
        }

        let summary = Summary {
            output,
            mode: options.mode,
            progress,
            runs: tester.oracle().runs(),
            timeouts: tester.oracle().timeouts(),
            elapsed: start.elapsed(),
            before,
            after: Stats::of(&formula, formula.num_live_vars()),
        };
        writer::write_file(&summary.output, &formula, &summary.comments(options))?;

        let path = work_file.to_path_buf();
        work_file.close().map_err(|source| Error::Io { path, source })?;
        Ok(summary)
    }

    fn work_file(&self) -> Result<TempPath> {
        match &self.options.work_file {
            Some(path) => TempPath::try_from_path(path.clone()).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            }),
            None => tempfile::Builder::new()
                .prefix("qbfdd-")
                .suffix(".qdimacs")
                .tempfile()
                .map(|file| file.into_temp_path())
                .map_err(|source| Error::Io {
                    path: std::env::temp_dir(),
                    source,
                }),
        }
    }
}

/// Rejects inputs that can never be turned into a compliant formula.
fn check_compliable(formula: &Formula) -> Result<()> {
    let hint = "it is impossible to fulfil QDIMACS compliance";
    let mut bound = HashSet::new();
    for &var in formula.quantsets().iter().flat_map(|q| q.vars.iter()) {
        if !bound.insert(var) {
            return Err(Error::Config(format!(
                "{}: variable {} is bound more than once, retry with -q",
                hint, var
            )));
        }
    }
    if is_single_universal(formula.quantsets())
        || is_single_universal(&restrict_prefix(formula.quantsets(), formula.ref_counts()))
    {
        return Err(Error::Config(format!(
            "{} if only one single universal quantifier set is given, retry with -q",
            hint
        )));
    }
    if formula.normalized().num_vars() == 0 {
        return Err(Error::Config(format!("{}: no variables would be left, retry with -q", hint)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::testing::{dimacs_clauses, flat_literals, FnTester};
    use crate::types::QuantSet;

    fn scenario() -> Formula {
        Formula::from_dimacs(
            3,
            vec![QuantSet::exists([1, 2, 3])],
            &[&[1, 2], &[-1, 3], &[-2, -3], &[1]],
        )
    }

    fn has_literal_one(f: &Formula) -> bool {
        flat_literals(f).contains(&1)
    }

    #[test]
    fn test_minimize_both() {
        let mut formula = scenario();
        let mut tester = FnTester::new(has_literal_one);
        let progress = Minimizer::new(Mode::Ddmin, Granularity::Both, false, false)
            .minimize(&mut tester, &mut formula)
            .unwrap();
        assert_eq!(dimacs_clauses(&formula), vec![vec![1]]);
        assert_eq!(progress, Progress { rounds: 1, manipulations: 0 });
    }

    #[test]
    fn test_minimize_clauses_only() {
        let mut formula = scenario();
        let mut tester = FnTester::new(has_literal_one);
        let progress = Minimizer::new(Mode::Ddmin, Granularity::Clauses, false, false)
            .minimize(&mut tester, &mut formula)
            .unwrap();
        assert_eq!(dimacs_clauses(&formula), vec![vec![1, 2]]);
        assert_eq!(progress.rounds, 1);
    }

    #[test]
    fn test_minimize_literals_only() {
        let mut formula = scenario();
        let mut tester = FnTester::new(has_literal_one);
        let progress = Minimizer::new(Mode::Ddmin, Granularity::Literals, false, false)
            .minimize(&mut tester, &mut formula)
            .unwrap();
        // the clause count never changes
        assert_eq!(dimacs_clauses(&formula), vec![vec![1], vec![-1], vec![-2], vec![1]]);
        assert_eq!(progress.rounds, 2);
    }

    #[test]
    fn test_minimize_with_shift() {
        let mut formula = Formula::from_dimacs(
            2,
            vec![QuantSet::forall([1]), QuantSet::exists([2])],
            &[&[1, 2], &[2]],
        );
        // only fails without universal variables
        let mut tester = FnTester::new(|f: &Formula| {
            f.quantsets().iter().all(|q| !q.is_universal()) && flat_literals(f).contains(&2)
        });
        let progress = Minimizer::new(Mode::Ddmin, Granularity::Both, true, false)
            .minimize(&mut tester, &mut formula)
            .unwrap();
        assert_eq!(progress, Progress { rounds: 3, manipulations: 1 });
        assert_eq!(formula.quantsets(), &[QuantSet::exists([1, 2])]);
        assert_eq!(dimacs_clauses(&formula), vec![vec![2]]);
    }

    #[test]
    fn test_shift_stops_on_single_existential_set() {
        let mut formula = scenario();
        let mut tester = FnTester::new(has_literal_one);
        let progress = Minimizer::new(Mode::Ddmin, Granularity::Both, true, false)
            .minimize(&mut tester, &mut formula)
            .unwrap();
        assert_eq!(progress.manipulations, 0);
        // no swap was ever tried
        assert!(tester.tested.iter().all(|f| f.quantsets() == [QuantSet::exists([1, 2, 3])]));
    }

    #[test]
    fn test_check_compliable() {
        let single = Formula::from_dimacs(2, vec![QuantSet::forall([1, 2])], &[&[1, 2]]);
        assert!(matches!(check_compliable(&single), Err(Error::Config(_))));

        // `e 1` is unused, so only `a 2` remains
        let restricted = Formula::from_dimacs(2, vec![QuantSet::exists([1]), QuantSet::forall([2])], &[&[2]]);
        assert!(matches!(check_compliable(&restricted), Err(Error::Config(_))));

        let twice = Formula::from_dimacs(2, vec![QuantSet::forall([1]), QuantSet::exists([1, 2])], &[&[1, 2]]);
        assert!(matches!(check_compliable(&twice), Err(Error::Config(_))));
        let twice = Formula::from_dimacs(1, vec![QuantSet::exists([1, 1])], &[&[1]]);
        assert!(matches!(check_compliable(&twice), Err(Error::Config(_))));

        assert!(check_compliable(&scenario()).is_ok());
    }

    #[test]
    fn test_summary_comments() {
        let options = Options::new("missing.qdimacs", "solver");
        let summary = Summary {
            output: PathBuf::from("missing_reduced.qdimacs"),
            mode: Mode::Ddmin,
            progress: Progress { rounds: 2, manipulations: 0 },
            runs: 17,
            timeouts: 0,
            elapsed: Duration::from_millis(1500),
            before: Stats { clauses: 4, variables: 3, literals: 7 },
            after: Stats { clauses: 1, variables: 1, literals: 1 },
        };
        let comments = summary.comments(&options);
        assert!(comments[0].ends_with(&format!("by qbfdd v{}", env!("CARGO_PKG_VERSION"))));
        assert_eq!(comments[1], "qbfdd missing.qdimacs \"solver\" -m ddmin -g b");
        assert_eq!(
            &comments[2..],
            &[
                "",
                "mode: ddmin",
                "rounds: 2",
                "test runs: 17",
                "time elapsed:  1.50s",
                "total: clauses  : -3 (75.00%)",
                "       variables: -2 (66.67%)",
                "       literals : -6 (85.71%)",
                "",
            ]
        );
    }
}
