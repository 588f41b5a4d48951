//! The reduction engine.
//!
//! Both families shrink a sequence of elements (the clause list, or the
//! literals of one clause) while the [Tester] keeps reporting
//! [Verdict::Failed]:
//!
//! - **ddmin** and its variants split the sequence into `n` contiguous parts
//!   and test each part alone and each complement, refining `n` until the
//!   result is 1-minimal. The `s` variants skip the parts and only test
//!   complements. The `i` variants start at the finest granularity and
//!   coarsen instead.
//! - **obo** and **qobo** remove one element at a time. After a successful
//!   removal `obo` restarts its scan, while `qobo` carries on from where it
//!   was.
//!
//! Every candidate is derived from the formula as it was when the engine was
//! called, so a candidate is fully identified by the positions of the elements
//! it keeps. That list of positions is the cache key.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use crate::cache::VerdictCache;
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::normalize::{restrict_prefix, tested_form};
use crate::oracle::{Tester, Verdict};
use crate::types::{Clause, Lit};
use crate::utils::{first_occurrence_ids, split};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Mode {
    #[default]
    Ddmin,
    /// Simple ddmin: complements only.
    Sddmin,
    /// Inverse ddmin: start with singletons.
    Iddmin,
    /// Inverse simple ddmin.
    Isddmin,
    /// One by one.
    Obo,
    /// Quick one by one.
    Qobo,
}

impl Mode {
    pub fn is_simple(self) -> bool {
        matches!(self, Mode::Sddmin | Mode::Isddmin)
    }

    pub fn is_inverse(self) -> bool {
        matches!(self, Mode::Iddmin | Mode::Isddmin)
    }

    pub fn is_linear(self) -> bool {
        matches!(self, Mode::Obo | Mode::Qobo)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ddmin => "ddmin",
            Mode::Sddmin => "sddmin",
            Mode::Iddmin => "iddmin",
            Mode::Isddmin => "isddmin",
            Mode::Obo => "obo",
            Mode::Qobo => "qobo",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ddmin" => Ok(Mode::Ddmin),
            "sddmin" => Ok(Mode::Sddmin),
            "iddmin" => Ok(Mode::Iddmin),
            "isddmin" => Ok(Mode::Isddmin),
            "obo" => Ok(Mode::Obo),
            "qobo" => Ok(Mode::Qobo),
            _ => Err(Error::Config(format!("invalid mode: {}", s))),
        }
    }
}

/// The sequence being minimized.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Target {
    /// The clause list.
    Clauses,
    /// The literals of the clause at the given position.
    Literals(usize),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Clauses => write!(f, "clauses"),
            Target::Literals(i) => write!(f, "literals of clause {}", i),
        }
    }
}

/// Result of one engine call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reduction {
    /// Whether any candidate was adopted.
    pub success: bool,
    /// Positions (in the initial sequence) of the surviving elements.
    pub kept: Vec<usize>,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Reducer {
    mode: Mode,
    compliant: bool,
}

impl Reducer {
    pub fn new(mode: Mode, compliant: bool) -> Self {
        Self { mode, compliant }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Minimizes `target` in place.
    ///
    /// `formula` is replaced by every candidate that still fails, and the
    /// tested form of such a candidate is handed to [Tester::persist].
    pub fn run<T>(&self, tester: &mut T, formula: &mut Formula, target: Target) -> Result<Reduction>
    where
        T: Tester + ?Sized,
    {
        let mut probe = Probe::new(formula.clone(), target, self.compliant);
        let len = probe.len();
        if len < 2 {
            debug!("only one element left in {}, skipping", target);
            return Ok(Reduction {
                success: false,
                kept: (0..len).collect(),
            });
        }
        debug!("minimizing {} ({} elements) with {}", target, len, self.mode);

        let reduction = if self.mode.is_linear() {
            self.linear(tester, formula, &mut probe)?
        } else {
            self.ddmin(tester, formula, &mut probe)?
        };

        info!(
            "{}: {} -> {} elements ({} cached verdicts, {} hits)",
            target,
            len,
            reduction.kept.len(),
            probe.cache.len(),
            probe.cache.hits()
        );
        Ok(reduction)
    }

    fn ddmin<T>(&self, tester: &mut T, formula: &mut Formula, probe: &mut Probe) -> Result<Reduction>
    where
        T: Tester + ?Sized,
    {
        let mut set: Vec<usize> = (0..probe.len()).collect();
        let mut n = if self.mode.is_inverse() { set.len() } else { 2 };
        let mut success = false;

        while set.len() >= 2 {
            let parts = split(&set, n);
            let mut adopted = false;

            if !self.mode.is_simple() {
                for part in parts.iter() {
                    if let Some(candidate) = probe.try_candidate(tester, part)? {
                        *formula = candidate;
                        set = part.clone();
                        n = if self.mode.is_inverse() { set.len() } else { 2 };
                        adopted = true;
                        break;
                    }
                }
            }

            if !adopted {
                for i in 0..parts.len() {
                    let complement = complement(&parts, i);
                    if let Some(candidate) = probe.try_candidate(tester, &complement)? {
                        *formula = candidate;
                        set = complement;
                        n = if self.mode.is_inverse() {
                            set.len()
                        } else {
                            (n - 1).max(2)
                        };
                        adopted = true;
                        break;
                    }
                }
            }

            if adopted {
                success = true;
                continue;
            }

            if self.mode.is_inverse() {
                if n == 2 {
                    break;
                }
                let m = set.len() / n + 1;
                n = (set.len() / m).max(2);
            } else {
                if n == set.len() {
                    break;
                }
                n = (2 * n).min(set.len());
            }
            debug!("granularity {}", n);
        }

        Ok(Reduction { success, kept: set })
    }

    fn linear<T>(&self, tester: &mut T, formula: &mut Formula, probe: &mut Probe) -> Result<Reduction>
    where
        T: Tester + ?Sized,
    {
        let quick = self.mode == Mode::Qobo;
        let mut set: Vec<usize> = (0..probe.len()).collect();
        let mut success = false;

        while set.len() >= 2 {
            let mut reduced = false;
            let mut i = 0;
            while i < set.len() && set.len() >= 2 {
                let mut complement = set.clone();
                complement.remove(i);
                match probe.try_candidate(tester, &complement)? {
                    Some(candidate) => {
                        *formula = candidate;
                        set = complement;
                        reduced = true;
                        success = true;
                        if !quick {
                            break;
                        }
                        // the next element slid into position `i`, unless the
                        // one removed was second to last
                        if i + 1 >= set.len() {
                            i += 1;
                        }
                    }
                    None => i += 1,
                }
            }
            if !reduced {
                break;
            }
        }

        Ok(Reduction { success, kept: set })
    }
}

fn complement(parts: &[Vec<usize>], skip: usize) -> Vec<usize> {
    parts
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != skip)
        .flat_map(|(_, part)| part.iter().copied())
        .collect()
}

/// Per-call state: the initial formula and the verdicts seen so far.
struct Probe {
    initial: Formula,
    target: Target,
    /// Cache id of each element: the position of its first equal element.
    ids: Vec<usize>,
    cache: VerdictCache<Vec<usize>>,
    compliant: bool,
}

impl Probe {
    fn new(initial: Formula, target: Target, compliant: bool) -> Self {
        let ids = match target {
            Target::Clauses => first_occurrence_ids(initial.clauses()),
            Target::Literals(c) => first_occurrence_ids(&initial.clauses()[c]),
        };
        Self {
            initial,
            target,
            ids,
            cache: VerdictCache::new(),
            compliant,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Tests the candidate keeping the elements at `kept`.
    ///
    /// Returns the candidate if it still fails. Cached candidates and
    /// candidates that cannot be made compliant are never handed to the
    /// tester and count as not failing.
    fn try_candidate<T>(&mut self, tester: &mut T, kept: &[usize]) -> Result<Option<Formula>>
    where
        T: Tester + ?Sized,
    {
        let key: Vec<usize> = kept.iter().map(|&i| self.ids[i]).collect();
        if let Some(verdict) = self.cache.get(&key) {
            debug!("candidate {:?} already tested: {:?}", key, verdict);
            return Ok(None);
        }

        let candidate = self.build(kept);
        let verdict = {
            let Some(tested) = tested_form(&candidate, self.compliant) else {
                return Ok(None);
            };
            let verdict = tester.test(&tested)?;
            if verdict == Verdict::Failed {
                tester.persist(&tested)?;
            }
            verdict
        };
        debug!("candidate {:?}: {:?}", key, verdict);
        self.cache.insert(key, verdict);

        if verdict == Verdict::Failed {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }

    fn build(&self, kept: &[usize]) -> Formula {
        let mut keep = vec![false; self.len()];
        for &i in kept.iter() {
            keep[i] = true;
        }
        let mut ref_count = self.initial.ref_counts().to_vec();
        let clauses: Vec<Clause> = match self.target {
            Target::Clauses => {
                for (i, clause) in self.initial.clauses().iter().enumerate() {
                    if !keep[i] {
                        release_literals(&mut ref_count, clause);
                    }
                }
                kept.iter().map(|&i| self.initial.clauses()[i].clone()).collect()
            }
            Target::Literals(c) => {
                let clause = &self.initial.clauses()[c];
                let removed: Clause = (0..clause.len()).filter(|&i| !keep[i]).map(|i| clause[i]).collect();
                release_literals(&mut ref_count, &removed);
                let mut clauses = self.initial.clauses().to_vec();
                clauses[c] = kept.iter().map(|&i| clause[i]).collect();
                clauses
            }
        };

        let quantsets = if self.compliant {
            restrict_prefix(self.initial.quantsets(), &ref_count)
        } else {
            self.initial.quantsets().to_vec()
        };
        Formula::from_parts(self.initial.num_vars(), ref_count, quantsets, clauses)
    }
}

fn release_literals(ref_count: &mut [u32], literals: &[Lit]) {
    for lit in literals.iter() {
        let count = &mut ref_count[lit.var().index()];
        assert!(*count > 0, "Negative reference count for {}", lit.var());
        *count -= 1;
    }
}
