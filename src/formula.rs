//! The mutable formula model shared by the reduction engine and the driver.

use std::fmt;

use thiserror::Error;

use crate::types::{Clause, Lit, QuantSet, Var};

/// A quantified Boolean formula in prenex CNF.
///
/// `ref_count[v]` always equals the number of occurrences of variable `v`
/// across all clauses. Index 0 is unused. The table covers every variable of
/// the matrix but may end before `num_vars`: missing entries are zero.
#[derive(Debug, Clone)]
pub struct Formula {
    num_vars: u32,
    ref_count: Vec<u32>,
    quantsets: Vec<QuantSet>,
    clauses: Vec<Clause>,
}

/// A violation of QDIMACS compliance.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum Violation {
    #[error("variable {0} is never referenced")]
    Unreferenced(Var),
    #[error("variable {0} is quantified but unused")]
    QuantifiedUnused(Var),
    #[error("variable {0} is bound more than once")]
    BoundTwice(Var),
    #[error("quantifier sets {0} and {} share a quantifier", .0 + 1)]
    NotAlternating(usize),
    #[error("quantifier set {0} is empty")]
    EmptyQuantSet(usize),
    #[error("innermost quantifier set is universal")]
    UniversalInnermost,
    #[error("formula has no variables")]
    NoVariables,
}

impl Formula {
    /// Creates a formula, computing reference counts from the clauses.
    ///
    /// # Panics
    ///
    /// Panics if a literal references a variable above `num_vars`.
    pub fn new(num_vars: u32, quantsets: Vec<QuantSet>, clauses: Vec<Clause>) -> Self {
        let mut ref_count = vec![0; num_vars as usize + 1];
        for lit in clauses.iter().flatten() {
            let var = lit.var();
            assert!(var.id() <= num_vars, "Literal {} out of range", lit);
            ref_count[var.index()] += 1;
        }
        Self {
            num_vars,
            ref_count,
            quantsets,
            clauses,
        }
    }

    /// Convenience constructor from DIMACS integers.
    pub fn from_dimacs(num_vars: u32, quantsets: Vec<QuantSet>, clauses: &[&[i32]]) -> Self {
        let clauses = clauses
            .iter()
            .map(|clause| clause.iter().map(|&x| Lit::from_dimacs(x)).collect())
            .collect();
        Self::new(num_vars, quantsets, clauses)
    }

    /// Assembles a formula from parts whose reference counts are already known.
    pub(crate) fn from_parts(
        num_vars: u32,
        ref_count: Vec<u32>,
        quantsets: Vec<QuantSet>,
        clauses: Vec<Clause>,
    ) -> Self {
        assert!(!ref_count.is_empty() && ref_count.len() - 1 <= num_vars as usize);
        let formula = Self {
            num_vars,
            ref_count,
            quantsets,
            clauses,
        };
        debug_assert!(formula.check_ref_counts(), "Reference counts out of sync");
        formula
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn ref_count(&self, var: Var) -> u32 {
        self.ref_count.get(var.index()).copied().unwrap_or(0)
    }

    /// Reference counts indexed by variable id (index 0 unused).
    ///
    /// Variables past the end of the slice do not occur in the matrix.
    pub fn ref_counts(&self) -> &[u32] {
        &self.ref_count
    }

    pub fn quantsets(&self) -> &[QuantSet] {
        &self.quantsets
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Total number of literal occurrences.
    pub fn num_literals(&self) -> usize {
        self.ref_count.iter().map(|&c| c as usize).sum()
    }

    /// Number of variables that occur in at least one clause.
    pub fn num_live_vars(&self) -> usize {
        self.ref_count.iter().skip(1).filter(|&&c| c > 0).count()
    }

    /// Replaces the quantifier prefix, keeping the matrix.
    pub fn with_quantsets(&self, quantsets: Vec<QuantSet>) -> Self {
        Self {
            num_vars: self.num_vars,
            ref_count: self.ref_count.clone(),
            quantsets,
            clauses: self.clauses.clone(),
        }
    }

    /// Recounts all literal occurrences and compares with the stored counts.
    pub fn check_ref_counts(&self) -> bool {
        let mut counts = vec![0u32; self.ref_count.len()];
        for lit in self.clauses.iter().flatten() {
            match counts.get_mut(lit.var().index()) {
                Some(c) => *c += 1,
                None => return false,
            }
        }
        counts == self.ref_count
    }

    /// Checks the QDIMACS compliance invariants.
    ///
    /// Variables occurring in the matrix but in no quantifier set are accepted:
    /// QDIMACS binds them existentially in the outermost scope.
    pub fn check_compliance(&self) -> Result<(), Violation> {
        if self.num_vars == 0 {
            return Err(Violation::NoVariables);
        }
        for v in 1..=self.num_vars {
            if self.ref_count(Var::new(v)) == 0 {
                return Err(Violation::Unreferenced(Var::new(v)));
            }
        }
        let mut bound = vec![false; self.ref_count.len()];
        for (i, q) in self.quantsets.iter().enumerate() {
            if q.vars.is_empty() {
                return Err(Violation::EmptyQuantSet(i));
            }
            if i > 0 && self.quantsets[i - 1].quantifier == q.quantifier {
                return Err(Violation::NotAlternating(i - 1));
            }
            for &var in q.vars.iter() {
                if var.id() > self.num_vars || self.ref_count(var) == 0 {
                    return Err(Violation::QuantifiedUnused(var));
                }
                if std::mem::replace(&mut bound[var.index()], true) {
                    return Err(Violation::BoundTwice(var));
                }
            }
        }
        if self.quantsets.last().is_some_and(|q| q.is_universal()) {
            return Err(Violation::UniversalInnermost);
        }
        Ok(())
    }
}

/// Reference counts follow from the clauses and take no part in comparisons.
impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.num_vars == other.num_vars && self.quantsets == other.quantsets && self.clauses == other.clauses
    }
}

impl Eq for Formula {}

/// Writes the formula in QDIMACS format, without comments.
impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for q in self.quantsets.iter() {
            write!(f, "{}", q.quantifier)?;
            for var in q.vars.iter() {
                write!(f, " {}", var)?;
            }
            writeln!(f, " 0")?;
        }
        for clause in self.clauses.iter() {
            for lit in clause.iter() {
                write!(f, "{} ", lit)?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}
