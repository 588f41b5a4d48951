//! In-memory [Tester] implementations for unit tests.

use crate::error::Result;
use crate::formula::Formula;
use crate::oracle::{Tester, Verdict};

/// A tester driven by a predicate, recording every call.
pub struct FnTester<F> {
    predicate: F,
    pub tested: Vec<Formula>,
    pub persisted: Vec<Formula>,
}

impl<F> FnTester<F>
where
    F: FnMut(&Formula) -> bool,
{
    /// `predicate` returns `true` for candidates that still fail.
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            tested: Vec::new(),
            persisted: Vec::new(),
        }
    }
}

impl<F> Tester for FnTester<F>
where
    F: FnMut(&Formula) -> bool,
{
    fn test(&mut self, candidate: &Formula) -> Result<Verdict> {
        self.tested.push(candidate.clone());
        if (self.predicate)(candidate) {
            Ok(Verdict::Failed)
        } else {
            Ok(Verdict::Passed)
        }
    }

    fn persist(&mut self, formula: &Formula) -> Result<()> {
        self.persisted.push(formula.clone());
        Ok(())
    }
}

/// Clauses as DIMACS integers.
pub fn dimacs_clauses(formula: &Formula) -> Vec<Vec<i32>> {
    formula
        .clauses()
        .iter()
        .map(|clause| clause.iter().map(|lit| lit.to_dimacs()).collect())
        .collect()
}

/// Literals of all clauses, flattened; handy for formulas of unit clauses.
pub fn flat_literals(formula: &Formula) -> Vec<i32> {
    formula.clauses().iter().flatten().map(|lit| lit.to_dimacs()).collect()
}
