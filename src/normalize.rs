//! QDIMACS compliance normalization.
//!
//! [`normalize`] rewrites a (possibly non-compliant) candidate into canonical
//! QDIMACS form:
//!
//! - a universal innermost quantifier set is eliminated by dropping all of its
//!   literals from the matrix (clauses left empty are dropped),
//! - variables are renumbered contiguously `1..n`, in their original order,
//!   skipping unreferenced ones,
//! - empty quantifier sets are dropped and adjacent sets sharing a quantifier
//!   are merged,
//! - each quantifier set is sorted.
//!
//! The elimination is not a forall reduction: tautologies and conflicts are
//! treated alike. Only reproduction of the solver failure matters here, not
//! logical equivalence.

use std::borrow::Cow;

use log::trace;

use crate::formula::Formula;
use crate::types::{is_single_universal, Clause, QuantSet, Var};

/// Result of [`normalize`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Normalized {
    pub ref_count: Vec<u32>,
    pub quantsets: Vec<QuantSet>,
    pub clauses: Vec<Clause>,
}

impl Normalized {
    pub fn into_formula(self) -> Formula {
        let num_vars = (self.ref_count.len() - 1) as u32;
        Formula::from_parts(num_vars, self.ref_count, self.quantsets, self.clauses)
    }
}

/// Restricts a prefix to referenced variables.
///
/// Unreferenced variables are removed, sets left empty are dropped and
/// neighbours that end up sharing a quantifier are merged (without sorting).
pub fn restrict_prefix(quantsets: &[QuantSet], ref_count: &[u32]) -> Vec<QuantSet> {
    let mut restricted: Vec<QuantSet> = Vec::with_capacity(quantsets.len());
    for q in quantsets.iter() {
        let vars: Vec<Var> = q
            .vars
            .iter()
            .copied()
            .filter(|v| ref_count.get(v.index()).is_some_and(|&c| c > 0))
            .collect();
        if vars.is_empty() {
            continue;
        }
        match restricted.last_mut() {
            Some(last) if last.quantifier == q.quantifier => last.vars.extend(vars),
            _ => restricted.push(QuantSet::new(q.quantifier, vars)),
        }
    }
    restricted
}

/// Rewrites a configuration into QDIMACS compliant form.
///
/// # Panics
///
/// Panics if the prefix is a single universal set: it would collapse to an
/// empty formula, callers must reject such candidates beforehand.
pub fn normalize(ref_count: &[u32], quantsets: &[QuantSet], clauses: &[Clause]) -> Normalized {
    assert!(
        !is_single_universal(quantsets),
        "Cannot normalize a prefix consisting of a single universal set"
    );

    let mut ref_count = ref_count.to_vec();
    let mut clauses = clauses.to_vec();
    let mut quantsets = restrict_prefix(quantsets, &ref_count);
    while quantsets.last().is_some_and(|q| q.is_universal()) {
        if let Some(innermost) = quantsets.pop() {
            eliminate(&innermost, &mut ref_count, &mut clauses);
        }
        quantsets = restrict_prefix(&quantsets, &ref_count);
    }

    // mapping[old] = new, for referenced variables only
    let mut mapping = vec![0u32; ref_count.len()];
    let mut ref_count_upd = vec![0u32];
    for (old, &count) in ref_count.iter().enumerate().skip(1) {
        if count > 0 {
            ref_count_upd.push(count);
            mapping[old] = (ref_count_upd.len() - 1) as u32;
        }
    }
    let rename = |var: Var| Var::new(mapping[var.index()]);

    for q in quantsets.iter_mut() {
        for var in q.vars.iter_mut() {
            *var = rename(*var);
        }
        q.vars.sort();
    }
    for clause in clauses.iter_mut() {
        for lit in clause.iter_mut() {
            *lit = lit.with_var(rename(lit.var()));
        }
    }

    trace!(
        "normalized: {} -> {} variables, {} clauses",
        ref_count.len() - 1,
        ref_count_upd.len() - 1,
        clauses.len()
    );

    Normalized {
        ref_count: ref_count_upd,
        quantsets,
        clauses,
    }
}

/// Drops every literal bound by `innermost` from the matrix.
fn eliminate(innermost: &QuantSet, ref_count: &mut [u32], clauses: &mut Vec<Clause>) {
    debug_assert!(innermost.is_universal());
    let mut bound = vec![false; ref_count.len()];
    for var in innermost.vars.iter() {
        bound[var.index()] = true;
    }
    for clause in clauses.iter_mut() {
        clause.retain(|lit| {
            let var = lit.var();
            if bound[var.index()] {
                assert!(ref_count[var.index()] > 0, "Negative reference count for {}", var);
                ref_count[var.index()] -= 1;
                false
            } else {
                true
            }
        });
    }
    for var in innermost.vars.iter() {
        assert_eq!(ref_count[var.index()], 0, "Reference count out of sync for {}", var);
    }
    clauses.retain(|clause| !clause.is_empty());
}

impl Formula {
    /// Returns the QDIMACS compliant form of this formula.
    pub fn normalized(&self) -> Formula {
        normalize(self.ref_counts(), self.quantsets(), self.clauses()).into_formula()
    }
}

/// Returns the form of `candidate` that is handed to the solver.
///
/// Without compliance the candidate is tested as is. With compliance it is
/// normalized first; `None` means it must be skipped without a test run,
/// either because its prefix is a single universal set or because nothing
/// would be left of it.
pub fn tested_form(candidate: &Formula, compliant: bool) -> Option<Cow<'_, Formula>> {
    if !compliant {
        return Some(Cow::Borrowed(candidate));
    }
    if is_single_universal(candidate.quantsets()) {
        trace!("only one universal quantset left, skipping test run");
        return None;
    }
    let normalized = candidate.normalized();
    if normalized.num_vars() == 0 {
        trace!("empty set, skipping test run");
        return None;
    }
    Some(Cow::Owned(normalized))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn norm(f: &Formula) -> Formula {
        f.normalized()
    }

    #[test]
    fn test_already_compliant_unchanged() {
        let f = Formula::from_dimacs(3, vec![QuantSet::forall([1]), QuantSet::exists([2, 3])], &[&[1, 2], &[-1, 3]]);
        assert_eq!(norm(&f), f);
    }

    #[test]
    fn test_renumber_preserves_order_and_sign() {
        let f = Formula::from_dimacs(5, vec![QuantSet::forall([2]), QuantSet::exists([4, 5])], &[&[-2, 5], &[4, -5]]);
        let g = norm(&f);
        assert_eq!(g.num_vars(), 3);
        assert_eq!(g.quantsets(), &[QuantSet::forall([1]), QuantSet::exists([2, 3])]);
        assert_eq!(g, Formula::from_dimacs(3, g.quantsets().to_vec(), &[&[-1, 3], &[2, -3]]));
    }

    #[test]
    fn test_universal_innermost_eliminated() {
        let f = Formula::from_dimacs(
            3,
            vec![QuantSet::exists([1]), QuantSet::forall([2, 3])],
            &[&[1, 2], &[-2, 3], &[-1, -3, 2]],
        );
        let g = norm(&f);
        // [-2, 3] becomes empty and is dropped
        assert_eq!(g, Formula::from_dimacs(1, vec![QuantSet::exists([1])], &[&[1], &[-1]]));
        assert_eq!(g.check_compliance(), Ok(()));
    }

    #[test]
    fn test_merges_after_dropping_empty_sets() {
        // var 2 is unused: e 1 / a 2 / e 3 collapses into one existential set
        let f = Formula::from_dimacs(
            3,
            vec![QuantSet::exists([3]), QuantSet::forall([2]), QuantSet::exists([1])],
            &[&[1, 3]],
        );
        let g = norm(&f);
        assert_eq!(g.quantsets(), &[QuantSet::exists([1, 2])]);
        assert_eq!(g.num_vars(), 2);
    }

    #[test]
    fn test_repeats_until_innermost_existential() {
        // the unused `e 2` disappears, so `a 1` and `a 3` merge into the innermost set
        let f = Formula::from_dimacs(
            4,
            vec![QuantSet::exists([4]), QuantSet::forall([1]), QuantSet::exists([2]), QuantSet::forall([3])],
            &[&[1, 3, 4], &[-4, -3]],
        );
        let g = norm(&f);
        assert_eq!(g, Formula::from_dimacs(1, vec![QuantSet::exists([1])], &[&[1], &[-1]]));
    }

    #[test]
    fn test_free_variables_renumbered() {
        let f = Formula::from_dimacs(4, vec![QuantSet::exists([4])], &[&[2, 4]]);
        let g = norm(&f);
        assert_eq!(g, Formula::from_dimacs(2, vec![QuantSet::exists([2])], &[&[1, 2]]));
    }

    #[test]
    fn test_sorts_sets() {
        let f = Formula::from_dimacs(3, vec![QuantSet::exists([3, 1, 2])], &[&[1, 2, 3]]);
        assert_eq!(norm(&f).quantsets(), &[QuantSet::exists([1, 2, 3])]);
    }

    #[test]
    #[should_panic(expected = "single universal set")]
    fn test_single_universal_panics() {
        let f = Formula::from_dimacs(2, vec![QuantSet::forall([1, 2])], &[&[1, 2]]);
        norm(&f);
    }

    #[test]
    fn test_restrict_prefix() {
        let prefix = vec![QuantSet::exists([1, 2]), QuantSet::forall([3]), QuantSet::exists([4])];
        let restricted = restrict_prefix(&prefix, &[0, 1, 0, 0, 2]);
        assert_eq!(restricted, vec![QuantSet::exists([1, 4])]);
    }

    #[test]
    fn test_tested_form() {
        let f = Formula::from_dimacs(2, vec![QuantSet::exists([2])], &[&[2]]);
        assert_eq!(tested_form(&f, false).unwrap().as_ref(), &f);
        let g = tested_form(&f, true).unwrap();
        assert_eq!(g.num_vars(), 1);

        let single = Formula::from_dimacs(1, vec![QuantSet::forall([1])], &[&[1]]);
        assert!(tested_form(&single, true).is_none());
        assert!(tested_form(&single, false).is_some());

        let vanishing = Formula::from_dimacs(2, vec![QuantSet::exists([1]), QuantSet::forall([2])], &[&[2]]);
        assert!(tested_form(&vanishing, true).is_none());
    }
}
