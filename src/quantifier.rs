//! Quantifier prefix manipulation.
//!
//! Once clauses and literals cannot be reduced any further, the prefix itself
//! is simplified. Two moves are tried:
//!
//! - [swap] flips the quantifier of one set and merges it with its
//!   neighbours, which then share its quantifier,
//! - [shift] moves a single variable into the previous or the next set.
//!
//! Every swap is tried before any shift. The first candidate that still fails
//! is adopted, so one call changes the prefix at most once.

use log::{debug, info};

use crate::cache::{prefix_key, PrefixToken, VerdictCache};
use crate::error::Result;
use crate::formula::Formula;
use crate::normalize::tested_form;
use crate::oracle::{Tester, Verdict};
use crate::types::QuantSet;

/// Flips the quantifier of set `index`, merging it with its neighbours.
///
/// The merged set takes the position of the leftmost set involved and its
/// variables are sorted. A lone set is only flipped.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn swap(quantsets: &[QuantSet], index: usize) -> Vec<QuantSet> {
    assert!(index < quantsets.len(), "No quantifier set at {}", index);
    let mut result = quantsets.to_vec();
    let flipped = quantsets[index].quantifier.flip();
    let last = quantsets.len() - 1;

    if index > 0 {
        debug_assert_eq!(quantsets[index - 1].quantifier, flipped);
        let mut merged: Vec<QuantSet> = result.drain(index..(index + 2).min(last + 1)).collect();
        let target = &mut result[index - 1];
        for q in merged.iter_mut() {
            target.vars.append(&mut q.vars);
        }
        target.vars.sort();
        target.quantifier = flipped;
    } else {
        if last > 0 {
            debug_assert_eq!(quantsets[1].quantifier, flipped);
            let mut next = result.remove(1);
            result[0].vars.append(&mut next.vars);
            result[0].vars.sort();
        }
        result[0].quantifier = flipped;
    }
    result
}

/// Where [shift] moves a variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Prev,
    Next,
}

/// Moves the variable at `position` in set `index` to the end of the
/// neighbouring set.
///
/// # Panics
///
/// Panics if the neighbour in the given direction does not exist.
pub fn shift(quantsets: &[QuantSet], index: usize, position: usize, direction: Direction) -> Vec<QuantSet> {
    let neighbour = match direction {
        Direction::Prev => index.checked_sub(1),
        Direction::Next => Some(index + 1).filter(|&i| i < quantsets.len()),
    };
    let neighbour = match neighbour {
        Some(i) => i,
        None => panic!("Quantifier set {} has no {:?} neighbour", index, direction),
    };
    let mut result = quantsets.to_vec();
    let var = result[index].vars.remove(position);
    result[neighbour].vars.push(var);
    result
}

/// Tries the prefix moves on `formula` until one of them still fails.
#[derive(Debug, Copy, Clone, Default)]
pub struct Manipulator {
    compliant: bool,
}

impl Manipulator {
    pub fn new(compliant: bool) -> Self {
        Self { compliant }
    }

    /// Returns `true` if a new prefix was adopted.
    pub fn run<T>(&self, tester: &mut T, formula: &mut Formula) -> Result<bool>
    where
        T: Tester + ?Sized,
    {
        let original = formula.quantsets().to_vec();
        let mut cache = VerdictCache::new();

        for i in 0..original.len() {
            let prefix = swap(&original, i);
            if self.try_prefix(tester, formula, &mut cache, prefix)? {
                info!("swapped quantifier of set {}", i);
                return Ok(true);
            }
        }

        for (i, q) in original.iter().enumerate() {
            // single variable moves were covered by the swaps
            if q.vars.len() <= 1 {
                continue;
            }
            for j in 0..q.vars.len() {
                let mut directions = Vec::with_capacity(2);
                if i > 0 {
                    directions.push(Direction::Prev);
                }
                if i + 1 < original.len() {
                    directions.push(Direction::Next);
                }
                for direction in directions {
                    let prefix = shift(&original, i, j, direction);
                    if self.try_prefix(tester, formula, &mut cache, prefix)? {
                        info!("shifted variable {} of set {} ({:?})", q.vars[j], i, direction);
                        return Ok(true);
                    }
                }
            }
        }

        debug!("no quantifier manipulation succeeded ({} prefixes tested)", cache.len());
        Ok(false)
    }

    fn try_prefix<T>(
        &self,
        tester: &mut T,
        formula: &mut Formula,
        cache: &mut VerdictCache<Vec<PrefixToken>>,
        prefix: Vec<QuantSet>,
    ) -> Result<bool>
    where
        T: Tester + ?Sized,
    {
        let key = prefix_key(&prefix);
        if cache.get(&key).is_some() {
            return Ok(false);
        }

        let candidate = formula.with_quantsets(prefix);
        let verdict = {
            let Some(tested) = tested_form(&candidate, self.compliant) else {
                return Ok(false);
            };
            let verdict = tester.test(&tested)?;
            if verdict == Verdict::Failed {
                tester.persist(&tested)?;
            }
            verdict
        };
        cache.insert(key, verdict);

        if verdict == Verdict::Failed {
            *formula = candidate;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::testing::FnTester;
    use crate::types::Quantifier;

    #[test]
    fn test_swap_middle() {
        let prefix = vec![QuantSet::exists([4, 1]), QuantSet::forall([3]), QuantSet::exists([2])];
        assert_eq!(swap(&prefix, 1), vec![QuantSet::exists([1, 2, 3, 4])]);
    }

    #[test]
    fn test_swap_last() {
        let prefix = vec![QuantSet::forall([1]), QuantSet::exists([3]), QuantSet::forall([2])];
        assert_eq!(swap(&prefix, 2), vec![QuantSet::forall([1]), QuantSet::exists([2, 3])]);
    }

    #[test]
    fn test_swap_first() {
        let prefix = vec![QuantSet::exists([3]), QuantSet::forall([1, 2]), QuantSet::exists([4])];
        assert_eq!(swap(&prefix, 0), vec![QuantSet::forall([1, 2, 3]), QuantSet::exists([4])]);
    }

    #[test]
    fn test_swap_lone() {
        assert_eq!(swap(&[QuantSet::exists([2, 1])], 0), vec![QuantSet::forall([2, 1])]);
    }

    #[test]
    fn test_shift() {
        let prefix = vec![QuantSet::exists([1]), QuantSet::forall([2, 3]), QuantSet::exists([4])];
        assert_eq!(
            shift(&prefix, 1, 0, Direction::Prev),
            vec![QuantSet::exists([1, 2]), QuantSet::forall([3]), QuantSet::exists([4])]
        );
        assert_eq!(
            shift(&prefix, 1, 0, Direction::Next),
            vec![QuantSet::exists([1]), QuantSet::forall([3]), QuantSet::exists([4, 2])]
        );
    }

    #[test]
    #[should_panic(expected = "no Prev neighbour")]
    fn test_shift_without_neighbour() {
        shift(&[QuantSet::exists([1, 2])], 0, 0, Direction::Prev);
    }

    fn formula() -> Formula {
        Formula::from_dimacs(
            4,
            vec![QuantSet::exists([1]), QuantSet::forall([2, 3]), QuantSet::exists([4])],
            &[&[1, 2, 4], &[-3, 4], &[-1, -4]],
        )
    }

    #[test]
    fn test_swaps_before_shifts() {
        let mut f = formula();
        let mut tester = FnTester::new(|_: &Formula| false);
        let adopted = Manipulator::new(false).run(&mut tester, &mut f).unwrap();
        assert!(!adopted);
        assert_eq!(f, formula());

        let prefixes: Vec<Vec<QuantSet>> = tester.tested.iter().map(|t| t.quantsets().to_vec()).collect();
        assert_eq!(
            prefixes,
            vec![
                // swaps
                vec![QuantSet::forall([1, 2, 3]), QuantSet::exists([4])],
                vec![QuantSet::exists([1, 2, 3, 4])],
                vec![QuantSet::exists([1]), QuantSet::forall([2, 3, 4])],
                // shifts of set 1
                vec![QuantSet::exists([1, 2]), QuantSet::forall([3]), QuantSet::exists([4])],
                vec![QuantSet::exists([1]), QuantSet::forall([3]), QuantSet::exists([4, 2])],
                vec![QuantSet::exists([1, 3]), QuantSet::forall([2]), QuantSet::exists([4])],
                vec![QuantSet::exists([1]), QuantSet::forall([2]), QuantSet::exists([4, 3])],
            ]
        );
    }

    #[test]
    fn test_first_failure_is_adopted() {
        let mut f = formula();
        // fails once no universal variable is left
        let mut tester = FnTester::new(|t: &Formula| t.quantsets().iter().all(|q| !q.is_universal()));
        let adopted = Manipulator::new(false).run(&mut tester, &mut f).unwrap();
        assert!(adopted);
        assert_eq!(f.quantsets(), &[QuantSet::exists([1, 2, 3, 4])]);
        assert_eq!(tester.tested.len(), 2);
        assert_eq!(tester.persisted.len(), 1);
    }

    #[test]
    fn test_compliant_prefixes_are_normalized() {
        let mut f = formula();
        let mut tester = FnTester::new(|_: &Formula| false);
        Manipulator::new(true).run(&mut tester, &mut f).unwrap();
        for tested in tester.tested.iter() {
            assert_eq!(tested.check_compliance(), Ok(()));
        }
        // swapping the innermost set makes it universal, so it is eliminated
        // before the run
        let eliminated = Formula::from_dimacs(1, vec![QuantSet::exists([1])], &[&[1], &[-1]]);
        assert_eq!(tester.tested[2], eliminated);
        // shifted variables are sorted back into place
        assert_eq!(
            tester.tested[4].quantsets(),
            &[QuantSet::exists([1]), QuantSet::forall([3]), QuantSet::exists([2, 4])]
        );
    }

    #[test]
    fn test_compliant_skips_single_universal() {
        let mut f = Formula::from_dimacs(1, vec![QuantSet::exists([1])], &[&[1]]);
        let mut tester = FnTester::new(|_: &Formula| true);
        let adopted = Manipulator::new(true).run(&mut tester, &mut f).unwrap();
        assert!(!adopted);
        assert!(tester.tested.is_empty());

        let adopted = Manipulator::new(false).run(&mut tester, &mut f).unwrap();
        assert!(adopted);
        assert_eq!(f.quantsets()[0].quantifier, Quantifier::Forall);
    }
}
