//! # qbfdd: delta debugging for QBF solvers
//!
//! **`qbfdd`** shrinks a quantified Boolean formula in QDIMACS format while an
//! external solver keeps failing on it the same way. The result is a locally
//! 1-minimal failure-inducing formula: removing any single clause or literal
//! makes the failure disappear.
//!
//! ## How it works
//!
//! A session alternates three kinds of steps until none of them succeeds:
//!
//! 1. **Clause reduction**: the clause list is minimized with one of the
//!    [`Mode`][crate::reduce::Mode]s (ddmin and variants, or one by one).
//! 2. **Clause minimization**: the literals of each clause are minimized in
//!    the same way.
//! 3. **Quantifier manipulation** (optional): quantifier sets are swapped and
//!    variables shifted between neighbouring sets.
//!
//! Each candidate is written to a working file and handed to the solver. The
//! [`Oracle`][crate::oracle::Oracle] compares the outcome with the solver's
//! behaviour on the original input. Candidates that still fail are adopted and
//! written to the output file right away, so an interrupted session keeps its
//! best result.
//!
//! By default, every candidate is made QDIMACS compliant before it is tested
//! (see [`normalize`][crate::normalize]), so solvers with a strict parser see
//! well-formed input only.
//!
//! ## Usage
//!
//! ```no_run
//! use qbfdd::driver::Session;
//! use qbfdd::options::Options;
//! use qbfdd::reduce::Mode;
//!
//! let mut options = Options::new("bug.qdimacs", "depqbf --dep-man=simple");
//! options.fail_code = Some(-11);
//! options.mode = Mode::Qobo;
//!
//! let summary = Session::new(options)?.run()?;
//! println!("{}", summary);
//! # Ok::<(), qbfdd::error::Error>(())
//! ```
//!
//! The engine itself only talks to the [`Tester`][crate::oracle::Tester]
//! trait, so it can also be driven by an in-memory predicate:
//!
//! ```
//! use qbfdd::driver::Minimizer;
//! use qbfdd::error::Result;
//! use qbfdd::formula::Formula;
//! use qbfdd::options::Granularity;
//! use qbfdd::oracle::{Tester, Verdict};
//! use qbfdd::reduce::Mode;
//! use qbfdd::types::QuantSet;
//!
//! struct NeedsUnitClause;
//!
//! impl Tester for NeedsUnitClause {
//!     fn test(&mut self, candidate: &Formula) -> Result<Verdict> {
//!         let unit = candidate.clauses().iter().any(|c| c.len() == 1);
//!         Ok(if unit { Verdict::Failed } else { Verdict::Passed })
//!     }
//!
//!     fn persist(&mut self, _: &Formula) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut formula = Formula::from_dimacs(
//!     3,
//!     vec![QuantSet::exists([1, 2, 3])],
//!     &[&[1, 2], &[-1, 3], &[-2, -3], &[1]],
//! );
//! Minimizer::new(Mode::Ddmin, Granularity::Both, false, true)
//!     .minimize(&mut NeedsUnitClause, &mut formula)?;
//! assert_eq!(formula.num_clauses(), 1);
//! # Ok::<(), qbfdd::error::Error>(())
//! ```

pub mod cache;
pub mod driver;
pub mod error;
pub mod formula;
pub mod normalize;
pub mod options;
pub mod oracle;
pub mod parser;
pub mod quantifier;
pub mod reduce;
pub mod types;
pub mod utils;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;
