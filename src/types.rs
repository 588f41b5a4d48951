//! Type-safe wrappers for QDIMACS variables, literals and quantifier prefixes.
//!
//! Variables are 1-indexed, exactly as they appear in the input file. A literal
//! is a signed variable id, so the DIMACS integer `-3` is the negative literal of
//! variable `3`.

use std::fmt;
use std::ops::Neg;

/// A variable identifier (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1 (0 terminates lines in QDIMACS)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the variable ID as an index into per-variable tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn pos(self) -> Lit {
        Lit(self.0 as i32)
    }

    pub fn neg(self) -> Lit {
        Lit(-(self.0 as i32))
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A literal: a variable together with its polarity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Creates a literal from its DIMACS integer representation.
    ///
    /// # Panics
    ///
    /// Panics if `value == 0`.
    pub fn from_dimacs(value: i32) -> Self {
        assert_ne!(value, 0, "Literal must be non-zero");
        Lit(value)
    }

    pub fn to_dimacs(self) -> i32 {
        self.0
    }

    pub fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    pub fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// Returns the literal of `var` with the same polarity as `self`.
    pub fn with_var(self, var: Var) -> Self {
        if self.is_negated() {
            var.neg()
        } else {
            var.pos()
        }
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(-self.0)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Clause = Vec<Lit>;

/// Quantifier binding a set of variables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Quantifier {
    Exists,
    Forall,
}

impl Quantifier {
    /// Returns the QDIMACS tag (`e` or `a`).
    pub fn tag(self) -> char {
        match self {
            Quantifier::Exists => 'e',
            Quantifier::Forall => 'a',
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "e" => Some(Quantifier::Exists),
            "a" => Some(Quantifier::Forall),
            _ => None,
        }
    }

    /// Returns the dual quantifier.
    pub fn flip(self) -> Self {
        match self {
            Quantifier::Exists => Quantifier::Forall,
            Quantifier::Forall => Quantifier::Exists,
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One block of the quantifier prefix.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct QuantSet {
    pub quantifier: Quantifier,
    pub vars: Vec<Var>,
}

impl QuantSet {
    pub fn new(quantifier: Quantifier, vars: Vec<Var>) -> Self {
        Self { quantifier, vars }
    }

    pub fn exists<I: IntoIterator<Item = u32>>(vars: I) -> Self {
        Self::new(Quantifier::Exists, vars.into_iter().map(Var::new).collect())
    }

    pub fn forall<I: IntoIterator<Item = u32>>(vars: I) -> Self {
        Self::new(Quantifier::Forall, vars.into_iter().map(Var::new).collect())
    }

    pub fn is_universal(&self) -> bool {
        self.quantifier == Quantifier::Forall
    }
}

/// Returns `true` if the prefix consists of exactly one universal block.
///
/// Such a prefix cannot be made QDIMACS compliant: eliminating the innermost
/// universal block would leave no variables at all.
pub fn is_single_universal(quantsets: &[QuantSet]) -> bool {
    matches!(quantsets, [q] if q.is_universal())
}
