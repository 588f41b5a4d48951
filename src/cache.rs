//! Verdict memoization for the reduction engine and the quantifier manipulator.
//!
//! A cache lives for exactly one engine (or manipulator) call. Keys identify a
//! candidate by which elements of the call's initial superset survive, in
//! order: two permutations of the same index set are distinct keys.

use std::collections::HashMap;
use std::hash::Hash;

use crate::oracle::Verdict;
use crate::types::{QuantSet, Quantifier, Var};

/// A cache backed by [HashMap], with hit/miss statistics.
pub struct VerdictCache<K> {
    map: HashMap<K, Verdict>,
    hits: usize,
    misses: usize,
}

impl<K> Default for VerdictCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> VerdictCache<K> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }
}

impl<K> VerdictCache<K>
where
    K: Hash + Eq,
{
    /// Looks up a key in the cache.
    pub fn get(&mut self, key: &K) -> Option<Verdict> {
        match self.map.get(key) {
            Some(&v) => {
                self.hits += 1;
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, verdict: Verdict) {
        self.map.insert(key, verdict);
    }
}

/// One item of a linearized quantifier prefix.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrefixToken {
    Tag(Quantifier),
    Var(Var),
}

/// Linearizes a prefix into `Tag, Var, Var, ..., Tag, Var, ...`.
pub fn prefix_key(quantsets: &[QuantSet]) -> Vec<PrefixToken> {
    let mut key = Vec::with_capacity(quantsets.iter().map(|q| q.vars.len() + 1).sum());
    for q in quantsets.iter() {
        key.push(PrefixToken::Tag(q.quantifier));
        key.extend(q.vars.iter().map(|&v| PrefixToken::Var(v)));
    }
    key
}
