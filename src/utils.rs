use std::collections::HashMap;
use std::hash::Hash;

/// Splits `items` into `n` contiguous parts of near-equal size.
///
/// The first `items.len() % n` parts receive one extra element, so the part
/// sizes never differ by more than one. Requires `1 <= n <= items.len()`.
pub fn split<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    assert!(n >= 1 && n <= items.len(), "Cannot split {} items into {} parts", items.len(), n);
    let size = items.len() / n;
    let extra = items.len() % n;
    let mut parts = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let end = start + size + usize::from(i < extra);
        parts.push(items[start..end].to_vec());
        start = end;
    }
    debug_assert_eq!(start, items.len());
    parts
}

/// Maps every element to the position of its first occurrence in `items`.
///
/// Equal elements share an id, so candidates that differ only in which copy of
/// a duplicate they keep get the same cache key.
pub fn first_occurrence_ids<T: Hash + Eq>(items: &[T]) -> Vec<usize> {
    let mut first: HashMap<&T, usize> = HashMap::with_capacity(items.len());
    items
        .iter()
        .enumerate()
        .map(|(i, item)| *first.entry(item).or_insert(i))
        .collect()
}

/// Returns `part` as a percentage of `whole` (`0` for an empty whole).
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
