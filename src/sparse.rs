//! Sparse index-set algebra for constraint row supports.
//!
//! A constraint row's sparse support is the set of DOF columns its Jacobian
//! can touch. When a row involves two independent kinematic chains (a
//! contact between two movable bodies, a two-body equality), the row's
//! support is the union of both chains' ascending, duplicate-free index
//! sets. These routines compute that union with a linear two-pointer merge.
//!
//! Inputs must be ascending and duplicate-free; that is a hard precondition
//! (checked with `debug_assert!`), not a recoverable condition — unsorted
//! input here means a structural bug upstream.

/// Check the merge precondition: strictly ascending, duplicate-free.
#[inline]
fn is_strictly_ascending(ind: &[usize]) -> bool {
    ind.windows(2).all(|w| w[0] < w[1])
}

/// Count the size of the union of two sorted index sets.
///
/// Equivalent to `|set(a) ∪ set(b)|`, O(`a.len()` + `b.len()`), allocation
/// free. Symmetric in its arguments.
#[must_use]
pub fn combine_sparse_count(a: &[usize], b: &[usize]) -> usize {
    debug_assert!(is_strictly_ascending(a), "unsorted/duplicate indices in a");
    debug_assert!(is_strictly_ascending(b), "unsorted/duplicate indices in b");

    let mut i = 0;
    let mut j = 0;
    let mut count = 0;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
        count += 1;
    }
    count + (a.len() - i) + (b.len() - j)
}

/// Merge two sorted index sets into `merged`, recording where each input
/// element lands.
///
/// Writes the ascending union into `merged` and, for every element of `a`
/// (resp. `b`), its position in the merged set into `pos_a` (resp. `pos_b`),
/// so callers can scatter row values from both fragments without searching.
/// Returns the union size.
///
/// `merged` must be caller-allocated with `len >= a.len() + b.len()` (the
/// safe upper bound); `pos_a`/`pos_b` must hold at least `a.len()` /
/// `b.len()` entries. Only the returned prefix of `merged` is meaningful.
///
/// # Panics
/// Panics if the output buffers are too small.
pub fn combine_sparse(
    a: &[usize],
    b: &[usize],
    merged: &mut [usize],
    pos_a: &mut [usize],
    pos_b: &mut [usize],
) -> usize {
    debug_assert!(is_strictly_ascending(a), "unsorted/duplicate indices in a");
    debug_assert!(is_strictly_ascending(b), "unsorted/duplicate indices in b");
    assert!(pos_a.len() >= a.len(), "pos_a buffer too small");
    assert!(pos_b.len() >= b.len(), "pos_b buffer too small");

    let mut i = 0;
    let mut j = 0;
    let mut n = 0;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                merged[n] = a[i];
                pos_a[i] = n;
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged[n] = b[j];
                pos_b[j] = n;
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged[n] = a[i];
                pos_a[i] = n;
                pos_b[j] = n;
                i += 1;
                j += 1;
            }
        }
        n += 1;
    }
    while i < a.len() {
        merged[n] = a[i];
        pos_a[i] = n;
        i += 1;
        n += 1;
    }
    while j < b.len() {
        merged[n] = b[j];
        pos_b[j] = n;
        j += 1;
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn union_count_concrete_cases() {
        let cases: &[(&[usize], &[usize], usize)] = &[
            (&[0, 1], &[2], 3),
            (&[2], &[0, 1], 3),
            (&[0, 1], &[2, 3, 4], 5),
            (&[5, 6], &[1, 3, 8], 5),
            (&[1, 2, 3], &[0, 4], 5),
            (&[1, 4], &[2, 3], 4),
            (&[0, 1, 3], &[0, 3, 4], 4),
            (&[1, 3, 5, 6], &[1, 3, 5, 6], 4),
            (&[], &[], 0),
            (&[], &[1, 2], 2),
            (&[0], &[], 1),
        ];
        for &(a, b, expected) in cases {
            assert_eq!(combine_sparse_count(a, b), expected, "a={a:?} b={b:?}");
            // Union is symmetric.
            assert_eq!(combine_sparse_count(b, a), expected, "b={b:?} a={a:?}");
        }
    }

    #[test]
    fn combine_produces_merged_set_and_positions() {
        let a = [0, 2, 5];
        let b = [1, 2, 7];
        let mut merged = [0usize; 6];
        let mut pos_a = [0usize; 3];
        let mut pos_b = [0usize; 3];
        let n = combine_sparse(&a, &b, &mut merged, &mut pos_a, &mut pos_b);

        assert_eq!(n, 5);
        assert_eq!(&merged[..n], &[0, 1, 2, 5, 7]);
        for (k, &idx) in a.iter().enumerate() {
            assert_eq!(merged[pos_a[k]], idx);
        }
        for (k, &idx) in b.iter().enumerate() {
            assert_eq!(merged[pos_b[k]], idx);
        }
        // The shared index 2 maps both inputs to the same slot.
        assert_eq!(pos_a[1], pos_b[1]);
    }

    #[test]
    fn combine_with_one_empty_side_copies_the_other() {
        let b = [3, 4, 9];
        let mut merged = [0usize; 3];
        let mut pos_b = [0usize; 3];
        let n = combine_sparse(&[], &b, &mut merged, &mut [], &mut pos_b);
        assert_eq!(n, 3);
        assert_eq!(&merged[..n], &b);
        assert_eq!(pos_b, [0, 1, 2]);
    }

    /// Scatter check: values from two fragments land in the merged row at
    /// the reported positions, summing on shared columns.
    #[test]
    fn combine_positions_support_scatter() {
        let a = [0, 3];
        let b = [3, 5];
        let va = [1.0, 2.0];
        let vb = [10.0, 20.0];
        let mut merged = [0usize; 4];
        let mut pos_a = [0usize; 2];
        let mut pos_b = [0usize; 2];
        let n = combine_sparse(&a, &b, &mut merged, &mut pos_a, &mut pos_b);

        let mut row = vec![0.0; n];
        for k in 0..a.len() {
            row[pos_a[k]] += va[k];
        }
        for k in 0..b.len() {
            row[pos_b[k]] += vb[k];
        }
        assert_eq!(&merged[..n], &[0, 3, 5]);
        assert_eq!(row, vec![1.0, 12.0, 20.0]);
    }

    fn sorted_unique_vec() -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::btree_set(0usize..64, 0..12)
            .prop_map(|s| s.into_iter().collect())
    }

    proptest! {
        #[test]
        fn union_count_matches_set_oracle(a in sorted_unique_vec(), b in sorted_unique_vec()) {
            let oracle: BTreeSet<usize> =
                a.iter().chain(b.iter()).copied().collect();
            prop_assert_eq!(combine_sparse_count(&a, &b), oracle.len());
            prop_assert_eq!(combine_sparse_count(&b, &a), oracle.len());

            let mut merged = vec![0usize; a.len() + b.len()];
            let mut pos_a = vec![0usize; a.len()];
            let mut pos_b = vec![0usize; b.len()];
            let n = combine_sparse(&a, &b, &mut merged, &mut pos_a, &mut pos_b);
            prop_assert_eq!(n, oracle.len());
            let expected: Vec<usize> = oracle.into_iter().collect();
            prop_assert_eq!(&merged[..n], &expected[..]);
        }
    }
}
