/*
 * @file tvalue.rs
 *
 * Quality parameter (t-value) of a digital net in base 2, computed by
 * progressive row reduction over an enumeration of row multisets.
 *
 * For k rows split between the generating matrices according to a
 * composition (a_1, ..., a_s), the net resolves k digits iff those rows
 * are independent; the engine walks all compositions of k in
 * single-swap order so that each step costs one replace_row, and tracks
 * the worst (largest) column count needed for full rank.
 */

use crate::composition::CompositionMaker;
use crate::error::{Error, Result};
use crate::gf2::{GF2Matrix, ProgressiveRowReducer};
use std::collections::HashMap;

/** Cooperative cancellation hook; checked once per composition step. */
pub type CancelCheck<'a> = Option<&'a dyn Fn() -> bool>;

fn cancelled(cancel: CancelCheck) -> bool {
    cancel.map_or(false, |f| f())
}

/** Worst smallest-full-rank column index over all compositions of k
 * rows into the s matrices, 0-based; `n_cols` signals that some
 * composition is rank-deficient even on all columns.
 *
 * The reducer is seeded with the first k-s+1 rows of the last matrix
 * and the first row of every other matrix, i.e. the composition
 * (k-s+1, 1, ..., 1); each subsequent composition costs one
 * replace_row.
 */
fn iteration_on_k(mats: &[&GF2Matrix], k: usize, cancel: CancelCheck) -> Result<usize> {
    let n_cols = mats[0].cols();
    let s = mats.len();
    debug_assert!(s >= 2 && k >= s);

    // map from (part, unit) of the current composition to reducer row
    let mut origin_to_row: HashMap<(usize, usize), usize> = HashMap::new();
    let mut reducer = ProgressiveRowReducer::new(n_cols);

    for i in 0..k - s + 1 {
        origin_to_row.insert((1, i + 1), i);
        reducer.add_row(&mats[s - 1].sub(i, 0, 1, n_cols));
    }
    for i in 1..s {
        origin_to_row.insert((i + 1, 1), k - s + i);
        reducer.add_row(&mats[s - 1 - i].sub(0, 0, 1, n_cols));
    }

    let mut worst = reducer.smallest_full_rank() - 1;
    if worst == n_cols {
        return Ok(n_cols);
    }

    let mut maker = CompositionMaker::new(k, s);
    while maker.advance() {
        if cancelled(cancel) {
            return Err(Error::Aborted);
        }
        let (from, to) = maker.delta();
        let row = origin_to_row
            .remove(&from)
            .expect("composition delta names an absent row");
        origin_to_row.insert(to, row);

        let new_row = mats[s - to.0].sub(to.1 - 1, 0, 1, n_cols);
        reducer.replace_row(row, &new_row);

        worst = worst.max(reducer.smallest_full_rank() - 1);
        if worst == n_cols {
            return Ok(n_cols);
        }
    }
    Ok(worst)
}

/** t-value of a single (unilevel) digital net given by its generating
 * matrices.  `max_sub_proj` is a known lower bound on the result
 * (e.g. the worst t-value of the sub-projections); pass 0 when none is
 * available.  A one-matrix net has t = 0 by definition.
 */
pub fn t_value(mats: &[&GF2Matrix], max_sub_proj: usize, cancel: CancelCheck) -> Result<usize> {
    if mats.len() == 1 {
        return Ok(0);
    }
    let n_cols = mats[0].cols();
    Ok(t_value_sequence(mats, n_cols - 1, &[max_sub_proj], cancel)?[0])
}

/** Per-level t-values of an embedded (multilevel) net, for levels
 * m_min+1 ..= n_cols, starting from the lower-bound vector
 * `max_sub_proj` (one entry per level).
 *
 * Iterates k from high to low; each k that is full-rank within some
 * column prefix tightens the levels at or above that prefix to
 * t(level) = level - k, and the loop stops once the prefix reaches
 * m_min (no further level can improve).
 */
pub fn t_value_sequence(
    mats: &[&GF2Matrix],
    m_min: usize,
    max_sub_proj: &[usize],
    cancel: CancelCheck,
) -> Result<Vec<usize>> {
    let n_rows = mats[0].rows();
    let n_cols = mats[0].cols();
    let s = mats.len();
    let mut n_level = max_sub_proj.len();
    debug_assert!(mats.iter().all(|m| m.rows() == n_rows && m.cols() == n_cols));
    debug_assert!(n_level <= n_cols - m_min);

    if s == 1 {
        // t per level from pivot positions: a pivot at (r, c) uses one
        // column of every level > max(r, c)
        let mut reducer = ProgressiveRowReducer::new(n_cols);
        for r in 0..n_rows {
            reducer.add_row(&mats[0].sub(r, 0, 1, n_cols));
        }
        let mut count_pivot = vec![0usize; n_cols];
        for (r, c) in reducer.pivots() {
            let m = r.max(c);
            if m < n_cols {
                count_pivot[m] += 1;
            }
        }
        let mut count = 0;
        for c in 0..m_min {
            count += count_pivot[c];
        }
        let mut res = Vec::with_capacity(n_cols - m_min);
        for c in m_min..n_cols {
            count += count_pivot[c];
            res.push(c + 1 - count);
        }
        return Ok(res);
    }

    let mut result = max_sub_proj.to_vec();
    let mut m_min = m_min;
    let mut diff = 0;
    if m_min < s - 1 {
        // levels below s-1 digits can never be full rank with s matrices
        diff = s - 1 - m_min;
        if n_level <= diff {
            return Ok(result);
        }
        n_level -= diff;
        m_min = s - 1;
    }
    for i in 0..n_level {
        let level = n_cols - (n_level - 1 - i);
        result[i + diff] = (level + 1 - s).max(max_sub_proj[i + diff]);
    }

    let mut previous_ind = n_level;
    let mut k = n_rows.saturating_sub(*max_sub_proj.last().unwrap());
    while k >= s {
        let idx = iteration_on_k(mats, k, cancel)?;
        if idx != n_cols {
            let i_lo = idx.saturating_sub(m_min);
            for i in i_lo..previous_ind {
                let level = n_cols - (n_level - 1 - i);
                result[i + diff] = (level - k).max(max_sub_proj[i + diff]);
            }
            if idx <= m_min {
                break;
            }
            previous_ind = idx - m_min;
        }
        k -= 1;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::{t_value, t_value_sequence};
    use crate::gf2::GF2Matrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rank_of(rows: &[u64], cols: usize) -> usize {
        let mut m = rows.to_vec();
        let mut rank = 0;
        for c in 0..cols {
            if let Some(p) = (rank..m.len()).find(|&r| m[r] >> c & 1 != 0) {
                m.swap(rank, p);
                for r in 0..m.len() {
                    if r != rank && m[r] >> c & 1 != 0 {
                        m[r] ^= m[rank];
                    }
                }
                rank += 1;
            }
        }
        rank
    }

    /** Brute-force t-value oracle: largest k such that every selection
     * of first-rows summing to k is independent.
     */
    fn naive_t_value(mats: &[&GF2Matrix], cols: usize) -> usize {
        fn all_compositions(k: usize, s: usize) -> Vec<Vec<usize>> {
            if s == 1 {
                return vec![vec![k]];
            }
            let mut out = Vec::new();
            for a in 1..=k - s + 1 {
                for mut rest in all_compositions(k - a, s - 1) {
                    rest.insert(0, a);
                    out.push(rest);
                }
            }
            out
        }
        let s = mats.len();
        if s == 1 {
            return 0;
        }
        let mut best = s - 1; // vacuously full rank
        for k in s..=cols {
            let ok = all_compositions(k, s).into_iter().all(|comp| {
                let mut rows = Vec::new();
                for (part, &a) in comp.iter().enumerate() {
                    // part i of the composition draws from matrix s-1-i
                    let mat = mats[s - 1 - part];
                    for r in 0..a {
                        let mut bits = 0u64;
                        for c in 0..cols {
                            bits |= (mat.get(r, c) as u64) << c;
                        }
                        rows.push(bits);
                    }
                }
                rank_of(&rows, cols) == k
            });
            if ok {
                best = k;
            } else {
                break;
            }
        }
        cols - best
    }

    #[test]
    fn test_identity_and_ones() {
        // M1 = I3, M2 = all ones: full rank first achieved at k = 2
        let id = GF2Matrix::identity(3);
        let mut ones = GF2Matrix::new(3, 3);
        for r in 0..3 {
            for c in 0..3 {
                ones.set(r, c, true);
            }
        }
        let t = t_value(&[&id, &ones], 0, None).unwrap();
        assert_eq!(t, 1);
    }

    #[test]
    fn test_single_matrix_is_zero() {
        let id = GF2Matrix::identity(4);
        assert_eq!(t_value(&[&id], 0, None).unwrap(), 0);
    }

    #[test]
    fn test_matches_naive_oracle() {
        let mut rng = StdRng::seed_from_u64(41);
        for _ in 0..60 {
            let m = rng.gen_range(2..=6);
            let s = rng.gen_range(2..=3);
            let mats: Vec<GF2Matrix> = (0..s)
                .map(|_| {
                    let rows: Vec<u64> =
                        (0..m).map(|_| rng.gen::<u64>() & ((1 << m) - 1)).collect();
                    GF2Matrix::from_row_ints(&rows, m)
                })
                .collect();
            let refs: Vec<&GF2Matrix> = mats.iter().collect();
            let fast = t_value(&refs, 0, None).unwrap();
            let naive = naive_t_value(&refs, m);
            assert_eq!(fast, naive, "matrices: {:?}", mats);
        }
    }

    #[test]
    fn test_cancel_aborts_between_compositions() {
        // the seed composition (3, 1) is already full rank, so the
        // enumeration proceeds and hits the cancellation hook
        let m1 = GF2Matrix::identity(4);
        let m2 = GF2Matrix::from_row_ints(&[0b0010, 0b0100, 0b1000, 0b0001], 4);
        let cancel = || true;
        assert!(matches!(
            t_value(&[&m1, &m2], 0, Some(&cancel)),
            Err(crate::error::Error::Aborted)
        ));
    }

    #[test]
    fn test_sequence_monotonicity() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..40 {
            let m = rng.gen_range(3..=7);
            let s = rng.gen_range(1..=3);
            let m_min = rng.gen_range(0..m);
            let mats: Vec<GF2Matrix> = (0..s)
                .map(|_| {
                    let rows: Vec<u64> =
                        (0..m).map(|_| rng.gen::<u64>() & ((1 << m) - 1)).collect();
                    GF2Matrix::from_row_ints(&rows, m)
                })
                .collect();
            let refs: Vec<&GF2Matrix> = mats.iter().collect();
            let bounds = vec![0; m - m_min];
            let seq = t_value_sequence(&refs, m_min, &bounds, None).unwrap();
            assert_eq!(seq.len(), m - m_min);
            for (i, &t) in seq.iter().enumerate() {
                let level = m_min + 1 + i;
                assert!(t <= level, "t exceeds level");
                if i > 0 {
                    assert!(t <= seq[i - 1] + 1, "t grows by more than one per level");
                }
            }
        }
    }

    #[test]
    fn test_sequence_last_level_matches_unilevel() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..40 {
            let m = rng.gen_range(2..=6);
            let s = rng.gen_range(2..=3);
            let mats: Vec<GF2Matrix> = (0..s)
                .map(|_| {
                    let rows: Vec<u64> =
                        (0..m).map(|_| rng.gen::<u64>() & ((1 << m) - 1)).collect();
                    GF2Matrix::from_row_ints(&rows, m)
                })
                .collect();
            let refs: Vec<&GF2Matrix> = mats.iter().collect();
            let uni = t_value(&refs, 0, None).unwrap();
            let bounds = vec![0; m.min(2)];
            let seq = t_value_sequence(&refs, m - bounds.len(), &bounds, None).unwrap();
            assert_eq!(*seq.last().unwrap(), uni);
        }
    }
}
