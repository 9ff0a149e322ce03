/*
 * @file reducer.rs
 *
 * Progressive row reduction over GF(2).
 *
 * The reducer maintains an online reduced row-echelon form of the rows
 * fed to it, together with the row-operations matrix relating the
 * reduced rows back to the original ones.  Its hot path is
 * `replace_row`, which swaps a single original row and restores reduced
 * form in sub-cubic time; the t-value engine calls it once per
 * composition.
 */

use crate::gf2::bitset::BitSet;
use crate::gf2::matrix::GF2Matrix;

/** Online reduced row-echelon form of an R x C bit matrix.
 *
 * Invariants, after every public operation:
 * - `reduced` is in reduced row-echelon form;
 * - for every recorded pivot (r, c), `reduced[r][c] = 1` and
 *   `reduced[r'][c] = 0` for `r' != r`;
 * - the number of pivots plus the number of pivot-free rows equals the
 *   number of rows;
 * - `ops * original = reduced`, where `original` holds the rows as fed
 *   in (with `replace_row` substitutions applied).
 */
#[derive(Clone)]
pub struct ProgressiveRowReducer {
    n_rows: usize,
    n_cols: usize,
    reduced: GF2Matrix,
    ops: GF2Matrix,
    pivot_by_row: Vec<Option<usize>>,
    pivot_by_col: Vec<Option<usize>>,
    cols_without_pivot: BitSet,
    rows_without_pivot: Vec<usize>,
    smallest_full_rank: usize,
}

impl ProgressiveRowReducer {
    /** Create an empty reducer over `n_cols` columns. */
    pub fn new(n_cols: usize) -> Self {
        ProgressiveRowReducer {
            n_rows: 0,
            n_cols,
            reduced: GF2Matrix::new(0, n_cols),
            ops: GF2Matrix::new(0, 0),
            pivot_by_row: Vec::new(),
            pivot_by_col: vec![None; n_cols],
            cols_without_pivot: BitSet::full(n_cols),
            rows_without_pivot: Vec::new(),
            smallest_full_rank: 0,
        }
    }

    /** Clear the reducer and set the number of columns to `n_cols`. */
    pub fn reset(&mut self, n_cols: usize) {
        *self = ProgressiveRowReducer::new(n_cols);
    }

    /** Number of rows fed in so far. */
    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    /** Number of columns. */
    pub fn num_cols(&self) -> usize {
        self.n_cols
    }

    /** Rank of the matrix. */
    pub fn rank(&self) -> usize {
        self.n_rows - self.rows_without_pivot.len()
    }

    /** The current reduced matrix. */
    pub fn reduced_matrix(&self) -> &GF2Matrix {
        &self.reduced
    }

    /** The row-operations matrix: `ops * original = reduced`. */
    pub fn row_operations(&self) -> &GF2Matrix {
        &self.ops
    }

    /** Pivot positions as (row, column) pairs. */
    pub fn pivots(&self) -> Vec<(usize, usize)> {
        self.pivot_by_row
            .iter()
            .enumerate()
            .filter_map(|(r, c)| c.map(|c| (r, c)))
            .collect()
    }

    /** Minimal number of columns such that the first columns span the
     * full row rank, i.e. the least c with min(R, C) pivots among the
     * first c columns.  Equals `num_cols() + 1` if the rank never
     * reaches min(R, C).
     */
    pub fn smallest_full_rank(&self) -> usize {
        self.smallest_full_rank
    }

    /** For c = first_col, ..., first_col + n - 1, the rank of the
     * submatrix made of the first c + 1 columns.
     */
    pub fn compute_ranks(&self, first_col: usize, n: usize) -> Vec<usize> {
        assert!(first_col + n <= self.n_cols);
        let mut count = 0;
        for c in 0..first_col {
            count += self.pivot_by_col[c].is_some() as usize;
        }
        let mut res = Vec::with_capacity(n);
        for c in first_col..first_col + n {
            count += self.pivot_by_col[c].is_some() as usize;
            res.push(count);
        }
        res
    }

    /** Whether a matrix is square and invertible. */
    pub fn check_invertible(matrix: &GF2Matrix) -> bool {
        if matrix.rows() != matrix.cols() {
            return false;
        }
        let mut red = ProgressiveRowReducer::new(matrix.cols());
        for r in 0..matrix.rows() {
            red.add_row(&matrix.sub(r, 0, 1, matrix.cols()));
        }
        red.rank() == matrix.rows()
    }

    /** Stack one new row below and restore reduced form. */
    pub fn add_row(&mut self, new_row: &GF2Matrix) {
        assert!(new_row.rows() == 1 && new_row.cols() == self.n_cols);
        let r = self.n_rows;
        self.reduced.push_empty_row();
        self.reduced.set_row(r, new_row);
        self.ops.push_empty_col();
        self.ops.push_empty_row();
        self.ops.set(r, r, true);
        self.pivot_by_row.push(None);
        self.n_rows += 1;

        self.reduce_row_against_pivots(r);
        if let Some(c) = self.find_pivot_column(r) {
            self.install_pivot(r, c);
        } else {
            self.rows_without_pivot.push(r);
        }
        self.update_smallest_full_rank();
    }

    /** Append a column on the right; `new_col` holds one bit per
     * original row.  The reduced matrix gains `ops * new_col`, and the
     * first pivot-free row with a 1 in the new column is promoted.
     */
    pub fn add_column(&mut self, new_col: &GF2Matrix) {
        assert!(new_col.cols() == 1 && new_col.rows() == self.n_rows);
        let c = self.n_cols;
        self.reduced.push_empty_col();
        self.pivot_by_col.push(None);
        self.n_cols += 1;
        self.cols_without_pivot.insert(c);
        for r in 0..self.n_rows {
            if self.ops.row_dot_col(r, new_col) {
                self.reduced.set(r, c, true);
            }
        }
        if let Some(&r) = self
            .rows_without_pivot
            .iter()
            .find(|&&r| self.reduced.get(r, c))
        {
            self.rows_without_pivot.retain(|&x| x != r);
            self.install_pivot(r, c);
        }
        self.update_smallest_full_rank();
    }

    /** Replace the original row in slot `index` by `new_row` and
     * restore reduced form.
     *
     * The hot path of the t-value engine.  The rows whose reduced form
     * depends on the replaced original are first rewritten through the
     * one row kept as the slot's definition, so that the substitution
     * touches a single reduced row; that row is then re-reduced, a new
     * pivot is sought among the pivot-free columns in order, and any
     * pivot-free row exposed by the vacated column is promoted.
     */
    pub fn replace_row(&mut self, index: usize, new_row: &GF2Matrix) {
        assert!(index < self.n_rows);
        assert!(new_row.rows() == 1 && new_row.cols() == self.n_cols);

        // rows whose combination uses the original slot `index`
        let refs: Vec<usize> = (0..self.n_rows)
            .filter(|&r| self.ops.get(r, index))
            .collect();
        assert!(!refs.is_empty(), "row operations matrix lost invertibility");
        let r0 = if self.ops.get(index, index) {
            index
        } else {
            refs[0]
        };
        for &r in &refs {
            if r != r0 {
                self.row_xor_pair(r, r0);
            }
        }

        // release the definitional row's pivot (its column is vacated)
        if let Some(c0) = self.pivot_by_row[r0] {
            self.pivot_by_row[r0] = None;
            self.pivot_by_col[c0] = None;
            self.cols_without_pivot.insert(c0);
        } else {
            self.rows_without_pivot.retain(|&r| r != r0);
        }

        // substitute and re-reduce
        self.reduced.set_row(r0, new_row);
        self.ops.clear_row(r0);
        self.ops.set(r0, index, true);
        self.reduce_row_against_pivots(r0);
        if let Some(c) = self.find_pivot_column(r0) {
            self.install_pivot(r0, c);
        } else {
            self.rows_without_pivot.push(r0);
        }

        self.promote_pivotless();
        self.update_smallest_full_rank();
    }

    /** XOR row `src` into row `dst` of both `reduced` and `ops`. */
    fn row_xor_pair(&mut self, dst: usize, src: usize) {
        self.reduced.row_xor(dst, src);
        self.ops.row_xor(dst, src);
    }

    /** Clear every pivot column of row `r`. */
    fn reduce_row_against_pivots(&mut self, r: usize) {
        for c in 0..self.n_cols {
            if let Some(pr) = self.pivot_by_col[c] {
                if pr != r && self.reduced.get(r, c) {
                    self.row_xor_pair(r, pr);
                }
            }
        }
    }

    /** Record the pivot (r, c) and clear column c from all other rows. */
    fn install_pivot(&mut self, r: usize, c: usize) {
        debug_assert!(self.cols_without_pivot.contains(c));
        debug_assert!(self.reduced.get(r, c));
        self.pivot_by_row[r] = Some(c);
        self.pivot_by_col[c] = Some(r);
        self.cols_without_pivot.remove(c);
        for r2 in 0..self.n_rows {
            if r2 != r && self.reduced.get(r2, c) {
                self.row_xor_pair(r2, r);
            }
        }
    }

    /** First pivot-free column holding a 1 in row `r`, walking the
     * pivot-free columns in increasing order.  A reduced row is zero on
     * every pivot column, so this finds its leading 1 if any.
     */
    fn find_pivot_column(&self, r: usize) -> Option<usize> {
        self.cols_without_pivot
            .ascending()
            .find(|&c| self.reduced.get(r, c))
    }

    /** Promote pivot-free rows that became nonzero in vacated columns. */
    fn promote_pivotless(&mut self) {
        loop {
            let found = self
                .rows_without_pivot
                .iter()
                .enumerate()
                .find_map(|(idx, &r)| self.find_pivot_column(r).map(|c| (idx, r, c)));
            match found {
                Some((idx, r, c)) => {
                    self.rows_without_pivot.remove(idx);
                    self.install_pivot(r, c);
                }
                None => break,
            }
        }
    }

    /** O(R + C) maintenance of the smallest-full-rank column count. */
    fn update_smallest_full_rank(&mut self) {
        let target = self.n_rows.min(self.n_cols);
        if target == 0 {
            self.smallest_full_rank = 0;
            return;
        }
        if self.rank() < target {
            self.smallest_full_rank = self.n_cols + 1;
            return;
        }
        let mut count = 0;
        for c in 0..self.n_cols {
            if self.pivot_by_col[c].is_some() {
                count += 1;
                if count == target {
                    self.smallest_full_rank = c + 1;
                    return;
                }
            }
        }
        unreachable!("rank reached min(R, C) but pivots did not");
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressiveRowReducer;
    use crate::gf2::matrix::GF2Matrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn one_row(bits: u64, cols: usize) -> GF2Matrix {
        GF2Matrix::from_row_ints(&[bits], cols)
    }

    /** Independent from-scratch RREF on integer rows, for cross-checks. */
    fn naive_rref(rows: &[u64], cols: usize) -> (usize, Vec<u64>) {
        let mut m: Vec<u64> = rows.to_vec();
        let mut rank = 0;
        for c in 0..cols {
            let Some(p) = (rank..m.len()).find(|&r| m[r] >> c & 1 != 0) else {
                continue;
            };
            m.swap(rank, p);
            for r in 0..m.len() {
                if r != rank && m[r] >> c & 1 != 0 {
                    m[r] ^= m[rank];
                }
            }
            rank += 1;
        }
        (rank, m)
    }

    fn check_invariants(red: &ProgressiveRowReducer, originals: &[u64]) {
        let reduced = red.reduced_matrix();
        let ops = red.row_operations();
        let pivots = red.pivots();
        // pivot columns are pure
        for &(r, c) in &pivots {
            assert!(reduced.get(r, c));
            for r2 in 0..red.num_rows() {
                assert!(r2 == r || !reduced.get(r2, c));
            }
        }
        // rank accounting
        assert_eq!(pivots.len(), red.rank());
        // ops * original = reduced
        for r in 0..red.num_rows() {
            let mut acc: u64 = 0;
            for j in 0..red.num_rows() {
                if ops.get(r, j) {
                    acc ^= originals[j];
                }
            }
            for c in 0..red.num_cols() {
                assert_eq!(acc >> c & 1 != 0, reduced.get(r, c), "ops identity broken");
            }
        }
    }

    #[test]
    fn test_add_row_rref_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let cols = rng.gen_range(1..=20);
            let n = rng.gen_range(1..=25);
            let mut red = ProgressiveRowReducer::new(cols);
            let mut originals = Vec::new();
            for _ in 0..n {
                let bits = rng.gen::<u64>() & ((1 << cols) - 1);
                originals.push(bits);
                red.add_row(&one_row(bits, cols));
                check_invariants(&red, &originals);
            }
            let (rank, _) = naive_rref(&originals, cols);
            assert_eq!(rank, red.rank());
        }
    }

    #[test]
    fn test_replace_row_equivalence() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..80 {
            let cols = rng.gen_range(2..=16);
            let n = rng.gen_range(2..=12);
            let mut red = ProgressiveRowReducer::new(cols);
            let mut originals = Vec::new();
            for _ in 0..n {
                let bits = rng.gen::<u64>() & ((1 << cols) - 1);
                originals.push(bits);
                red.add_row(&one_row(bits, cols));
            }
            for _ in 0..3 * n {
                let slot = rng.gen_range(0..n);
                let bits = rng.gen::<u64>() & ((1 << cols) - 1);
                originals[slot] = bits;
                red.replace_row(slot, &one_row(bits, cols));
                check_invariants(&red, &originals);

                // the reduced matrix must match a from-scratch reduction
                // of the literally substituted matrix (RREF is unique up
                // to the order of rows)
                let (rank, naive) = naive_rref(&originals, cols);
                assert_eq!(rank, red.rank());
                let mut got: Vec<u64> = (0..n)
                    .map(|r| {
                        (0..cols)
                            .filter(|&c| red.reduced_matrix().get(r, c))
                            .fold(0u64, |acc, c| acc | 1 << c)
                    })
                    .filter(|&x| x != 0)
                    .collect();
                let mut want: Vec<u64> = naive.into_iter().filter(|&x| x != 0).collect();
                got.sort_unstable();
                want.sort_unstable();
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn test_add_column_promotes() {
        // two equal rows, then a disambiguating column
        let mut red = ProgressiveRowReducer::new(2);
        red.add_row(&one_row(0b11, 2));
        red.add_row(&one_row(0b11, 2));
        assert_eq!(red.rank(), 1);
        let mut col = GF2Matrix::new(2, 1);
        col.set(1, 0, true);
        red.add_column(&col);
        assert_eq!(red.rank(), 2);
        assert_eq!(red.num_cols(), 3);
        assert_eq!(red.smallest_full_rank(), 3);
    }

    #[test]
    fn test_smallest_full_rank_definition() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..60 {
            let cols = rng.gen_range(1..=14);
            let n = rng.gen_range(1..=10);
            let mut red = ProgressiveRowReducer::new(cols);
            let mut originals = Vec::new();
            for _ in 0..n {
                let bits = rng.gen::<u64>() & ((1 << cols) - 1);
                originals.push(bits);
                red.add_row(&one_row(bits, cols));
            }
            // least c such that the first c columns have rank min(R, C)
            let target = n.min(cols);
            let mut expect = cols + 1;
            for c in 1..=cols {
                let truncated: Vec<u64> = originals.iter().map(|&x| x & ((1 << c) - 1)).collect();
                if naive_rref(&truncated, c).0 == target {
                    expect = c;
                    break;
                }
            }
            assert_eq!(red.smallest_full_rank(), expect);
            // compute_ranks agrees with naive ranks of column prefixes
            let ranks = red.compute_ranks(0, cols);
            for c in 0..cols {
                let truncated: Vec<u64> =
                    originals.iter().map(|&x| x & ((1 << (c + 1)) - 1)).collect();
                assert_eq!(ranks[c], naive_rref(&truncated, c + 1).0);
            }
        }
    }

    #[test]
    fn test_check_invertible() {
        assert!(ProgressiveRowReducer::check_invertible(&GF2Matrix::identity(5)));
        let mut singular = GF2Matrix::identity(3);
        singular.clear_row(2);
        assert!(!ProgressiveRowReducer::check_invertible(&singular));
        assert!(!ProgressiveRowReducer::check_invertible(&GF2Matrix::new(2, 3)));
    }
}
