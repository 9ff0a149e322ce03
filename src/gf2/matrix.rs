/*
 * @file matrix.rs
 *
 * GF(2) matrix with rows packed into machine words.  Rows are the unit
 * of mutation: the reducer swaps, XORs and replaces whole rows, so each
 * row is stored as a contiguous run of u64 words.
 */

use std::fmt;

/** Number of words spanning `n` bits, rounded up. */
#[inline(always)]
fn words_spanning(n: usize) -> usize {
    (n + 63) / 64
}

/** GF(2) matrix of shape (rows, cols), row-major packed bits. */
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GF2Matrix {
    rows: usize,
    cols: usize,
    stride: usize, // row-to-row stride measured in words
    words: Vec<u64>,
}

impl GF2Matrix {
    /** Create a zero matrix. */
    pub fn new(rows: usize, cols: usize) -> GF2Matrix {
        let stride = words_spanning(cols);
        GF2Matrix {
            rows,
            cols,
            stride,
            words: vec![0; stride.checked_mul(rows).unwrap()],
        }
    }

    /** Create the identity matrix of a given size. */
    pub fn identity(n: usize) -> GF2Matrix {
        let mut ret = GF2Matrix::new(n, n);
        for i in 0..n {
            ret.set(i, i, true);
        }
        ret
    }

    /** Create a matrix from one integer per row; bit `c` of the integer
     * is the entry in column `c`.  Requires `cols <= 64`.
     */
    pub fn from_row_ints(row_ints: &[u64], cols: usize) -> GF2Matrix {
        assert!(cols <= 64);
        let mask = if cols == 64 { !0 } else { (1u64 << cols) - 1 };
        let mut ret = GF2Matrix::new(row_ints.len(), cols);
        for (r, &bits) in row_ints.iter().enumerate() {
            ret.words[r * ret.stride] = bits & mask;
        }
        ret
    }

    /** Number of rows. */
    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /** Number of columns. */
    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /** Return a single bit. */
    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < self.rows && col < self.cols);
        (self.words[row * self.stride + col / 64] >> (col % 64)) & 1 != 0
    }

    /** Set a single bit. */
    #[inline(always)]
    pub fn set(&mut self, row: usize, col: usize, bit: bool) {
        debug_assert!(row < self.rows && col < self.cols);
        let w = &mut self.words[row * self.stride + col / 64];
        if bit {
            *w |= 1 << (col % 64);
        } else {
            *w &= !(1 << (col % 64));
        }
    }

    /** The words of one row. */
    #[inline(always)]
    pub fn row_words(&self, row: usize) -> &[u64] {
        debug_assert!(row < self.rows);
        &self.words[row * self.stride..row * self.stride + self.stride]
    }

    /** Replace row `dst` with row `dst` XOR row `src` (addition in GF(2)). */
    pub fn row_xor(&mut self, dst: usize, src: usize) {
        assert!(dst != src && dst < self.rows && src < self.rows);
        let stride = self.stride;
        let (head, tail) = self.words.split_at_mut(dst.max(src) * stride);
        let (lo, hi) = (dst.min(src), &mut tail[..stride]);
        let lo_words = &mut head[lo * stride..(lo + 1) * stride];
        if dst > src {
            for (dw, sw) in hi.iter_mut().zip(lo_words.iter()) {
                *dw ^= *sw;
            }
        } else {
            for (dw, sw) in lo_words.iter_mut().zip(hi.iter()) {
                *dw ^= *sw;
            }
        }
    }

    /** Swap two rows. */
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        assert!(i < self.rows && j < self.rows);
        if i == j {
            return;
        }
        for w in 0..self.stride {
            self.words.swap(i * self.stride + w, j * self.stride + w);
        }
    }

    /** Overwrite row `i` with the single row of `row`. */
    pub fn set_row(&mut self, i: usize, row: &GF2Matrix) {
        assert!(row.rows == 1 && row.cols == self.cols && i < self.rows);
        self.words[i * self.stride..(i + 1) * self.stride].copy_from_slice(&row.words);
    }

    /** Zero out row `i`. */
    pub fn clear_row(&mut self, i: usize) {
        assert!(i < self.rows);
        self.words[i * self.stride..(i + 1) * self.stride].fill(0);
    }

    /** Column index of the first 1 in row `i`, if any. */
    pub fn first_one_in_row(&self, i: usize) -> Option<usize> {
        for (w, &word) in self.row_words(i).iter().enumerate() {
            if word != 0 {
                return Some(w * 64 + word.trailing_zeros() as usize);
            }
        }
        None
    }

    /** Copy of the window of `n_rows` x `n_cols` bits starting at
     * (`row_start`, `col_start`).
     */
    pub fn sub(&self, row_start: usize, col_start: usize, n_rows: usize, n_cols: usize) -> GF2Matrix {
        assert!(row_start + n_rows <= self.rows && col_start + n_cols <= self.cols);
        let mut ret = GF2Matrix::new(n_rows, n_cols);
        if col_start % 64 == 0 {
            // word-aligned fast path
            let w0 = col_start / 64;
            for r in 0..n_rows {
                let src = &self.words[(row_start + r) * self.stride + w0..];
                let dst = &mut ret.words[r * ret.stride..(r + 1) * ret.stride];
                dst.copy_from_slice(&src[..ret.stride]);
            }
            ret.mask_tail();
        } else {
            for r in 0..n_rows {
                for c in 0..n_cols {
                    if self.get(row_start + r, col_start + c) {
                        ret.set(r, c, true);
                    }
                }
            }
        }
        ret
    }

    /** Append the rows of `other` below; requires equal column count. */
    pub fn stack_below(&mut self, other: &GF2Matrix) {
        assert!(other.cols == self.cols, "stack_below: column counts differ");
        self.words.extend_from_slice(&other.words);
        self.rows += other.rows;
    }

    /** Append one all-zero row. */
    pub fn push_empty_row(&mut self) {
        self.words.resize(self.words.len() + self.stride, 0);
        self.rows += 1;
    }

    /** Append one all-zero column, repacking if a new word is needed. */
    pub fn push_empty_col(&mut self) {
        if self.cols % 64 != 0 {
            self.cols += 1;
            return;
        }
        let new_stride = self.stride + 1;
        let mut words = vec![0u64; new_stride * self.rows];
        for r in 0..self.rows {
            words[r * new_stride..r * new_stride + self.stride]
                .copy_from_slice(self.row_words(r));
        }
        self.stride = new_stride;
        self.words = words;
        self.cols += 1;
    }

    /** Dot product of row `i` with the single column held by `col`
     * (a (R, 1) matrix), i.e. parity of the AND of row and column.
     */
    pub fn row_dot_col(&self, i: usize, col: &GF2Matrix) -> bool {
        assert!(col.cols == 1 && col.rows <= self.cols);
        let mut acc = false;
        for r in 0..col.rows {
            acc ^= self.get(i, r) & col.get(r, 0);
        }
        acc
    }

    /** Zero any bits beyond the column count in the last word of each row. */
    fn mask_tail(&mut self) {
        if self.cols % 64 == 0 || self.stride == 0 {
            return;
        }
        let mask = (1u64 << (self.cols % 64)) - 1;
        for r in 0..self.rows {
            self.words[r * self.stride + self.stride - 1] &= mask;
        }
    }
}

impl fmt::Display for GF2Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows {
            for c in 0..self.cols {
                write!(f, "{}", self.get(r, c) as u8)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::GF2Matrix;
    use rand::{thread_rng, Rng};

    fn random_matrix(rows: usize, cols: usize) -> GF2Matrix {
        let mut m = GF2Matrix::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, thread_rng().gen::<bool>());
            }
        }
        m
    }

    #[test]
    fn test_row_xor_is_involution() {
        for _ in 0..20 {
            let mut m = random_matrix(7, 130);
            let orig = m.clone();
            m.row_xor(2, 5);
            m.row_xor(2, 5);
            assert_eq!(m, orig);
        }
    }

    #[test]
    fn test_sub_window() {
        let m = random_matrix(9, 70);
        let s = m.sub(2, 3, 4, 60);
        for r in 0..4 {
            for c in 0..60 {
                assert_eq!(s.get(r, c), m.get(r + 2, c + 3));
            }
        }
        // aligned path
        let s = m.sub(1, 0, 5, 70);
        for r in 0..5 {
            for c in 0..70 {
                assert_eq!(s.get(r, c), m.get(r + 1, c));
            }
        }
    }

    #[test]
    fn test_stack_and_grow() {
        let a = random_matrix(3, 65);
        let b = random_matrix(2, 65);
        let mut s = a.clone();
        s.stack_below(&b);
        assert_eq!(s.rows(), 5);
        for c in 0..65 {
            assert_eq!(s.get(3, c), b.get(0, c));
            assert_eq!(s.get(4, c), b.get(1, c));
        }

        let mut g = random_matrix(3, 64);
        let before = g.clone();
        g.push_empty_col();
        assert_eq!(g.cols(), 65);
        for r in 0..3 {
            assert!(!g.get(r, 64));
            for c in 0..64 {
                assert_eq!(g.get(r, c), before.get(r, c));
            }
        }
    }

    #[test]
    fn test_from_row_ints() {
        let m = GF2Matrix::from_row_ints(&[0b1011, 0b0101], 4);
        assert!(m.get(0, 0) && m.get(0, 1) && !m.get(0, 2) && m.get(0, 3));
        assert!(m.get(1, 0) && !m.get(1, 1) && m.get(1, 2) && !m.get(1, 3));
        assert_eq!(m.first_one_in_row(1), Some(0));
    }
}
