/*
 * @file net.rs
 *
 * Digital nets in base 2 and their construction methods.
 *
 * A net is a set of per-coordinate generating matrices over GF(2); the
 * i-th point's coordinate j is obtained by applying matrix j to the
 * binary digits of i.  Three construction methods are supported: Sobol
 * (direction numbers driven by primitive polynomials), polynomial
 * lattice rules viewed as nets, and explicit matrices.
 */

use crate::error::{Error, Result};
use crate::gf2::{GF2Matrix, ProgressiveRowReducer};
use crate::poly::{self, Poly2};
use rand::Rng;
use std::fmt::Write as _;
use std::sync::Arc;

/** Whether a point set is a single net or an embedded sequence of nets
 * over all column prefixes.
 */
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Embedding {
    Unilevel,
    Multilevel,
}

/** Report form: annotated for humans, parameters-only for machines. */
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    Human,
    Machine,
}

/** Read access to a digital net: its shape and generating matrices. */
pub trait Net {
    fn dimension(&self) -> usize;
    fn n_rows(&self) -> usize;
    fn n_cols(&self) -> usize;
    /** Generating matrix of one coordinate.  The search core only
     * passes coordinates below the dimension; anything else is a
     * programming error and panics.  Callers holding untrusted
     * coordinates go through `try_matrix`.
     */
    fn matrix(&self, coord: usize) -> &GF2Matrix;

    /** Checked counterpart of `matrix`. */
    fn try_matrix(&self, coord: usize) -> Result<&GF2Matrix> {
        if coord >= self.dimension() {
            return Err(Error::OutOfBounds {
                index: coord,
                size: self.dimension(),
            });
        }
        Ok(self.matrix(coord))
    }

    fn num_points(&self) -> u64 {
        1u64 << self.n_cols()
    }

    /** Coordinate values of all points, in Gray-code order: position i
     * holds the point with index gray(i).  One reversed-bit column is
     * XORed into the state per step, so a full coordinate costs O(n).
     * The same traversal order is used for every coordinate, keeping
     * positions aligned across coordinates, and any 2^l prefix of
     * positions covers exactly the points 0..2^l.
     */
    fn coordinate_values(&self, coord: usize) -> Vec<f64> {
        let m = self.matrix(coord);
        let (r, c) = (m.rows(), m.cols());
        assert!(r < 64 && c < 64);
        let cols_rev: Vec<u64> = (0..c)
            .map(|j| {
                (0..r).fold(0u64, |acc, row| {
                    acc | ((m.get(row, j) as u64) << (r - 1 - row))
                })
            })
            .collect();
        let scale = 1.0 / (1u64 << r) as f64;
        let n = 1usize << c;
        let mut vals = vec![0.0; n];
        let mut state = 0u64;
        for i in 1..n {
            state ^= cols_rev[i.trailing_zeros() as usize];
            vals[i] = state as f64 * scale;
        }
        vals
    }
}

/** A construction method for digital nets.
 *
 * Implementations define the per-coordinate generating value, how it
 * turns into a matrix, the space of admissible values per coordinate,
 * and a random sampler.
 */
pub trait NetConstruction {
    type GenValue: Clone;
    type SizeParam: Clone;

    const NAME: &'static str;
    /** Whether coordinate 0 admits a single canonical value. */
    const HAS_SPECIAL_FIRST_COORDINATE: bool;

    fn check_gen_value(value: &Self::GenValue, coord: usize, size: &Self::SizeParam)
        -> Result<()>;
    fn n_rows(size: &Self::SizeParam) -> usize;
    fn n_cols(size: &Self::SizeParam) -> usize;
    fn make_matrix(value: &Self::GenValue, size: &Self::SizeParam) -> GF2Matrix;
    /** All admissible generating values for one coordinate, lazily. */
    fn value_space_coord(
        coord: usize,
        size: &Self::SizeParam,
    ) -> Box<dyn Iterator<Item = Self::GenValue>>;
    fn sample_random<R: Rng>(
        coord: usize,
        size: &Self::SizeParam,
        embedding: Embedding,
        rng: &mut R,
    ) -> Self::GenValue;
    fn format_value(value: &Self::GenValue, format: OutputFormat) -> String;
}

/* ***********************************************************************
 * Constructed nets
 ***********************************************************************/

/** A digital net built from a construction method.
 *
 * Generating values and matrices are shared: extending the dimension
 * clones only the vectors of reference-counted pointers, so the many
 * CBC candidates sharing a prefix share its per-coordinate data.
 */
pub struct DigitalNet<C: NetConstruction> {
    size: C::SizeParam,
    n_rows: usize,
    n_cols: usize,
    gen_values: Vec<Arc<C::GenValue>>,
    matrices: Vec<Arc<GF2Matrix>>,
}

impl<C: NetConstruction> Clone for DigitalNet<C> {
    fn clone(&self) -> Self {
        DigitalNet {
            size: self.size.clone(),
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            gen_values: self.gen_values.clone(),
            matrices: self.matrices.clone(),
        }
    }
}

impl<C: NetConstruction> DigitalNet<C> {
    /** Net with the given generating values, one per coordinate. */
    pub fn new(size: C::SizeParam, gen_values: Vec<C::GenValue>) -> Result<Self> {
        let mut net = Self::placeholder(size);
        for value in gen_values {
            net = net.extend_dimension(value)?;
        }
        Ok(net)
    }

    /** Zero-dimensional placeholder, the seed for CBC extension. */
    pub fn placeholder(size: C::SizeParam) -> Self {
        DigitalNet {
            n_rows: C::n_rows(&size),
            n_cols: C::n_cols(&size),
            size,
            gen_values: Vec::new(),
            matrices: Vec::new(),
        }
    }

    /** A new net sharing every existing coordinate and appending one. */
    pub fn extend_dimension(&self, value: C::GenValue) -> Result<Self> {
        C::check_gen_value(&value, self.dimension(), &self.size)?;
        let matrix = Arc::new(C::make_matrix(&value, &self.size));
        let mut gen_values = self.gen_values.clone();
        let mut matrices = self.matrices.clone();
        gen_values.push(Arc::new(value));
        matrices.push(matrix);
        Ok(DigitalNet {
            size: self.size.clone(),
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            gen_values,
            matrices,
        })
    }

    pub fn size_param(&self) -> &C::SizeParam {
        &self.size
    }

    /** Generating value of one coordinate. */
    pub fn gen_value(&self, coord: usize) -> Result<&C::GenValue> {
        self.gen_values
            .get(coord)
            .map(|v| &**v)
            .ok_or(Error::OutOfBounds {
                index: coord,
                size: self.gen_values.len(),
            })
    }

    /** Text report of the net.
     *
     * Human form is annotated and prints the matrices; machine form is
     * parameters only, space-separated, one coordinate per line.
     */
    pub fn format(&self, format: OutputFormat, interlacing: usize) -> String {
        let mut out = String::new();
        if format == OutputFormat::Human {
            let _ = writeln!(out, "{}  // Number of columns", self.n_cols);
            let _ = writeln!(out, "{}  // Number of rows", self.n_rows);
            let _ = writeln!(out, "{}  // Number of points", self.num_points());
            let _ = writeln!(out, "{}  // Dimension of points", self.dimension());
            let _ = writeln!(out, "{}  // Interlacing factor", interlacing);
            let _ = writeln!(out, "{}  // Construction method", C::NAME);
            for coord in 0..self.dimension() {
                let _ = writeln!(out, "//dim = {}", coord);
                let _ = write!(out, "{}", self.matrix(coord));
            }
        } else {
            for value in &self.gen_values {
                let _ = writeln!(out, "{}", C::format_value(value, format));
            }
        }
        out
    }
}

impl<C: NetConstruction> Net for DigitalNet<C> {
    fn dimension(&self) -> usize {
        self.gen_values.len()
    }
    fn n_rows(&self) -> usize {
        self.n_rows
    }
    fn n_cols(&self) -> usize {
        self.n_cols
    }
    fn matrix(&self, coord: usize) -> &GF2Matrix {
        &self.matrices[coord]
    }
}

/** A net that owns only its matrices. */
pub struct ExplicitNet {
    n_rows: usize,
    n_cols: usize,
    matrices: Vec<Arc<GF2Matrix>>,
}

impl ExplicitNet {
    pub fn new(matrices: Vec<GF2Matrix>) -> Result<Self> {
        let (n_rows, n_cols) = match matrices.first() {
            Some(m) => (m.rows(), m.cols()),
            None => (0, 0),
        };
        for m in &matrices {
            if m.rows() != n_rows || m.cols() != n_cols {
                return Err(Error::ShapeMismatch {
                    expected: (n_rows, n_cols),
                    got: (m.rows(), m.cols()),
                });
            }
        }
        Ok(ExplicitNet {
            n_rows,
            n_cols,
            matrices: matrices.into_iter().map(Arc::new).collect(),
        })
    }
}

impl Net for ExplicitNet {
    fn dimension(&self) -> usize {
        self.matrices.len()
    }
    fn n_rows(&self) -> usize {
        self.n_rows
    }
    fn n_cols(&self) -> usize {
        self.n_cols
    }
    fn matrix(&self, coord: usize) -> &GF2Matrix {
        &self.matrices[coord]
    }
}

/* ***********************************************************************
 * Sobol construction
 ***********************************************************************/

/** Sobol nets: coordinate 0 is the identity; coordinate j >= 1 is
 * driven by the j-th primitive polynomial and a vector of initial
 * direction numbers m_1..m_e (m_i odd, m_i < 2^i).
 */
pub struct Sobol;

/** The n-th primitive polynomial over GF(2), n >= 1, enumerated by
 * increasing degree and increasing integer encoding within a degree.
 */
pub fn nth_primitive_polynomial(n: usize) -> Poly2 {
    assert!(n >= 1);
    let mut remaining = n;
    for degree in 1..=20usize {
        for v in (1u64 << degree)..(1u64 << (degree + 1)) {
            if Poly2(v).is_primitive() {
                remaining -= 1;
                if remaining == 0 {
                    return Poly2(v);
                }
            }
        }
    }
    unreachable!("primitive polynomial enumeration exhausted")
}

/** Direction numbers m_1..m_count for one Sobol coordinate: the given
 * initial values, extended by the primitive-polynomial recurrence.
 */
fn sobol_direction_numbers(p: Poly2, init: &[u64], count: usize) -> Vec<u64> {
    let e = p.degree();
    let mut mv: Vec<u64> = init.iter().copied().take(count).collect();
    while mv.len() < count {
        let i = mv.len(); // computing m_{i+1}, 1-based index i+1
        let mut acc = (mv[i - e] << e) ^ mv[i - e];
        for t in 1..e {
            if p.0 >> (e - t) & 1 != 0 {
                acc ^= mv[i - t] << t;
            }
        }
        mv.push(acc);
    }
    mv
}

impl NetConstruction for Sobol {
    /** Coordinate index paired with its initial direction numbers;
     * coordinate 0 takes the single value (0, [0]).
     */
    type GenValue = (usize, Vec<u64>);
    /** m, for 2^m points and m x m matrices. */
    type SizeParam = usize;

    const NAME: &'static str = "sobol";
    const HAS_SPECIAL_FIRST_COORDINATE: bool = true;

    fn check_gen_value(value: &(usize, Vec<u64>), coord: usize, _size: &usize) -> Result<()> {
        let (vcoord, init) = value;
        if *vcoord != coord {
            return Err(Error::Configuration(format!(
                "direction numbers for coordinate {} used at coordinate {}",
                vcoord, coord
            )));
        }
        if coord == 0 {
            return if init == &[0] {
                Ok(())
            } else {
                Err(Error::Configuration(
                    "first Sobol coordinate takes the single value [0]".into(),
                ))
            };
        }
        let e = nth_primitive_polynomial(coord).degree();
        if init.len() != e {
            return Err(Error::Configuration(format!(
                "coordinate {} expects {} direction numbers, got {}",
                coord,
                e,
                init.len()
            )));
        }
        for (i, &m) in init.iter().enumerate() {
            if m % 2 == 0 || m >= 1u64 << (i + 1) {
                return Err(Error::Configuration(format!(
                    "direction number m_{} = {} must be odd and below 2^{}",
                    i + 1,
                    m,
                    i + 1
                )));
            }
        }
        Ok(())
    }

    fn n_rows(size: &usize) -> usize {
        *size
    }
    fn n_cols(size: &usize) -> usize {
        *size
    }

    fn make_matrix(value: &(usize, Vec<u64>), size: &usize) -> GF2Matrix {
        let m = *size;
        let (coord, init) = value;
        if *coord == 0 {
            return GF2Matrix::identity(m);
        }
        let p = nth_primitive_polynomial(*coord);
        let mv = sobol_direction_numbers(p, init, m);
        let mut mat = GF2Matrix::new(m, m);
        for c in 0..m {
            for r in 0..=c {
                mat.set(r, c, mv[c] >> (c - r) & 1 != 0);
            }
        }
        mat
    }

    fn value_space_coord(
        coord: usize,
        _size: &usize,
    ) -> Box<dyn Iterator<Item = (usize, Vec<u64>)>> {
        if coord == 0 {
            return Box::new(std::iter::once((0, vec![0])));
        }
        let e = nth_primitive_polynomial(coord).degree();
        let spaces: Vec<Vec<u64>> = (1..=e)
            .map(|i| (0..1u64 << (i - 1)).map(|u| 2 * u + 1).collect())
            .collect();
        Box::new(CartesianProduct::new(spaces).map(move |mv| (coord, mv)))
    }

    fn sample_random<R: Rng>(
        coord: usize,
        _size: &usize,
        _embedding: Embedding,
        rng: &mut R,
    ) -> (usize, Vec<u64>) {
        if coord == 0 {
            return (0, vec![0]);
        }
        let e = nth_primitive_polynomial(coord).degree();
        let init = (1..=e)
            .map(|i| 2 * rng.gen_range(0..1u64 << (i - 1)) + 1)
            .collect();
        (coord, init)
    }

    fn format_value(value: &(usize, Vec<u64>), _format: OutputFormat) -> String {
        value
            .1
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/* ***********************************************************************
 * Polynomial lattice construction
 ***********************************************************************/

/** Polynomial lattice rules over GF(2)[x], viewed as digital nets.
 * The size parameter is the modulus P(x); the generating matrix of a
 * value g is the Hankel matrix of the Laurent coefficients of g/P.
 */
pub struct PolynomialLattice;

impl NetConstruction for PolynomialLattice {
    type GenValue = Poly2;
    type SizeParam = Poly2;

    const NAME: &'static str = "polynomial";
    const HAS_SPECIAL_FIRST_COORDINATE: bool = true;

    fn check_gen_value(value: &Poly2, coord: usize, size: &Poly2) -> Result<()> {
        if coord == 0 {
            return if *value == poly::ONE {
                Ok(())
            } else {
                Err(Error::Configuration(
                    "first polynomial lattice coordinate takes the value 1".into(),
                ))
            };
        }
        if value.is_zero() || value.degree() >= size.degree() {
            return Err(Error::Configuration(format!(
                "generating polynomial {} out of range for modulus {}",
                value, size
            )));
        }
        if value.gcd(*size).0 != 1 {
            return Err(Error::Configuration(format!(
                "generating polynomial {} shares a factor with the modulus {}",
                value, size
            )));
        }
        Ok(())
    }

    fn n_rows(size: &Poly2) -> usize {
        size.degree()
    }
    fn n_cols(size: &Poly2) -> usize {
        size.degree()
    }

    fn make_matrix(value: &Poly2, size: &Poly2) -> GF2Matrix {
        let m = size.degree();
        let coeffs = value.laurent_coeffs(*size, 2 * m - 1);
        let mut mat = GF2Matrix::new(m, m);
        for r in 0..m {
            for c in 0..m {
                mat.set(r, c, coeffs[r + c]);
            }
        }
        mat
    }

    fn value_space_coord(coord: usize, size: &Poly2) -> Box<dyn Iterator<Item = Poly2>> {
        if coord == 0 {
            Box::new(std::iter::once(poly::ONE))
        } else {
            Box::new(size.units().into_iter())
        }
    }

    fn sample_random<R: Rng>(
        coord: usize,
        size: &Poly2,
        _embedding: Embedding,
        rng: &mut R,
    ) -> Poly2 {
        if coord == 0 {
            return poly::ONE;
        }
        let d = size.degree();
        loop {
            let v = Poly2(rng.gen_range(1..1u64 << d));
            if v.gcd(*size).0 == 1 {
                return v;
            }
        }
    }

    fn format_value(value: &Poly2, format: OutputFormat) -> String {
        match format {
            OutputFormat::Machine => value.0.to_string(),
            OutputFormat::Human => format!("{}", value),
        }
    }
}

/* ***********************************************************************
 * Explicit construction
 ***********************************************************************/

/** Nets whose generating values are the matrices themselves. */
pub struct Explicit;

impl NetConstruction for Explicit {
    type GenValue = GF2Matrix;
    type SizeParam = (usize, usize);

    const NAME: &'static str = "explicit";
    const HAS_SPECIAL_FIRST_COORDINATE: bool = false;

    fn check_gen_value(value: &GF2Matrix, _coord: usize, size: &(usize, usize)) -> Result<()> {
        if (value.rows(), value.cols()) != *size {
            return Err(Error::ShapeMismatch {
                expected: *size,
                got: (value.rows(), value.cols()),
            });
        }
        Ok(())
    }

    fn n_rows(size: &(usize, usize)) -> usize {
        size.0
    }
    fn n_cols(size: &(usize, usize)) -> usize {
        size.1
    }

    fn make_matrix(value: &GF2Matrix, _size: &(usize, usize)) -> GF2Matrix {
        value.clone()
    }

    fn value_space_coord(
        _coord: usize,
        size: &(usize, usize),
    ) -> Box<dyn Iterator<Item = GF2Matrix>> {
        let (rows, cols) = *size;
        assert!(cols < 64);
        // odometer over one integer per row
        let mut state = vec![0u64; rows];
        let mut done = false;
        Box::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            let mat = GF2Matrix::from_row_ints(&state, cols);
            let mut r = 0;
            loop {
                if r == state.len() {
                    done = true;
                    break;
                }
                state[r] += 1;
                if state[r] < 1 << cols {
                    break;
                }
                state[r] = 0;
                r += 1;
            }
            Some(mat)
        }))
    }

    fn sample_random<R: Rng>(
        _coord: usize,
        size: &(usize, usize),
        embedding: Embedding,
        rng: &mut R,
    ) -> GF2Matrix {
        let (rows, cols) = *size;
        assert!(cols < 64);
        let mask = (1u64 << cols) - 1;
        match embedding {
            Embedding::Unilevel => {
                // draw rows one by one, rejecting a row unless it
                // increases the rank
                assert!(rows <= cols);
                let mut row_ints: Vec<u64> = Vec::with_capacity(rows);
                let mut reducer = ProgressiveRowReducer::new(cols);
                for i in 1..=rows {
                    loop {
                        let bits = rng.gen::<u64>() & mask;
                        let mut trial = reducer.clone();
                        trial.add_row(&GF2Matrix::from_row_ints(&[bits], cols));
                        if trial.rank() == i {
                            reducer = trial;
                            row_ints.push(bits);
                            break;
                        }
                    }
                }
                GF2Matrix::from_row_ints(&row_ints, cols)
            }
            Embedding::Multilevel => {
                // row r gets its lowest set bit exactly at column r, so
                // every leading prefix stays independent
                assert!(rows <= cols);
                let row_ints: Vec<u64> = (0..rows)
                    .map(|r| {
                        let nb = rng.gen::<u64>();
                        ((1u64 << r) + (nb - (nb % (1u64 << (r + 1))))) & mask
                    })
                    .collect();
                GF2Matrix::from_row_ints(&row_ints, cols)
            }
        }
    }

    fn format_value(value: &GF2Matrix, format: OutputFormat) -> String {
        match format {
            OutputFormat::Machine => (0..value.rows())
                .map(|r| {
                    (0..value.cols())
                        .filter(|&c| value.get(r, c))
                        .fold(0u64, |acc, c| acc | 1 << c)
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(" "),
            OutputFormat::Human => format!("{}", value),
        }
    }
}

/* ***********************************************************************
 * Cartesian product of per-slot value lists
 ***********************************************************************/

/** Odometer over the cartesian product of small value lists. */
pub struct CartesianProduct<T: Clone> {
    spaces: Vec<Vec<T>>,
    state: Vec<usize>,
    done: bool,
}

impl<T: Clone> CartesianProduct<T> {
    pub fn new(spaces: Vec<Vec<T>>) -> Self {
        let done = spaces.iter().any(|s| s.is_empty());
        CartesianProduct {
            state: vec![0; spaces.len()],
            spaces,
            done,
        }
    }
}

impl<T: Clone> Iterator for CartesianProduct<T> {
    type Item = Vec<T>;
    fn next(&mut self) -> Option<Vec<T>> {
        if self.done {
            return None;
        }
        let item: Vec<T> = self
            .state
            .iter()
            .zip(&self.spaces)
            .map(|(&i, space)| space[i].clone())
            .collect();
        let mut slot = 0;
        loop {
            if slot == self.spaces.len() {
                self.done = true;
                break;
            }
            self.state[slot] += 1;
            if self.state[slot] < self.spaces[slot].len() {
                break;
            }
            self.state[slot] = 0;
            slot += 1;
        }
        Some(item)
    }
}
