/*
 * @file lattice.rs
 *
 * Rank-1 integration lattices and their searches.
 *
 * An ordinary lattice with n = 2^m points takes a generating vector of
 * odd integers; a polynomial lattice takes a vector of units modulo
 * P(x).  Coordinate-uniform kernel figures evaluate through the same
 * per-shape states as nets; fast CBC scores every candidate value of a
 * coordinate at once by cross-correlation over the cyclic structure of
 * the unit group.
 */

use crate::error::{Error, Result};
use crate::fft::cyclic_cross_correlation;
use crate::figure::{mean_dot, CuState, ProgressObserver};
use crate::kernel::Kernel;
use crate::net::OutputFormat;
use crate::poly::{find_group_generator, Poly2};
use crate::search::{MinimumObserver, SearchResult};
use crate::weights::{proj_coords, Weights};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;

/* ***********************************************************************
 * Lattice spaces
 ***********************************************************************/

/** The cyclic structure shared by rank-1 lattice families: points,
 * per-coordinate kernel indexing, candidate values, and the grouped
 * correlation behind fast CBC.
 */
pub trait LatticeSpace {
    type Gen: Clone + PartialEq + std::fmt::Debug;

    /** Number of points. */
    fn n(&self) -> usize;
    /** The forced value of the first coordinate. */
    fn trivial_gen(&self) -> Self::Gen;
    /** Candidate values for the other coordinates, in canonical order. */
    fn unit_space(&self) -> Vec<Self::Gen>;
    fn sample_unit<R: Rng>(&self, rng: &mut R) -> Self::Gen;
    /** Kernel values by residue index. */
    fn kernel_table(&self, kernel: &Kernel) -> Vec<f64>;
    /** Per-point kernel values of a coordinate with generator `g`. */
    fn kernel_row(&self, g: &Self::Gen, table: &[f64]) -> Vec<f64>;
    /** Whether coordinates live on dyadic points (base-2 kernels). */
    fn wants_dyadic_kernel(&self) -> bool;
    /** Merit gains of every candidate in `unit_space` order, computed
     * by correlation in O(n log n).
     */
    fn fast_cbc_gains(&self, weighted_state: &[f64], table: &[f64]) -> Result<Vec<f64>>;
    fn format_gen(g: &Self::Gen, format: OutputFormat) -> String;
}

/** Ordinary rank-1 lattice space with n = 2^m points. */
pub struct OrdinaryLattice {
    m: usize,
}

impl OrdinaryLattice {
    pub fn new(m: usize) -> Result<Self> {
        if m == 0 || m >= 32 {
            return Err(Error::Configuration(format!(
                "ordinary lattice size 2^{} out of range",
                m
            )));
        }
        Ok(OrdinaryLattice { m })
    }
}

impl LatticeSpace for OrdinaryLattice {
    type Gen = u64;

    fn n(&self) -> usize {
        1 << self.m
    }

    fn trivial_gen(&self) -> u64 {
        1
    }

    fn unit_space(&self) -> Vec<u64> {
        (1..self.n() as u64).step_by(2).collect()
    }

    fn sample_unit<R: Rng>(&self, rng: &mut R) -> u64 {
        2 * rng.gen_range(0..(self.n() as u64) / 2) + 1
    }

    fn kernel_table(&self, kernel: &Kernel) -> Vec<f64> {
        let n = self.n();
        (0..n).map(|i| kernel.eval(i as f64 / n as f64)).collect()
    }

    fn kernel_row(&self, g: &u64, table: &[f64]) -> Vec<f64> {
        let n = self.n();
        (0..n).map(|i| table[(i * *g as usize) % n]).collect()
    }

    fn wants_dyadic_kernel(&self) -> bool {
        false
    }

    /** Split indices by their power-of-two gcd with n; each class is an
     * orbit of the unit group of 2^(m-j), which is {±3^t} (or smaller
     * for tiny moduli), so each class reduces to cross-correlations of
     * power-of-two length.
     */
    fn fast_cbc_gains(&self, weighted_state: &[f64], table: &[f64]) -> Result<Vec<f64>> {
        let m = self.m;
        let n = self.n();
        let base = table[0] * weighted_state[0];

        enum ClassData {
            /** Correlations for the plus/minus characters of the sign. */
            Split { plus: Vec<f64>, minus: Vec<f64> },
            /** Tiny class: gain indexed by the candidate modulo n_j. */
            Direct(Vec<f64>),
        }

        let mut classes = Vec::with_capacity(m);
        for j in 0..m {
            let mu = m - j;
            let nj = 1usize << mu;
            let scale = 1usize << j;
            if mu <= 2 {
                // at most two units; correlate directly
                let units: Vec<usize> = (1..nj).step_by(2).collect();
                let mut gains = vec![0.0; nj];
                for a in (1..nj).step_by(2) {
                    gains[a] = units
                        .iter()
                        .map(|&u| table[scale * (u * a % nj)] * weighted_state[scale * u])
                        .sum();
                }
                classes.push(ClassData::Direct(gains));
            } else {
                let t_len = 1usize << (mu - 2);
                let mut pw = 1usize;
                let mut a_plus = vec![0.0; t_len];
                let mut a_minus = vec![0.0; t_len];
                let mut b_plus = vec![0.0; t_len];
                let mut b_minus = vec![0.0; t_len];
                for t in 0..t_len {
                    let u = pw;
                    let v = nj - pw; // -3^t mod 2^mu
                    a_plus[t] = weighted_state[scale * u] + weighted_state[scale * v];
                    a_minus[t] = weighted_state[scale * u] - weighted_state[scale * v];
                    b_plus[t] = table[scale * u] + table[scale * v];
                    b_minus[t] = table[scale * u] - table[scale * v];
                    pw = pw * 3 % nj;
                }
                classes.push(ClassData::Split {
                    plus: cyclic_cross_correlation(&a_plus, &b_plus),
                    minus: cyclic_cross_correlation(&a_minus, &b_minus),
                });
            }
        }

        // discrete logs of every odd a modulo 2^m: a = (-1)^sign 3^t
        let (sign_of, log_of) = if m >= 3 {
            let t_len = 1usize << (m - 2);
            let mut sign_of = vec![false; n / 2];
            let mut log_of = vec![0usize; n / 2];
            let mut pw = 1usize;
            for t in 0..t_len {
                sign_of[(pw - 1) / 2] = false;
                log_of[(pw - 1) / 2] = t;
                let neg = n - pw;
                sign_of[(neg - 1) / 2] = true;
                log_of[(neg - 1) / 2] = t;
                pw = pw * 3 % n;
            }
            (sign_of, log_of)
        } else {
            (vec![false; n / 2], (0..n / 2).collect())
        };

        let gains = self
            .unit_space()
            .into_iter()
            .map(|a| {
                let a = a as usize;
                let mut total = base;
                for (j, class) in classes.iter().enumerate() {
                    let mu = m - j;
                    let nj = 1usize << mu;
                    match class {
                        ClassData::Direct(gains) => total += gains[a % nj],
                        ClassData::Split { plus, minus } => {
                            let t_len = 1usize << (mu - 2);
                            let tau = log_of[(a - 1) / 2] % t_len;
                            let contribution = if sign_of[(a - 1) / 2] {
                                0.5 * (plus[tau] - minus[tau])
                            } else {
                                0.5 * (plus[tau] + minus[tau])
                            };
                            total += contribution;
                        }
                    }
                }
                total / n as f64
            })
            .collect();
        Ok(gains)
    }

    fn format_gen(g: &u64, _format: OutputFormat) -> String {
        g.to_string()
    }
}

/** Polynomial lattice space modulo P(x), with n = 2^deg(P) points. */
pub struct PolynomialLatticeSpace {
    modulus: Poly2,
}

impl PolynomialLatticeSpace {
    pub fn new(modulus: Poly2) -> Result<Self> {
        if modulus.is_zero() || modulus.degree() == 0 || modulus.degree() >= 32 {
            return Err(Error::Configuration(format!(
                "polynomial lattice modulus {} out of range",
                modulus
            )));
        }
        Ok(PolynomialLatticeSpace { modulus })
    }

    /** Value of the point-coordinate map: the first deg(P) binary
     * digits of v / P.
     */
    fn residue_value(&self, v: Poly2) -> f64 {
        let m = self.modulus.degree();
        v.laurent_coeffs(self.modulus, m)
            .into_iter()
            .enumerate()
            .map(|(l, c)| if c { 2f64.powi(-(l as i32) - 1) } else { 0.0 })
            .sum()
    }
}

impl LatticeSpace for PolynomialLatticeSpace {
    type Gen = Poly2;

    fn n(&self) -> usize {
        1 << self.modulus.degree()
    }

    fn trivial_gen(&self) -> Poly2 {
        crate::poly::ONE
    }

    fn unit_space(&self) -> Vec<Poly2> {
        self.modulus.units()
    }

    fn sample_unit<R: Rng>(&self, rng: &mut R) -> Poly2 {
        let d = self.modulus.degree();
        loop {
            let v = Poly2(rng.gen_range(1..1u64 << d));
            if v.gcd(self.modulus).0 == 1 {
                return v;
            }
        }
    }

    fn kernel_table(&self, kernel: &Kernel) -> Vec<f64> {
        (0..self.n() as u64)
            .map(|v| kernel.eval(self.residue_value(Poly2(v))))
            .collect()
    }

    fn kernel_row(&self, g: &Poly2, table: &[f64]) -> Vec<f64> {
        (0..self.n() as u64)
            .map(|i| table[Poly2(i).mulmod(*g, self.modulus).0 as usize])
            .collect()
    }

    fn wants_dyadic_kernel(&self) -> bool {
        true
    }

    /** For an irreducible modulus the nonzero residues form one cyclic
     * orbit; a single cross-correlation of length 2^m - 1 along a
     * group generator scores every candidate.
     */
    fn fast_cbc_gains(&self, weighted_state: &[f64], table: &[f64]) -> Result<Vec<f64>> {
        if !self.modulus.is_irreducible() {
            return Err(Error::Configuration(format!(
                "fast CBC needs an irreducible modulus, got {}",
                self.modulus
            )));
        }
        let n = self.n();
        let order = n - 1;
        let g0 = find_group_generator(self.modulus);
        let mut pow = Vec::with_capacity(order);
        let mut log_of = vec![0usize; n];
        let mut cur = crate::poly::ONE;
        for t in 0..order {
            pow.push(cur);
            log_of[cur.0 as usize] = t;
            cur = cur.mulmod(g0, self.modulus);
        }
        debug_assert_eq!(cur, crate::poly::ONE);

        let a_vec: Vec<f64> = (0..order).map(|t| weighted_state[pow[t].0 as usize]).collect();
        let b_vec: Vec<f64> = (0..order).map(|t| table[pow[t].0 as usize]).collect();
        let corr = cyclic_cross_correlation(&a_vec, &b_vec);
        let base = table[0] * weighted_state[0];

        Ok(self
            .unit_space()
            .into_iter()
            .map(|g| (base + corr[log_of[g.0 as usize]]) / n as f64)
            .collect())
    }

    fn format_gen(g: &Poly2, format: OutputFormat) -> String {
        match format {
            OutputFormat::Machine => g.0.to_string(),
            OutputFormat::Human => format!("{}", g),
        }
    }
}

/* ***********************************************************************
 * Lattice figures
 ***********************************************************************/

/** Figure of merit over rank-1 lattices.
 *
 * Both variants compute the same weighted kernel sum; the
 * coordinate-uniform variant does it through the incremental per-shape
 * states (and is the only one fast CBC accepts), while the
 * per-projection variant evaluates each weighted projection directly.
 */
pub enum LatticeFigure {
    CoordUniform {
        kernel: Kernel,
        weights: Weights,
        power_scale: f64,
        q: f64,
    },
    PerProjection {
        kernel: Kernel,
        weights: Weights,
        power_scale: f64,
        q: f64,
    },
}

impl LatticeFigure {
    fn parts(&self) -> (&Kernel, &Weights, f64, f64) {
        match self {
            LatticeFigure::CoordUniform {
                kernel,
                weights,
                power_scale,
                q,
            }
            | LatticeFigure::PerProjection {
                kernel,
                weights,
                power_scale,
                q,
            } => (kernel, weights, *power_scale, *q),
        }
    }

    fn validate(&self, space_dyadic: bool) -> Result<()> {
        let (kernel, weights, _, q) = self.parts();
        kernel.validate()?;
        if kernel.is_dyadic() != space_dyadic {
            return Err(Error::Configuration(format!(
                "kernel {} does not match the lattice family",
                kernel.name()
            )));
        }
        if !(q >= 1.0) {
            return Err(Error::NumericDomain(format!(
                "norm exponent must be at least 1, got {}",
                q
            )));
        }
        weights.max_card()?;
        Ok(())
    }

    pub fn name(&self) -> String {
        let (kernel, _, _, _) = self.parts();
        match self {
            LatticeFigure::CoordUniform { .. } => format!("CU:{}", kernel.name()),
            LatticeFigure::PerProjection { .. } => kernel.name(),
        }
    }
}

/** A rank-1 lattice: its generating vector and merit report. */
pub struct RankOneLattice<S: LatticeSpace> {
    pub gens: Vec<S::Gen>,
    pub n: usize,
}

impl<S: LatticeSpace> RankOneLattice<S> {
    pub fn format(&self, format: OutputFormat) -> String {
        let mut out = String::new();
        if format == OutputFormat::Human {
            let _ = writeln!(out, "{}  // Number of points", self.n);
            let _ = writeln!(out, "{}  // Dimension", self.gens.len());
        }
        for g in &self.gens {
            let _ = writeln!(out, "{}", S::format_gen(g, format));
        }
        out
    }
}

/* ***********************************************************************
 * Lattice search driver
 ***********************************************************************/

/** Search task over one lattice space and figure. */
pub struct LatticeSearch<S: LatticeSpace> {
    space: S,
    dimension: usize,
    figure: LatticeFigure,
    early_abortion: bool,
}

impl<S: LatticeSpace> LatticeSearch<S> {
    pub fn new(space: S, dimension: usize, figure: LatticeFigure) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration("search needs at least one coordinate".into()));
        }
        figure.validate(space.wants_dyadic_kernel())?;
        Ok(LatticeSearch {
            space,
            dimension,
            figure,
            early_abortion: false,
        })
    }

    pub fn with_early_abortion(mut self, on: bool) -> Self {
        self.early_abortion = on;
        self
    }

    fn exponent(&self) -> f64 {
        let (kernel, _, power_scale, _) = self.figure.parts();
        power_scale * kernel.cu_power()
    }

    /** Merit of a full generating vector. */
    pub fn evaluate(
        &self,
        gens: &[S::Gen],
        observer: &mut dyn ProgressObserver,
    ) -> Result<f64> {
        let (kernel, weights, _, q) = self.figure.parts();
        let table = self.space.kernel_table(kernel);
        match self.figure {
            LatticeFigure::CoordUniform { .. } => {
                let mut cu = CuState::new(weights, self.exponent(), self.space.n(), 1)?;
                let mut sum = 0.0;
                for g in gens {
                    let row = self.space.kernel_row(g, &table);
                    sum += mean_dot(&row, &cu.weighted_state());
                    if !observer.on_progress(sum.max(0.0).powf(1.0 / q)) {
                        observer.on_abort();
                        return Err(Error::Aborted);
                    }
                    cu.update(&row);
                }
                Ok(sum.max(0.0).powf(1.0 / q))
            }
            LatticeFigure::PerProjection { .. } => {
                let n = self.space.n();
                let rows: Vec<Vec<f64>> =
                    gens.iter().map(|g| self.space.kernel_row(g, &table)).collect();
                let exponent = self.exponent();
                let mut sum = 0.0;
                for coord in 0..gens.len() {
                    // projections whose largest coordinate is `coord`
                    for sub in 0u64..1 << coord {
                        let proj = sub | 1 << coord;
                        let gamma = weights.weight(proj);
                        let gamma = if gamma == 0.0 {
                            0.0
                        } else {
                            gamma.powf(exponent)
                        };
                        if gamma == 0.0 {
                            continue;
                        }
                        let mut acc = 0.0;
                        for i in 0..n {
                            let mut prod = 1.0;
                            for j in proj_coords(proj) {
                                prod *= rows[j][i];
                            }
                            acc += prod;
                        }
                        sum += gamma * acc / n as f64;
                    }
                    if !observer.on_progress(sum.max(0.0).powf(1.0 / q)) {
                        observer.on_abort();
                        return Err(Error::Aborted);
                    }
                }
                Ok(sum.max(0.0).powf(1.0 / q))
            }
        }
    }

    /** Evaluate every combination of candidate values. */
    pub fn exhaustive(&self) -> Result<SearchResult<RankOneLattice<S>>> {
        let mut observer = MinimumObserver::new(self.early_abortion);
        let units = self.space.unit_space();
        let mut state = vec![0usize; self.dimension - 1];
        let mut done = false;
        while !done {
            let mut gens = vec![self.space.trivial_gen()];
            gens.extend(state.iter().map(|&i| units[i].clone()));
            match self.evaluate(&gens, &mut observer) {
                Ok(merit) => {
                    observer.observe(RankOneLattice { gens, n: self.space.n() }, merit);
                }
                Err(Error::Aborted) => {}
                Err(e) => return Err(e),
            }
            let mut slot = 0;
            loop {
                if slot == state.len() {
                    done = true;
                    break;
                }
                state[slot] += 1;
                if state[slot] < units.len() {
                    break;
                }
                state[slot] = 0;
                slot += 1;
            }
        }
        finish(observer)
    }

    /** Evaluate randomly sampled generating vectors. */
    pub fn random(&self, nb_tries: usize, seed: u64) -> Result<SearchResult<RankOneLattice<S>>> {
        let mut observer = MinimumObserver::new(self.early_abortion);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..nb_tries {
            let mut gens = vec![self.space.trivial_gen()];
            for _ in 1..self.dimension {
                gens.push(self.space.sample_unit(&mut rng));
            }
            match self.evaluate(&gens, &mut observer) {
                Ok(merit) => {
                    observer.observe(RankOneLattice { gens, n: self.space.n() }, merit);
                }
                Err(Error::Aborted) => {}
                Err(e) => return Err(e),
            }
        }
        finish(observer)
    }

    /** Plain component-by-component search. */
    pub fn cbc(&self) -> Result<SearchResult<RankOneLattice<S>>> {
        let (kernel, weights, _, q) = self.figure.parts();
        if !matches!(self.figure, LatticeFigure::CoordUniform { .. }) {
            // fall back to evaluating whole vectors per candidate
            return self.cbc_per_projection();
        }
        let table = self.space.kernel_table(kernel);
        let mut cu = CuState::new(weights, self.exponent(), self.space.n(), 1)?;
        let mut sum = 0.0;
        let mut gens: Vec<S::Gen> = Vec::new();
        let mut aborted = 0;
        for coord in 0..self.dimension {
            let candidates = if coord == 0 {
                vec![self.space.trivial_gen()]
            } else {
                self.space.unit_space()
            };
            let ws = cu.weighted_state();
            let mut best: Option<(S::Gen, f64)> = None;
            let mut observer: MinimumObserver<()> = MinimumObserver::new(self.early_abortion);
            for g in candidates {
                let gain = mean_dot(&self.space.kernel_row(&g, &table), &ws);
                let partial = (sum + gain).max(0.0).powf(1.0 / q);
                if !observer.on_progress(partial) {
                    observer.on_abort();
                    aborted += 1;
                    continue;
                }
                if observer.observe((), partial) {
                    best = Some((g, gain));
                }
            }
            let (g, gain) = best.ok_or(Error::NoCandidate)?;
            sum += gain;
            cu.update(&self.space.kernel_row(&g, &table));
            gens.push(g);
        }
        Ok(SearchResult {
            net: RankOneLattice { gens, n: self.space.n() },
            merit: sum.max(0.0).powf(1.0 / self.figure.parts().3),
            aborted_candidates: aborted,
        })
    }

    fn cbc_per_projection(&self) -> Result<SearchResult<RankOneLattice<S>>> {
        let mut gens = vec![self.space.trivial_gen()];
        let mut merit = f64::INFINITY;
        let mut aborted = 0;
        for _coord in 1..self.dimension {
            let mut best: Option<(S::Gen, f64)> = None;
            let mut observer: MinimumObserver<()> = MinimumObserver::new(self.early_abortion);
            for g in self.space.unit_space() {
                let mut candidate = gens.clone();
                candidate.push(g.clone());
                match self.evaluate(&candidate, &mut observer) {
                    Ok(m) => {
                        if observer.observe((), m) {
                            best = Some((g, m));
                        }
                    }
                    Err(Error::Aborted) => aborted += 1,
                    Err(e) => return Err(e),
                }
            }
            let (g, m) = best.ok_or(Error::NoCandidate)?;
            gens.push(g);
            merit = m;
        }
        if self.dimension == 1 {
            merit = self.evaluate(&gens, &mut MinimumObserver::<()>::new(false))?;
        }
        Ok(SearchResult {
            net: RankOneLattice { gens, n: self.space.n() },
            merit,
            aborted_candidates: aborted,
        })
    }

    /** Fast CBC: per coordinate, score all candidates at once by
     * correlation over the unit group.  Only coordinate-uniform
     * figures support this.
     */
    pub fn fast_cbc(&self) -> Result<SearchResult<RankOneLattice<S>>> {
        let (kernel, weights, _, q) = self.figure.parts();
        if !matches!(self.figure, LatticeFigure::CoordUniform { .. }) {
            return Err(Error::Configuration(
                "fast CBC is implemented only for coordinate-uniform figures of merit".into(),
            ));
        }
        let table = self.space.kernel_table(kernel);
        let mut cu = CuState::new(weights, self.exponent(), self.space.n(), 1)?;
        let mut sum = 0.0;
        let mut gens: Vec<S::Gen> = Vec::new();
        for coord in 0..self.dimension {
            let ws = cu.weighted_state();
            let (g, gain) = if coord == 0 {
                let g = self.space.trivial_gen();
                let gain = mean_dot(&self.space.kernel_row(&g, &table), &ws);
                (g, gain)
            } else {
                let gains = self.space.fast_cbc_gains(&ws, &table)?;
                let units = self.space.unit_space();
                let mut best = 0;
                for (i, &gain) in gains.iter().enumerate() {
                    if gain < gains[best] {
                        best = i;
                    }
                }
                (units[best].clone(), gains[best])
            };
            sum += gain;
            cu.update(&self.space.kernel_row(&g, &table));
            gens.push(g);
        }
        Ok(SearchResult {
            net: RankOneLattice { gens, n: self.space.n() },
            merit: sum.max(0.0).powf(1.0 / q),
            aborted_candidates: 0,
        })
    }
}

fn finish<S: LatticeSpace>(
    observer: MinimumObserver<RankOneLattice<S>>,
) -> Result<SearchResult<RankOneLattice<S>>> {
    let (net, merit, aborted_candidates) = observer.into_best()?;
    Ok(SearchResult {
        net,
        merit,
        aborted_candidates,
    })
}
