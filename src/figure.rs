/*
 * @file figure.rs
 *
 * Figures of merit over digital nets.
 *
 * Two families: the weighted t-value figure, which scores each weighted
 * projection by the quality parameter of the projected net, and
 * coordinate-uniform figures, which sum a univariate kernel over points
 * and projections through an incremental per-coordinate state.
 *
 * An evaluation walks coordinates one at a time; after every step the
 * running partial merit (a lower bound on the final value) is published
 * to the observer, which may abort the candidate.
 */

use crate::error::{Error, Result};
use crate::filters::MeritFilterList;
use crate::gf2::GF2Matrix;
use crate::kernel::Kernel;
use crate::net::Net;
use crate::tvalue::{t_value, t_value_sequence};
use crate::weights::{deinterlace, proj_coords, ProductWeights, Projection, Weights};
use std::collections::HashMap;

/* ***********************************************************************
 * Observer hook
 ***********************************************************************/

/** Progress/abort hook invoked at cooperative points of an evaluation. */
pub trait ProgressObserver {
    /** Publish a partial merit; returning false aborts the candidate. */
    fn on_progress(&mut self, partial_merit: f64) -> bool;
    /** Called once when the evaluation gets aborted. */
    fn on_abort(&mut self);
}

/** Observer that never aborts. */
pub struct NoAbort;

impl ProgressObserver for NoAbort {
    fn on_progress(&mut self, _partial_merit: f64) -> bool {
        true
    }
    fn on_abort(&mut self) {}
}

/* ***********************************************************************
 * Outer norm
 ***********************************************************************/

/** Norm exponent q in [1, inf] applied across projections. */
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OuterNorm {
    Lq(f64),
    Max,
}

impl OuterNorm {
    pub fn validate(&self) -> Result<()> {
        match *self {
            OuterNorm::Lq(q) if !(q >= 1.0) => Err(Error::NumericDomain(format!(
                "norm exponent must be at least 1, got {}",
                q
            ))),
            _ => Ok(()),
        }
    }

    fn accumulate(&self, acc: &mut f64, term: f64) {
        match *self {
            OuterNorm::Lq(q) => *acc += term.powf(q),
            OuterNorm::Max => *acc = acc.max(term),
        }
    }

    fn finalize(&self, acc: f64) -> f64 {
        match *self {
            OuterNorm::Lq(q) => acc.max(0.0).powf(1.0 / q),
            OuterNorm::Max => acc,
        }
    }
}

/** Weight raised to an exponent, with 0 staying 0. */
fn wpow(w: f64, e: f64) -> f64 {
    if w == 0.0 {
        0.0
    } else {
        w.powf(e)
    }
}

/** All subsets of {0..universe} of the given cardinality. */
fn subsets(universe: usize, card: usize) -> Vec<Projection> {
    fn rec(start: usize, universe: usize, left: usize, cur: Projection, out: &mut Vec<Projection>) {
        if left == 0 {
            out.push(cur);
            return;
        }
        for j in start..universe {
            if universe - j < left {
                break;
            }
            rec(j + 1, universe, left - 1, cur | 1 << j, out);
        }
    }
    let mut out = Vec::new();
    rec(0, universe, card, 0, &mut out);
    out
}

/* ***********************************************************************
 * Figure-of-merit contract
 ***********************************************************************/

/** A figure of merit evaluated coordinate by coordinate.
 *
 * The state starts idle, moves through building as coordinates are
 * added, and completes when the last coordinate's partial merit is
 * taken as the figure value; an observer veto aborts the evaluation,
 * dropping the state and surfacing `Error::Aborted`.
 */
pub trait FigureOfMerit {
    type State: Clone;

    fn init_state(&self, net: &dyn Net) -> Result<Self::State>;

    /** Fold the next coordinate into the state and return the partial
     * merit, which never decreases as coordinates are added.
     */
    fn add_coordinate(
        &self,
        state: &mut Self::State,
        net: &dyn Net,
        observer: &mut dyn ProgressObserver,
    ) -> Result<f64>;

    fn name(&self) -> String;

    /** Evaluate the whole net. */
    fn evaluate(&self, net: &dyn Net, observer: &mut dyn ProgressObserver) -> Result<f64> {
        let mut state = self.init_state(net)?;
        let mut merit = 0.0;
        for _ in 0..net.dimension() {
            merit = self.add_coordinate(&mut state, net, observer)?;
        }
        Ok(merit)
    }
}

/* ***********************************************************************
 * Weighted t-value figure
 ***********************************************************************/

/** Weighted t-value figure: the q-norm over weighted projections of
 * the projected nets' t-values.
 */
pub struct WeightedTValueFigure {
    weights: Weights,
    power_scale: f64,
    norm: OuterNorm,
    interlacing: usize,
    max_card: usize,
}

impl WeightedTValueFigure {
    pub fn new(
        weights: Weights,
        power_scale: f64,
        norm: OuterNorm,
        interlacing: usize,
    ) -> Result<Self> {
        norm.validate()?;
        let max_card = weights.max_card()?;
        Ok(WeightedTValueFigure {
            weights,
            power_scale,
            norm,
            interlacing: interlacing.max(1),
            max_card,
        })
    }

    /** Projections of {0..=coord} containing coord, smallest first,
     * capped at the interlaced cardinality bound.
     */
    fn projections_for(&self, coord: usize) -> Vec<Projection> {
        let cap = (self.max_card * self.interlacing).min(coord + 1);
        let mut out = Vec::new();
        for card in 1..=cap {
            for sub in subsets(coord, card - 1) {
                out.push(sub | 1 << coord);
            }
        }
        out
    }
}

#[derive(Clone, Default)]
pub struct TValueFigureState {
    acc: f64,
    t_by_proj: HashMap<Projection, usize>,
    dim: usize,
}

impl FigureOfMerit for WeightedTValueFigure {
    type State = TValueFigureState;

    fn init_state(&self, _net: &dyn Net) -> Result<TValueFigureState> {
        Ok(TValueFigureState::default())
    }

    fn add_coordinate(
        &self,
        state: &mut TValueFigureState,
        net: &dyn Net,
        observer: &mut dyn ProgressObserver,
    ) -> Result<f64> {
        let coord = state.dim;
        for proj in self.projections_for(coord) {
            let gamma = wpow(
                self.weights.weight(deinterlace(proj, self.interlacing)),
                self.power_scale,
            );
            if gamma == 0.0 {
                continue;
            }
            // lower bound from the already-computed sub-projections
            let max_sub = proj_coords(proj)
                .filter_map(|j| state.t_by_proj.get(&(proj & !(1 << j))))
                .copied()
                .max()
                .unwrap_or(0);
            let mats: Vec<&GF2Matrix> = proj_coords(proj).map(|j| net.matrix(j)).collect();
            let t = t_value(&mats, max_sub, None)?;
            state.t_by_proj.insert(proj, t);
            self.norm.accumulate(&mut state.acc, gamma * t as f64);
            let partial = self.norm.finalize(state.acc);
            if !observer.on_progress(partial) {
                observer.on_abort();
                return Err(Error::Aborted);
            }
        }
        state.dim += 1;
        Ok(self.norm.finalize(state.acc))
    }

    fn name(&self) -> String {
        "weighted t-value".into()
    }
}

/* ***********************************************************************
 * Embedded (multilevel) t-value figure
 ***********************************************************************/

/** Weighted t-value figure over all embedding levels, folded to one
 * value by a merit filter list.
 */
pub struct EmbeddedTValueFigure {
    weights: Weights,
    power_scale: f64,
    norm: OuterNorm,
    max_card: usize,
    pub filters: MeritFilterList,
}

impl EmbeddedTValueFigure {
    pub fn new(
        weights: Weights,
        power_scale: f64,
        norm: OuterNorm,
        filters: MeritFilterList,
    ) -> Result<Self> {
        norm.validate()?;
        let max_card = weights.max_card()?;
        Ok(EmbeddedTValueFigure {
            weights,
            power_scale,
            norm,
            max_card,
            filters,
        })
    }
}

#[derive(Clone, Default)]
pub struct EmbeddedTValueState {
    acc: Vec<f64>,
    tseq_by_proj: HashMap<Projection, Vec<usize>>,
    dim: usize,
}

impl FigureOfMerit for EmbeddedTValueFigure {
    type State = EmbeddedTValueState;

    fn init_state(&self, net: &dyn Net) -> Result<EmbeddedTValueState> {
        Ok(EmbeddedTValueState {
            acc: vec![0.0; net.n_cols()],
            tseq_by_proj: HashMap::new(),
            dim: 0,
        })
    }

    fn add_coordinate(
        &self,
        state: &mut EmbeddedTValueState,
        net: &dyn Net,
        observer: &mut dyn ProgressObserver,
    ) -> Result<f64> {
        let coord = state.dim;
        let n_levels = net.n_cols();
        let cap = self.max_card.min(coord + 1);
        for card in 1..=cap {
            for sub in subsets(coord, card - 1) {
                let proj = sub | 1 << coord;
                let gamma = wpow(self.weights.weight(proj), self.power_scale);
                if gamma == 0.0 {
                    continue;
                }
                let mut max_sub = vec![0usize; n_levels];
                for j in proj_coords(proj) {
                    if let Some(sub_seq) = state.tseq_by_proj.get(&(proj & !(1 << j))) {
                        for (m, &t) in max_sub.iter_mut().zip(sub_seq) {
                            *m = (*m).max(t);
                        }
                    }
                }
                let mats: Vec<&GF2Matrix> = proj_coords(proj).map(|j| net.matrix(j)).collect();
                let tseq = t_value_sequence(&mats, 0, &max_sub, None)?;
                for (acc, &t) in state.acc.iter_mut().zip(&tseq) {
                    self.norm.accumulate(acc, gamma * t as f64);
                }
                state.tseq_by_proj.insert(proj, tseq);
            }
        }
        state.dim += 1;
        let per_level: Vec<f64> = state.acc.iter().map(|&a| self.norm.finalize(a)).collect();
        let partial = self.filters.apply(&per_level, state.dim);
        if !observer.on_progress(partial) {
            observer.on_abort();
            return Err(Error::Aborted);
        }
        Ok(partial)
    }

    fn name(&self) -> String {
        "embedded weighted t-value".into()
    }
}

/* ***********************************************************************
 * Coordinate-uniform state recurrences
 ***********************************************************************/

/** Elementwise dot product scaled by the vector length. */
pub(crate) fn mean_dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() / a.len() as f64
}

/** Incremental per-coordinate state of a coordinate-uniform sum, one
 * variant per weight shape.
 *
 * Writing omega_j for the kernel values of coordinate j, the state
 * after s coordinates suffices to produce the weighted state vector q_s
 * such that adding coordinate s+1 increases the figure by
 * mean over points of omega_{s+1} * q_s.  Interlaced figures group
 * coordinates into blocks of `interlacing` consecutive coordinates
 * sharing one real coordinate's weight.
 */
#[derive(Clone)]
pub enum CuState {
    Product(ProductState),
    OrderLike(OrderLikeState),
    ProjDependent(ProjDepState),
    Combined(Vec<CuState>),
}

#[derive(Clone)]
pub struct ProductState {
    weights: ProductWeights,
    exponent: f64,
    e: usize,
    /** Product over completed blocks of (1 + gamma_b (t_b - 1)). */
    p: Vec<f64>,
    /** Product of (1 + omega_j) over the open block. */
    t: Vec<f64>,
    dim: usize,
}

#[derive(Clone)]
pub struct OrderLikeState {
    /** Gamma_{l+1}^exponent for l = 0..depth-1. */
    orders: Vec<f64>,
    /** Product part; ones for purely order-dependent weights. */
    product: Option<ProductWeights>,
    exponent: f64,
    e: usize,
    /** p[l]: order-l elementary symmetric sums over completed blocks. */
    p: Vec<Vec<f64>>,
    t: Vec<f64>,
    dim: usize,
}

#[derive(Clone)]
pub struct ProjDepState {
    /** Listed projections with effective weights. */
    weights: Vec<(Projection, f64)>,
    /** Partial products over the listed projections' prefixes. */
    states: HashMap<Projection, Vec<f64>>,
    dim: usize,
}

impl CuState {
    /** Build the state for n points; `exponent` is the effective power
     * applied to every weight (power scale times the kernel's CU
     * power), and `interlacing` the block size.
     */
    pub fn new(
        weights: &Weights,
        exponent: f64,
        n: usize,
        interlacing: usize,
    ) -> Result<CuState> {
        let e = interlacing.max(1);
        match weights {
            Weights::Product(w) => Ok(CuState::Product(ProductState {
                weights: w.clone(),
                exponent,
                e,
                p: vec![1.0; n],
                t: vec![1.0; n],
                dim: 0,
            })),
            Weights::OrderDependent(w) => {
                let depth = Weights::OrderDependent(w.clone()).max_card()?;
                let orders = (1..=depth)
                    .map(|k| wpow(w.weight_for_order(k), exponent))
                    .collect();
                Ok(CuState::OrderLike(OrderLikeState {
                    orders,
                    product: None,
                    exponent,
                    e,
                    p: state_layers(depth, n),
                    t: vec![1.0; n],
                    dim: 0,
                }))
            }
            Weights::Pod(w) => {
                let depth = Weights::OrderDependent(w.order.clone()).max_card()?;
                let orders = (1..=depth)
                    .map(|k| wpow(w.order.weight_for_order(k), exponent))
                    .collect();
                Ok(CuState::OrderLike(OrderLikeState {
                    orders,
                    product: Some(w.product.clone()),
                    exponent,
                    e,
                    p: state_layers(depth, n),
                    t: vec![1.0; n],
                    dim: 0,
                }))
            }
            Weights::ProjectionDependent(w) => {
                if e > 1 {
                    return Err(Error::Configuration(
                        "projection-dependent weights do not support interlacing".into(),
                    ));
                }
                let mut states = HashMap::new();
                states.insert(0, vec![1.0; n]);
                Ok(CuState::ProjDependent(ProjDepState {
                    weights: w
                        .weights
                        .iter()
                        .map(|(&p, &v)| (p, wpow(v, exponent)))
                        .filter(|&(_, v)| v != 0.0)
                        .collect(),
                    states,
                    dim: 0,
                }))
            }
            Weights::Combined(list) => Ok(CuState::Combined(
                list.iter()
                    .map(|w| CuState::new(w, exponent, n, interlacing))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    /** The weighted state vector for the coordinate about to be added. */
    pub fn weighted_state(&self) -> Vec<f64> {
        match self {
            CuState::Product(s) => {
                let gamma = wpow(
                    s.weights.weight_for_coordinate(s.dim / s.e),
                    s.exponent,
                );
                s.p.iter().zip(&s.t).map(|(p, t)| gamma * p * t).collect()
            }
            CuState::OrderLike(s) => {
                let block = s.dim / s.e;
                let gamma = match &s.product {
                    Some(w) => wpow(w.weight_for_coordinate(block), s.exponent),
                    None => 1.0,
                };
                let top = block.min(s.orders.len().saturating_sub(1));
                let n = s.t.len();
                let mut out = vec![0.0; n];
                for l in 0..=top {
                    if s.orders.len() <= l || s.orders[l] == 0.0 {
                        continue;
                    }
                    for i in 0..n {
                        out[i] += s.orders[l] * s.p[l][i];
                    }
                }
                for i in 0..n {
                    out[i] *= gamma * s.t[i];
                }
                out
            }
            CuState::ProjDependent(s) => {
                let n = s.states[&0].len();
                let mut out = vec![0.0; n];
                for &(proj, gamma) in &s.weights {
                    if proj >> s.dim & 1 == 0 || proj >> s.dim >> 1 != 0 {
                        continue; // coordinate s.dim must be the largest of proj
                    }
                    if let Some(prefix) = s.states.get(&(proj & !(1 << s.dim))) {
                        for i in 0..n {
                            out[i] += gamma * prefix[i];
                        }
                    }
                }
                out
            }
            CuState::Combined(list) => {
                let mut out = list[0].weighted_state();
                for s in &list[1..] {
                    for (o, v) in out.iter_mut().zip(s.weighted_state()) {
                        *o += v;
                    }
                }
                out
            }
        }
    }

    /** Fold in the kernel values of the coordinate just chosen. */
    pub fn update(&mut self, kernel_row: &[f64]) {
        match self {
            CuState::Product(s) => {
                for (t, w) in s.t.iter_mut().zip(kernel_row) {
                    *t *= 1.0 + w;
                }
                s.dim += 1;
                if s.dim % s.e == 0 {
                    let gamma = wpow(
                        s.weights.weight_for_coordinate((s.dim - 1) / s.e),
                        s.exponent,
                    );
                    for (p, t) in s.p.iter_mut().zip(s.t.iter_mut()) {
                        *p *= 1.0 + gamma * (*t - 1.0);
                        *t = 1.0;
                    }
                }
            }
            CuState::OrderLike(s) => {
                for (t, w) in s.t.iter_mut().zip(kernel_row) {
                    *t *= 1.0 + w;
                }
                s.dim += 1;
                if s.dim % s.e == 0 {
                    let block = (s.dim - 1) / s.e;
                    let gamma = match &s.product {
                        Some(w) => wpow(w.weight_for_coordinate(block), s.exponent),
                        None => 1.0,
                    };
                    for l in (1..s.p.len()).rev() {
                        let (lower, upper) = s.p.split_at_mut(l);
                        let prev = &lower[l - 1];
                        for i in 0..upper[0].len() {
                            upper[0][i] += gamma * (s.t[i] - 1.0) * prev[i];
                        }
                    }
                    for t in s.t.iter_mut() {
                        *t = 1.0;
                    }
                }
            }
            CuState::ProjDependent(s) => {
                let done: Projection = (1 << s.dim) - 1;
                let mut new_states = Vec::new();
                for &(proj, _) in &s.weights {
                    if proj >> s.dim & 1 == 0 {
                        continue;
                    }
                    let prefix = proj & done;
                    let grown = prefix | 1 << s.dim;
                    if !s.states.contains_key(&grown) {
                        if let Some(base) = s.states.get(&prefix) {
                            let vec: Vec<f64> = base
                                .iter()
                                .zip(kernel_row)
                                .map(|(b, w)| b * w)
                                .collect();
                            new_states.push((grown, vec));
                        }
                    }
                }
                for (k, v) in new_states {
                    s.states.insert(k, v);
                }
                s.dim += 1;
            }
            CuState::Combined(list) => {
                for s in list {
                    s.update(kernel_row);
                }
            }
        }
    }
}

fn state_layers(depth: usize, n: usize) -> Vec<Vec<f64>> {
    let mut layers = vec![vec![0.0; n]; depth + 1];
    layers[0] = vec![1.0; n];
    layers
}

/* ***********************************************************************
 * Coordinate-uniform figure over nets
 ***********************************************************************/

/** Coordinate-uniform figure of merit over a digital net. */
pub struct CoordUniformNetFigure {
    kernel: Kernel,
    weights: Weights,
    power_scale: f64,
    q: f64,
    interlacing: usize,
}

impl CoordUniformNetFigure {
    pub fn new(
        kernel: Kernel,
        weights: Weights,
        power_scale: f64,
        q: f64,
        interlacing: usize,
    ) -> Result<Self> {
        kernel.validate()?;
        if !kernel.is_dyadic() {
            return Err(Error::Configuration(format!(
                "kernel {} is for ordinary lattices, not nets",
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
        // surface unsupported weight/interlacing combinations up front
        CuState::new(&weights, 1.0, 1, interlacing)?;
        Ok(CoordUniformNetFigure {
            kernel,
            weights,
            power_scale,
            q,
            interlacing: interlacing.max(1),
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    fn exponent(&self) -> f64 {
        self.power_scale * self.kernel.cu_power()
    }

    fn kernel_row(&self, net: &dyn Net, coord: usize) -> Vec<f64> {
        net.coordinate_values(coord)
            .into_iter()
            .map(|x| self.kernel.eval(x))
            .collect()
    }

    /** Per-level merits of an embedded net: level l sums over the
     * first 2^l points, which the Gray-code traversal keeps in the
     * leading positions.
     */
    pub fn evaluate_per_level(&self, net: &dyn Net) -> Result<Vec<f64>> {
        let m = net.n_cols();
        let n = 1usize << m;
        let mut cu = CuState::new(&self.weights, self.exponent(), n, self.interlacing)?;
        let mut sums = vec![0.0; m];
        for coord in 0..net.dimension() {
            let row = self.kernel_row(net, coord);
            let ws = cu.weighted_state();
            for level in 1..=m {
                let nl = 1usize << level;
                sums[level - 1] += mean_dot(&row[..nl], &ws[..nl]);
            }
            cu.update(&row);
        }
        Ok(sums
            .into_iter()
            .map(|s| s.max(0.0).powf(1.0 / self.q))
            .collect())
    }
}

#[derive(Clone)]
pub struct CuNetState {
    cu: CuState,
    sum: f64,
    dim: usize,
}

impl FigureOfMerit for CoordUniformNetFigure {
    type State = CuNetState;

    fn init_state(&self, net: &dyn Net) -> Result<CuNetState> {
        Ok(CuNetState {
            cu: CuState::new(
                &self.weights,
                self.exponent(),
                net.num_points() as usize,
                self.interlacing,
            )?,
            sum: 0.0,
            dim: 0,
        })
    }

    fn add_coordinate(
        &self,
        state: &mut CuNetState,
        net: &dyn Net,
        observer: &mut dyn ProgressObserver,
    ) -> Result<f64> {
        let row = self.kernel_row(net, state.dim);
        let ws = state.cu.weighted_state();
        state.sum += mean_dot(&row, &ws);
        let partial = state.sum.max(0.0).powf(1.0 / self.q);
        if !observer.on_progress(partial) {
            observer.on_abort();
            return Err(Error::Aborted);
        }
        state.cu.update(&row);
        state.dim += 1;
        Ok(partial)
    }

    fn name(&self) -> String {
        format!("CU:{}", self.kernel.name())
    }
}
