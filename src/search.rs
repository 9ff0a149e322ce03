/*
 * @file search.rs
 *
 * Exploration drivers over digital nets: exhaustive, random, and
 * component-by-component.  A driver enumerates candidate generating
 * values, materializes nets, hands them to a figure of merit, and
 * tracks the minimum through an observer that can also veto candidates
 * early (early abortion).
 */

use crate::error::{Error, Result};
use crate::figure::{FigureOfMerit, ProgressObserver};
use crate::net::{CartesianProduct, DigitalNet, Embedding, NetConstruction};
use rand::rngs::StdRng;
use rand::SeedableRng;

/** Best-so-far tracker and early-abortion hook.
 *
 * As a progress observer it aborts a candidate as soon as its partial
 * merit reaches the best complete merit seen so far (when early
 * abortion is enabled); an aborted or infinite-merit candidate is never
 * recorded.  Ties keep the first-seen candidate.
 */
pub struct MinimumObserver<T> {
    best_candidate: Option<T>,
    best_merit: Option<f64>,
    early_abortion: bool,
    aborted: usize,
}

impl<T> MinimumObserver<T> {
    pub fn new(early_abortion: bool) -> Self {
        MinimumObserver {
            best_candidate: None,
            best_merit: None,
            early_abortion,
            aborted: 0,
        }
    }

    /** Record a fully evaluated candidate; true if it became the best. */
    pub fn observe(&mut self, candidate: T, merit: f64) -> bool {
        if !merit.is_finite() {
            return false;
        }
        let better = self.best_merit.map_or(true, |best| merit < best);
        if better {
            self.best_merit = Some(merit);
            self.best_candidate = Some(candidate);
        }
        better
    }

    pub fn best_merit(&self) -> Option<f64> {
        self.best_merit
    }

    /** Number of candidates dropped by early abortion. */
    pub fn aborted_count(&self) -> usize {
        self.aborted
    }

    pub fn has_found(&self) -> bool {
        self.best_candidate.is_some()
    }

    /** The recorded minimum; `NoCandidate` if nothing ever finished. */
    pub fn into_best(self) -> Result<(T, f64, usize)> {
        match (self.best_candidate, self.best_merit) {
            (Some(c), Some(m)) => Ok((c, m, self.aborted)),
            _ => Err(Error::NoCandidate),
        }
    }

    /** Seed the incumbent merit without a candidate, so that early
     * abortion prunes against an externally known bound.
     */
    pub fn set_merit_bound(&mut self, merit: f64) {
        self.best_merit = Some(merit);
    }
}

impl<T> ProgressObserver for MinimumObserver<T> {
    fn on_progress(&mut self, partial_merit: f64) -> bool {
        if !self.early_abortion {
            return true;
        }
        self.best_merit.map_or(true, |best| partial_merit < best)
    }

    fn on_abort(&mut self) {
        self.aborted += 1;
    }
}

/** Outcome of a search: the winning net and its merit. */
pub struct SearchResult<N> {
    pub net: N,
    pub merit: f64,
    pub aborted_candidates: usize,
}

/** Search task over one construction method and figure of merit. */
pub struct NetSearch<C: NetConstruction> {
    size: C::SizeParam,
    dimension: usize,
    embedding: Embedding,
    early_abortion: bool,
    merit_bound: Option<f64>,
}

impl<C: NetConstruction> NetSearch<C> {
    pub fn new(size: C::SizeParam, dimension: usize, embedding: Embedding) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration("search needs at least one coordinate".into()));
        }
        Ok(NetSearch {
            size,
            dimension,
            embedding,
            early_abortion: false,
            merit_bound: None,
        })
    }

    /** Abort candidates whose partial merit reaches the best so far. */
    pub fn with_early_abortion(mut self, on: bool) -> Self {
        self.early_abortion = on;
        self
    }

    /** Seed the incumbent merit, so early abortion also prunes against
     * an externally known bound.
     */
    pub fn with_merit_bound(mut self, bound: f64) -> Self {
        self.merit_bound = Some(bound);
        self
    }

    fn fresh_observer<T>(&self) -> MinimumObserver<T> {
        let mut observer = MinimumObserver::new(self.early_abortion);
        if let Some(bound) = self.merit_bound {
            observer.set_merit_bound(bound);
        }
        observer
    }

    /** Evaluate every combination of per-coordinate generating values. */
    pub fn exhaustive<F: FigureOfMerit>(&self, figure: &F) -> Result<SearchResult<DigitalNet<C>>> {
        let mut observer = self.fresh_observer();
        let spaces: Vec<Vec<C::GenValue>> = (0..self.dimension)
            .map(|coord| C::value_space_coord(coord, &self.size).collect())
            .collect();
        for combo in CartesianProduct::new(spaces) {
            let net = DigitalNet::<C>::new(self.size.clone(), combo)?;
            self.try_candidate(figure, net, &mut observer)?;
        }
        finish(observer)
    }

    /** Evaluate `nb_tries` randomly sampled candidates; deterministic
     * for a fixed seed.
     */
    pub fn random<F: FigureOfMerit>(
        &self,
        figure: &F,
        nb_tries: usize,
        seed: u64,
    ) -> Result<SearchResult<DigitalNet<C>>> {
        let mut observer = self.fresh_observer();
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..nb_tries {
            let values: Vec<C::GenValue> = (0..self.dimension)
                .map(|coord| C::sample_random(coord, &self.size, self.embedding, &mut rng))
                .collect();
            let net = DigitalNet::<C>::new(self.size.clone(), values)?;
            self.try_candidate(figure, net, &mut observer)?;
        }
        finish(observer)
    }

    /** Component-by-component: fix the best prefix and optimize one
     * coordinate at a time over its value space, in value-space order;
     * equal merits keep the earlier candidate.
     */
    pub fn cbc<F: FigureOfMerit>(&self, figure: &F) -> Result<SearchResult<DigitalNet<C>>> {
        let mut prefix = DigitalNet::<C>::placeholder(self.size.clone());
        let mut prefix_state = figure.init_state(&prefix)?;
        let mut merit = f64::INFINITY;
        let mut aborted_total = 0;

        for coord in 0..self.dimension {
            let mut observer = self.fresh_observer();
            let mut best: Option<(DigitalNet<C>, F::State, f64)> = None;
            for value in C::value_space_coord(coord, &self.size) {
                let net = prefix.extend_dimension(value)?;
                let mut state = prefix_state.clone();
                match figure.add_coordinate(&mut state, &net, &mut observer) {
                    Ok(partial) => {
                        if observer.observe((), partial) {
                            best = Some((net, state, partial));
                        }
                    }
                    Err(Error::Aborted) => {}
                    Err(e) => return Err(e),
                }
            }
            aborted_total += observer.aborted_count();
            match best {
                Some((net, state, m)) => {
                    prefix = net;
                    prefix_state = state;
                    merit = m;
                }
                None => return Err(Error::NoCandidate),
            }
        }
        Ok(SearchResult {
            net: prefix,
            merit,
            aborted_candidates: aborted_total,
        })
    }

    fn try_candidate<F: FigureOfMerit>(
        &self,
        figure: &F,
        net: DigitalNet<C>,
        observer: &mut MinimumObserver<DigitalNet<C>>,
    ) -> Result<()> {
        match figure.evaluate(&net, observer) {
            Ok(merit) => {
                observer.observe(net, merit);
                Ok(())
            }
            // an aborted candidate is an unsuccessful candidate, never
            // a search failure
            Err(Error::Aborted) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn finish<N>(observer: MinimumObserver<N>) -> Result<SearchResult<N>> {
    let (net, merit, aborted_candidates) = observer.into_best()?;
    Ok(SearchResult {
        net,
        merit,
        aborted_candidates,
    })
}
