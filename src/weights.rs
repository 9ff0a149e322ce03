/*
 * @file weights.rs
 *
 * Weights on coordinate projections.  A projection is a subset of
 * coordinate axes, packed as a bitmask; a weights object assigns each
 * projection a non-negative importance, factoring according to one of
 * the recognized shapes: product, order-dependent, POD,
 * projection-dependent, or a combined sum of those.
 */

use crate::error::{Error, Result};
use std::collections::HashMap;

/** A set of coordinate axes, bit j for coordinate j. */
pub type Projection = u64;

/** Number of coordinates in a projection. */
#[inline(always)]
pub fn proj_card(proj: Projection) -> usize {
    proj.count_ones() as usize
}

/** Iterate the coordinates of a projection in increasing order. */
pub fn proj_coords(proj: Projection) -> impl Iterator<Item = usize> {
    (0..64).filter(move |j| proj >> j & 1 != 0)
}

/** Map an interlaced projection to the projection of real coordinates:
 * interlaced coordinate j belongs to real coordinate j / factor.
 */
pub fn deinterlace(proj: Projection, factor: usize) -> Projection {
    if factor <= 1 {
        return proj;
    }
    proj_coords(proj).fold(0, |acc, j| acc | 1 << (j / factor))
}

/** Product weights: gamma(P) = prod over j in P of gamma_j. */
#[derive(Clone, Debug, Default)]
pub struct ProductWeights {
    pub weights: Vec<f64>,
    pub default_weight: f64,
}

impl ProductWeights {
    pub fn new(weights: Vec<f64>) -> Self {
        ProductWeights {
            weights,
            default_weight: 0.0,
        }
    }

    pub fn weight_for_coordinate(&self, j: usize) -> f64 {
        self.weights.get(j).copied().unwrap_or(self.default_weight)
    }
}

/** Order-dependent weights: gamma(P) = Gamma_|P|. */
#[derive(Clone, Debug, Default)]
pub struct OrderDependentWeights {
    /** weights[k-1] is the weight of order k. */
    pub weights: Vec<f64>,
    pub default_weight: f64,
}

impl OrderDependentWeights {
    pub fn new(weights: Vec<f64>) -> Self {
        OrderDependentWeights {
            weights,
            default_weight: 0.0,
        }
    }

    pub fn weight_for_order(&self, order: usize) -> f64 {
        if order == 0 {
            return 0.0;
        }
        self.weights
            .get(order - 1)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/** POD weights: gamma(P) = Gamma_|P| * prod over j in P of gamma_j. */
#[derive(Clone, Debug, Default)]
pub struct PodWeights {
    pub order: OrderDependentWeights,
    pub product: ProductWeights,
}

/** Explicitly listed per-projection weights; zero when not listed. */
#[derive(Clone, Debug, Default)]
pub struct ProjectionDependentWeights {
    pub weights: HashMap<Projection, f64>,
}

impl ProjectionDependentWeights {
    pub fn set_weight(&mut self, proj: Projection, weight: f64) {
        self.weights.insert(proj, weight);
    }
}

/** Weights on projections, one variant per recognized shape. */
#[derive(Clone, Debug)]
pub enum Weights {
    Product(ProductWeights),
    OrderDependent(OrderDependentWeights),
    Pod(PodWeights),
    ProjectionDependent(ProjectionDependentWeights),
    Combined(Vec<Weights>),
}

impl Weights {
    /** The weight of a projection. */
    pub fn weight(&self, proj: Projection) -> f64 {
        match self {
            Weights::Product(w) => proj_coords(proj)
                .map(|j| w.weight_for_coordinate(j))
                .product(),
            Weights::OrderDependent(w) => w.weight_for_order(proj_card(proj)),
            Weights::Pod(w) => {
                w.order.weight_for_order(proj_card(proj))
                    * proj_coords(proj)
                        .map(|j| w.product.weight_for_coordinate(j))
                        .product::<f64>()
            }
            Weights::ProjectionDependent(w) => w.weights.get(&proj).copied().unwrap_or(0.0),
            Weights::Combined(list) => list.iter().map(|w| w.weight(proj)).sum(),
        }
    }

    /** Maximal order of projections that can carry a non-zero weight.
     *
     * A positive default weight would give every projection weight and
     * make the supported order unbounded; that is a configuration
     * error, never a silent cap.
     */
    pub fn max_card(&self) -> Result<usize> {
        fn last_nonzero(weights: &[f64]) -> usize {
            weights
                .iter()
                .rposition(|&w| w != 0.0)
                .map_or(0, |i| i + 1)
        }
        match self {
            Weights::Product(w) => {
                if w.default_weight > 0.0 {
                    return Err(Error::Configuration(
                        "product weights with a positive default weight are unbounded".into(),
                    ));
                }
                Ok(last_nonzero(&w.weights))
            }
            Weights::OrderDependent(w) => {
                if w.default_weight > 0.0 {
                    return Err(Error::Configuration(
                        "order-dependent weights with a positive default weight are unbounded"
                            .into(),
                    ));
                }
                Ok(last_nonzero(&w.weights))
            }
            Weights::Pod(w) => {
                let order_max = Weights::OrderDependent(w.order.clone()).max_card()?;
                match Weights::Product(w.product.clone()).max_card() {
                    Ok(product_max) => Ok(order_max.min(product_max)),
                    Err(_) => Ok(order_max),
                }
            }
            Weights::ProjectionDependent(w) => Ok(w
                .weights
                .iter()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(&p, _)| proj_card(p))
                .max()
                .unwrap_or(0)),
            Weights::Combined(list) => {
                let mut best = 0;
                for w in list {
                    best = best.max(w.max_card()?);
                }
                Ok(best)
            }
        }
    }
}
