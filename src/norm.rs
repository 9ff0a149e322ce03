/*
 * @file norm.rs
 *
 * Closed-form norm bound on the weighted P-alpha criterion (the SL10
 * bound), used by fast CBC and the merit filters to normalize or prune
 * candidates.  The weighted sum over projections specializes per weight
 * shape: a product over coordinates, a linear recurrence per order, an
 * explicit enumeration, or a two-layer dynamic program for POD.
 */

use crate::error::{Error, Result};
use crate::weights::{proj_card, Weights};

/** Riemann zeta for real s > 1, by Euler-Maclaurin summation. */
pub fn zeta(s: f64) -> f64 {
    assert!(s > 1.0, "zeta requires s > 1");
    const N: usize = 24;
    let mut sum = 0.0;
    for k in 1..N {
        sum += (k as f64).powf(-s);
    }
    let n = N as f64;
    sum += n.powf(1.0 - s) / (s - 1.0);
    sum += 0.5 * n.powf(-s);
    sum += s * n.powf(-s - 1.0) / 12.0;
    sum -= s * (s + 1.0) * (s + 2.0) * n.powf(-s - 3.0) / 720.0;
    sum += s * (s + 1.0) * (s + 2.0) * (s + 3.0) * (s + 4.0) * n.powf(-s - 5.0) / 30240.0;
    sum
}

/** The P-alpha SL10 bound.
 *
 * For a given lambda, the bound is
 * ( (1 / totient) * sum over projections of z^|P| * gamma(P)^(2 lambda / q) )^(1 / lambda)
 * with z = 2 zeta(alpha lambda); the caller minimizes over lambda.
 */
pub struct PAlphaSL10 {
    alpha: u32,
    weights: Weights,
    norm_type: f64,
}

impl PAlphaSL10 {
    pub fn new(alpha: u32, weights: Weights, norm_type: f64) -> Result<Self> {
        if alpha < 2 {
            return Err(Error::NumericDomain(
                "the SL10 bound requires alpha > 1".into(),
            ));
        }
        Ok(PAlphaSL10 {
            alpha,
            weights,
            norm_type,
        })
    }

    /** Bound value for one lambda in (1/alpha, 1]. */
    pub fn value(&self, lambda: f64, totient: u64, dimension: usize) -> f64 {
        let norm = 1.0 / totient as f64;
        let z = 2.0 * zeta(self.alpha as f64 * lambda);
        let val = sum_over_projections(&self.weights, self.norm_type, z, lambda, dimension);
        (norm * val).powf(1.0 / lambda)
    }

    /** Minimum of the bound over a grid of lambda values. */
    pub fn minimum(&self, totient: u64, dimension: usize) -> f64 {
        let lo = 1.0 / self.alpha as f64;
        (1..=32)
            .map(|i| lo + (1.0 - lo) * i as f64 / 32.0)
            .map(|lambda| self.value(lambda, totient, dimension))
            .fold(f64::INFINITY, f64::min)
    }
}

/** Weighted sum of z^|P| over projections of 1..=dimension, with the
 * weights raised to 2 lambda / norm_type; one specialization per
 * shape.
 */
fn sum_over_projections(
    weights: &Weights,
    norm_type: f64,
    z: f64,
    lambda: f64,
    dimension: usize,
) -> f64 {
    let exponent = lambda * 2.0 / norm_type;
    match weights {
        Weights::Product(w) => {
            let mut val = 1.0;
            for coord in 0..dimension {
                let weight = w.weight_for_coordinate(coord);
                if weight != 0.0 {
                    val *= 1.0 + z * weight.powf(exponent);
                }
            }
            val - 1.0
        }
        Weights::OrderDependent(w) => {
            let mut val = 0.0;
            let mut cumul = 1.0;
            for order in 1..=dimension {
                let weight = w.weight_for_order(order);
                cumul *= (dimension - order + 1) as f64 * z / order as f64;
                if weight != 0.0 {
                    val += cumul * weight.powf(exponent);
                }
            }
            val
        }
        Weights::ProjectionDependent(w) => w
            .weights
            .iter()
            .filter(|&(_, &weight)| weight != 0.0)
            .map(|(&proj, &weight)| z.powi(proj_card(proj) as i32) * weight.powf(exponent))
            .sum(),
        Weights::Pod(w) => {
            // states[k] accumulates the order-k elementary symmetric sum
            // of z * gamma_j^exponent
            let mut states = vec![1.0];
            for coord in 1..=dimension {
                let pweight = w.product.weight_for_coordinate(coord - 1).powf(exponent);
                states.push(0.0);
                for order in (1..states.len()).rev() {
                    states[order] += z * pweight * states[order - 1];
                }
            }
            (1..=dimension)
                .map(|order| w.order.weight_for_order(order).powf(exponent) * states[order])
                .sum()
        }
        Weights::Combined(list) => list
            .iter()
            .map(|w| sum_over_projections(w, norm_type, z, lambda, dimension))
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::{sum_over_projections, zeta, PAlphaSL10};
    use crate::weights::{
        OrderDependentWeights, PodWeights, ProductWeights, ProjectionDependentWeights, Weights,
    };
    use std::f64::consts::PI;

    #[test]
    fn test_zeta_known_values() {
        assert!((zeta(2.0) - PI * PI / 6.0).abs() < 1e-12);
        assert!((zeta(4.0) - PI.powi(4) / 90.0).abs() < 1e-12);
        // against a long direct sum with an integral tail estimate
        let n = 2_000_000u64;
        let direct: f64 = (1..n).map(|k| (k as f64).powf(-1.5)).sum::<f64>()
            + (n as f64).powf(-0.5) / 0.5;
        assert!((zeta(1.5) - direct).abs() < 1e-7);
    }

    #[test]
    fn test_shapes_agree_on_common_ground() {
        // uniform product weights vs the explicit enumeration
        let z = 0.8;
        let dim = 4;
        let product = Weights::Product(ProductWeights::new(vec![0.5; dim]));
        let mut explicit = ProjectionDependentWeights::default();
        for mask in 1u64..1 << dim {
            explicit.set_weight(mask, 0.5f64.powi(mask.count_ones() as i32));
        }
        let a = sum_over_projections(&product, 2.0, z, 1.0, dim);
        let b = sum_over_projections(
            &Weights::ProjectionDependent(explicit),
            2.0,
            z,
            1.0,
            dim,
        );
        assert!((a - b).abs() < 1e-10, "{} vs {}", a, b);

        // POD with unit order weights reduces to product weights
        let pod = Weights::Pod(PodWeights {
            order: OrderDependentWeights {
                weights: vec![1.0; dim],
                default_weight: 0.0,
            },
            product: ProductWeights::new(vec![0.5; dim]),
        });
        let c = sum_over_projections(&pod, 2.0, z, 1.0, dim);
        assert!((a - c).abs() < 1e-10, "{} vs {}", a, c);

        // order-dependent counts projections by cardinality
        let ord = Weights::OrderDependent(OrderDependentWeights::new(vec![1.0, 1.0, 1.0, 1.0]));
        let d = sum_over_projections(&ord, 2.0, z, 1.0, dim);
        let direct: f64 = (1u64..1 << dim).map(|m| z.powi(m.count_ones() as i32)).sum();
        assert!((d - direct).abs() < 1e-10);
    }

    #[test]
    fn test_bound_decreases_with_more_points() {
        let weights = Weights::Product(ProductWeights::new(vec![1.0, 1.0]));
        let bound = PAlphaSL10::new(2, weights, 2.0).unwrap();
        let b1 = bound.minimum(1 << 8, 2);
        let b2 = bound.minimum(1 << 12, 2);
        assert!(b2 < b1);
        assert!(b2 > 0.0);
    }
}
