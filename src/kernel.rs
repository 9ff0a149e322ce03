/*
 * @file kernel.rs
 *
 * One-dimensional kernels for coordinate-uniform figures of merit.
 * Each kernel is a univariate function whose product over coordinates,
 * summed over projections and points, yields the figure value.
 */

use crate::error::{Error, Result};
use std::f64::consts::PI;

/** A one-dimensional kernel. */
#[derive(Clone, Debug, PartialEq)]
pub enum Kernel {
    /** Bernoulli-polynomial P-alpha kernel for ordinary lattices; alpha
     * must be even, between 2 and 8.
     */
    PAlpha(u32),
    /** Dyadic (Walsh) P-alpha kernel for digital nets and polynomial
     * lattices; alpha >= 2.
     */
    PAlphaBase2(u32),
    /** Interlaced A-alpha kernel; alpha >= 2, interlacing >= 2. */
    IAAlpha { alpha: u32, interlacing: u32 },
    /** Interlaced order-2 B kernel; interlacing >= 2. */
    IB { interlacing: u32 },
}

impl Kernel {
    /** Reject parameters outside the kernel's numeric domain. */
    pub fn validate(&self) -> Result<()> {
        match *self {
            Kernel::PAlpha(alpha) => {
                if alpha < 2 || alpha > 8 || alpha % 2 != 0 {
                    Err(Error::NumericDomain(format!(
                        "P-alpha kernel requires even alpha in 2..=8, got {}",
                        alpha
                    )))
                } else {
                    Ok(())
                }
            }
            Kernel::PAlphaBase2(alpha) => {
                if alpha < 2 {
                    Err(Error::NumericDomain(format!(
                        "base-2 P-alpha kernel requires alpha > 1, got {}",
                        alpha
                    )))
                } else {
                    Ok(())
                }
            }
            Kernel::IAAlpha { alpha, interlacing } => {
                if alpha < 2 {
                    Err(Error::NumericDomain(
                        "interlaced A-alpha kernel requires alpha > 1".into(),
                    ))
                } else if interlacing < 2 {
                    Err(Error::NumericDomain(
                        "interlaced A-alpha kernel requires interlacing factor > 1".into(),
                    ))
                } else {
                    Ok(())
                }
            }
            Kernel::IB { interlacing } => {
                if interlacing < 2 {
                    Err(Error::NumericDomain(
                        "interlaced B kernel requires interlacing factor > 1".into(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /** Evaluate the kernel at x in [0, 1). */
    pub fn eval(&self, x: f64) -> f64 {
        match *self {
            Kernel::PAlpha(alpha) => {
                // -(-4 pi^2)^(alpha/2) / alpha! * B_alpha(x)
                match alpha {
                    2 => 2.0 * PI.powi(2) * bernoulli2(x),
                    4 => -(2.0 / 3.0) * PI.powi(4) * bernoulli4(x),
                    6 => (4.0 / 45.0) * PI.powi(6) * bernoulli6(x),
                    8 => -(2.0 / 315.0) * PI.powi(8) * bernoulli8(x),
                    _ => unreachable!("validated alpha"),
                }
            }
            Kernel::PAlphaBase2(alpha) => {
                let mu = 1.0 / (2f64.powi(alpha as i32) - 2.0);
                if x < f64::EPSILON {
                    return mu;
                }
                let c = (2f64.powi(alpha as i32) - 1.0) / (2f64.powi(alpha as i32) - 2.0);
                mu - c * 2f64.powf((alpha as f64 - 1.0) * x.log2().floor())
            }
            Kernel::IAAlpha { alpha, interlacing } => {
                let min = alpha.min(interlacing) as f64;
                let denom =
                    2f64.powf((alpha as f64 + 2.0) / 2.0) * (2f64.powf(min - 1.0) - 1.0);
                if x < f64::EPSILON {
                    return 1.0 / denom;
                }
                (1.0 - (2f64.powf(min) - 1.0) * 2f64.powf((min - 1.0) * x.log2().floor()))
                    / denom
            }
            Kernel::IB { interlacing } => {
                let d = interlacing as f64;
                let denom = 2.0 * (2f64.powf(d - 1.0) - 1.0);
                if x < f64::EPSILON {
                    return 1.0 / denom;
                }
                (1.0 - (2f64.powf(d) - 1.0) * 2f64.powf((d - 1.0) * x.log2().floor())) / denom
            }
        }
    }

    /** Power to which weights are raised in coordinate-uniform sums. */
    pub fn cu_power(&self) -> f64 {
        match self {
            Kernel::PAlpha(_) | Kernel::PAlphaBase2(_) => 2.0,
            Kernel::IAAlpha { .. } | Kernel::IB { .. } => 1.0,
        }
    }

    /** Whether the kernel works on net points (dyadic) rather than the
     * rational points of an ordinary lattice.
     */
    pub fn is_dyadic(&self) -> bool {
        !matches!(self, Kernel::PAlpha(_))
    }

    pub fn name(&self) -> String {
        match *self {
            Kernel::PAlpha(alpha) => format!("P{}", alpha),
            Kernel::PAlphaBase2(alpha) => format!("P{} (base 2)", alpha),
            Kernel::IAAlpha { alpha, interlacing } => {
                format!("IA - alpha: {} - interlacing: {}", alpha, interlacing)
            }
            Kernel::IB { interlacing } => format!("IB - interlacing: {}", interlacing),
        }
    }
}

fn bernoulli2(x: f64) -> f64 {
    x * x - x + 1.0 / 6.0
}

fn bernoulli4(x: f64) -> f64 {
    ((x - 2.0) * x + 1.0) * x * x - 1.0 / 30.0
}

fn bernoulli6(x: f64) -> f64 {
    (((x - 3.0) * x + 2.5) * x * x - 0.5) * x * x + 1.0 / 42.0
}

fn bernoulli8(x: f64) -> f64 {
    ((((x - 4.0) * x + 14.0 / 3.0) * x * x - 7.0 / 3.0) * x * x + 2.0 / 3.0) * x * x - 1.0 / 30.0
}
