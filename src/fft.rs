/*
 * @file fft.rs
 *
 * Just enough FFT machinery for fast CBC: an iterative Stockham
 * radix-2 transform, a Bluestein wrapper for the odd lengths that show
 * up as unit-group orders, and the cyclic cross-correlation built on
 * top of them.
 */

use std::f64::consts::PI;

/** Complex number, kept local to the convolution code. */
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct C64 {
    pub re: f64,
    pub im: f64,
}

impl C64 {
    pub fn new(re: f64, im: f64) -> C64 {
        C64 { re, im }
    }

    fn add(self, o: C64) -> C64 {
        C64::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: C64) -> C64 {
        C64::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: C64) -> C64 {
        C64::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn conj(self) -> C64 {
        C64::new(self.re, -self.im)
    }
}

/** In-order Stockham radix-2 FFT; `n` must be a power of two.  The
 * double-buffered autosort form needs no bit-reversal pass.
 */
pub fn fft_pow2(input: &[C64], inverse: bool) -> Vec<C64> {
    let n = input.len();
    assert!(n.is_power_of_two(), "length must be a power of two");
    if n == 1 {
        return input.to_vec();
    }
    let log_n = n.trailing_zeros() as usize;
    let sign = if inverse { 1.0 } else { -1.0 };

    let mut src = input.to_vec();
    let mut dst = vec![C64::default(); n];
    for stage in 0..log_n {
        let half_m = 1usize << stage;
        let m = half_m << 1;
        let groups = n / m;
        for g in 0..groups {
            for b in 0..half_m {
                let theta = sign * 2.0 * PI * b as f64 / m as f64;
                let twiddle = C64::new(theta.cos(), theta.sin());
                let even = src[g * half_m + b];
                let odd = src[n / 2 + g * half_m + b].mul(twiddle);
                dst[g * m + b] = even.add(odd);
                dst[g * m + b + half_m] = even.sub(odd);
            }
        }
        std::mem::swap(&mut src, &mut dst);
    }
    if inverse {
        let scale = 1.0 / n as f64;
        for v in &mut src {
            v.re *= scale;
            v.im *= scale;
        }
    }
    src
}

/** FFT of arbitrary length via Bluestein's chirp transform: an
 * n-point DFT becomes one convolution of power-of-two length.
 */
pub fn fft_any(input: &[C64], inverse: bool) -> Vec<C64> {
    let n = input.len();
    if n.is_power_of_two() {
        return fft_pow2(input, inverse);
    }
    let sign = if inverse { 1.0 } else { -1.0 };
    // chirp(k) = exp(sign * i * pi * k^2 / n)
    let chirp: Vec<C64> = (0..n)
        .map(|k| {
            let theta = sign * PI * ((k as u128 * k as u128) % (2 * n as u128)) as f64 / n as f64;
            C64::new(theta.cos(), theta.sin())
        })
        .collect();
    let m = (2 * n - 1).next_power_of_two();
    let mut a = vec![C64::default(); m];
    let mut b = vec![C64::default(); m];
    for k in 0..n {
        a[k] = input[k].mul(chirp[k]);
        b[k] = chirp[k].conj();
    }
    for k in 1..n {
        b[m - k] = chirp[k].conj();
    }
    let fa = fft_pow2(&a, false);
    let fb = fft_pow2(&b, false);
    let prod: Vec<C64> = fa.iter().zip(&fb).map(|(x, y)| x.mul(*y)).collect();
    let conv = fft_pow2(&prod, true);
    let mut out: Vec<C64> = (0..n).map(|k| conv[k].mul(chirp[k])).collect();
    if inverse {
        let scale = 1.0 / n as f64;
        for v in &mut out {
            v.re *= scale;
            v.im *= scale;
        }
    }
    out
}

/** Cyclic cross-correlation: out[tau] = sum over t of x[t] * y[(t + tau) mod n]. */
pub fn cyclic_cross_correlation(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    assert_eq!(n, y.len());
    if n == 0 {
        return Vec::new();
    }
    if n <= 4 {
        // not worth a transform
        return (0..n)
            .map(|tau| (0..n).map(|t| x[t] * y[(t + tau) % n]).sum())
            .collect();
    }
    let xc: Vec<C64> = x.iter().map(|&v| C64::new(v, 0.0)).collect();
    let yc: Vec<C64> = y.iter().map(|&v| C64::new(v, 0.0)).collect();
    let fx = fft_any(&xc, false);
    let fy = fft_any(&yc, false);
    let prod: Vec<C64> = fx.iter().zip(&fy).map(|(a, b)| a.conj().mul(*b)).collect();
    fft_any(&prod, true).into_iter().map(|v| v.re).collect()
}

#[cfg(test)]
mod tests {
    use super::{cyclic_cross_correlation, fft_any, fft_pow2, C64};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn naive_dft(x: &[C64], inverse: bool) -> Vec<C64> {
        let n = x.len();
        let sign = if inverse { 1.0 } else { -1.0 };
        (0..n)
            .map(|k| {
                let mut acc = C64::default();
                for (t, v) in x.iter().enumerate() {
                    let theta = sign * 2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
                    let w = C64::new(theta.cos(), theta.sin());
                    acc = C64::new(
                        acc.re + v.re * w.re - v.im * w.im,
                        acc.im + v.re * w.im + v.im * w.re,
                    );
                }
                if inverse {
                    C64::new(acc.re / n as f64, acc.im / n as f64)
                } else {
                    acc
                }
            })
            .collect()
    }

    #[test]
    fn test_fft_matches_naive_dft() {
        let mut rng = StdRng::seed_from_u64(2);
        for &n in &[8usize, 16, 64] {
            let x: Vec<C64> = (0..n)
                .map(|_| C64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5))
                .collect();
            let got = fft_pow2(&x, false);
            let want = naive_dft(&x, false);
            for (g, w) in got.iter().zip(&want) {
                assert!((g.re - w.re).abs() < 1e-9 && (g.im - w.im).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_bluestein_matches_naive_dft() {
        let mut rng = StdRng::seed_from_u64(3);
        for &n in &[3usize, 7, 15, 31, 63] {
            let x: Vec<C64> = (0..n)
                .map(|_| C64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5))
                .collect();
            let got = fft_any(&x, false);
            let want = naive_dft(&x, false);
            for (g, w) in got.iter().zip(&want) {
                assert!(
                    (g.re - w.re).abs() < 1e-8 && (g.im - w.im).abs() < 1e-8,
                    "n = {}",
                    n
                );
            }
            // round trip
            let back = fft_any(&got, true);
            for (b, v) in back.iter().zip(&x) {
                assert!((b.re - v.re).abs() < 1e-8 && (b.im - v.im).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_cross_correlation_matches_naive() {
        let mut rng = StdRng::seed_from_u64(4);
        for &n in &[1usize, 2, 5, 12, 31, 32] {
            let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
            let y: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
            let got = cyclic_cross_correlation(&x, &y);
            for tau in 0..n {
                let want: f64 = (0..n).map(|t| x[t] * y[(t + tau) % n]).sum();
                assert!((got[tau] - want).abs() < 1e-9, "n {} tau {}", n, tau);
            }
        }
    }
}
