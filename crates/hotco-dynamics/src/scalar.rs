// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Scalar Arithmetic (values and forward-mode duals)
// ─────────────────────────────────────────────────────────────────────
//! The perturbation unit, the shunting field and the integrators are
//! generic over [`Scalar`]. With `f64` they compute values; with
//! [`Dual<N>`] they additionally carry exact derivatives with respect to
//! `N` seeded inputs (the 6 log-space parameters during calibration).
//!
//! Every update builds a fresh value from the previous one, so the
//! derivative part flows through the whole trajectory.
//!
//! Non-smooth points follow the usual autodiff conventions:
//!   - `relu(x)`: derivative 1 for x > 0, else 0
//!   - `clamp_to(x, lo, hi)`: derivative 1 for lo ≤ x ≤ hi, else 0

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

pub trait Scalar:
    Copy
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Lift a constant (zero derivative).
    fn constant(v: f64) -> Self;
    /// Primal value.
    fn value(&self) -> f64;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn relu(self) -> Self;
    fn sigmoid(self) -> Self;
    fn clamp_to(self, lo: f64, hi: f64) -> Self;

    #[inline]
    fn zero() -> Self {
        Self::constant(0.0)
    }
}

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Stable softplus: log(1 + exp(x)) with overflow protection.
#[inline]
pub fn softplus(x: f64) -> f64 {
    if x > 20.0 {
        x
    } else if x < -20.0 {
        x.exp()
    } else {
        x.exp().ln_1p()
    }
}

/// Inverse of [`softplus`] for y > 0: log(exp(y) - 1).
///
/// y ≤ 0 has no preimage; it is lifted to a small epsilon instead.
#[inline]
pub fn inverse_softplus(y: f64) -> f64 {
    let y = y.max(1e-8);
    if y > 20.0 {
        y
    } else {
        y.exp_m1().ln()
    }
}

impl Scalar for f64 {
    #[inline]
    fn constant(v: f64) -> Self {
        v
    }
    #[inline]
    fn value(&self) -> f64 {
        *self
    }
    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }
    #[inline]
    fn relu(self) -> Self {
        if self > 0.0 {
            self
        } else {
            0.0
        }
    }
    #[inline]
    fn sigmoid(self) -> Self {
        sigmoid(self)
    }
    #[inline]
    fn clamp_to(self, lo: f64, hi: f64) -> Self {
        self.clamp(lo, hi)
    }
}

/// Forward-mode dual number: value plus `N` partial derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<const N: usize> {
    pub re: f64,
    pub eps: [f64; N],
}

impl<const N: usize> Dual<N> {
    /// Independent variable `i` with value `re` (unit seed on slot `i`).
    pub fn variable(re: f64, i: usize) -> Self {
        let mut eps = [0.0; N];
        if i < N {
            eps[i] = 1.0;
        }
        Self { re, eps }
    }

    #[inline]
    fn scaled(self, re: f64, factor: f64) -> Self {
        Self {
            re,
            eps: self.eps.map(|d| d * factor),
        }
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] + rhs.eps[i]),
        }
    }
}

impl<const N: usize> AddAssign for Dual<N> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] - rhs.eps[i]),
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] * rhs.re + self.re * rhs.eps[i]),
        }
    }
}

impl<const N: usize> Div for Dual<N> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.re;
        let re = self.re * inv;
        Self {
            re,
            eps: std::array::from_fn(|i| (self.eps[i] - re * rhs.eps[i]) * inv),
        }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            eps: self.eps.map(|d| -d),
        }
    }
}

impl<const N: usize> Add<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: f64) -> Self {
        Self {
            re: self.re + rhs,
            eps: self.eps,
        }
    }
}

impl<const N: usize> Sub<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: f64) -> Self {
        Self {
            re: self.re - rhs,
            eps: self.eps,
        }
    }
}

impl<const N: usize> Mul<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.scaled(self.re * rhs, rhs)
    }
}

impl<const N: usize> Div<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        self.scaled(self.re / rhs, 1.0 / rhs)
    }
}

impl<const N: usize> Scalar for Dual<N> {
    #[inline]
    fn constant(v: f64) -> Self {
        Self { re: v, eps: [0.0; N] }
    }
    #[inline]
    fn value(&self) -> f64 {
        self.re
    }
    #[inline]
    fn exp(self) -> Self {
        let e = self.re.exp();
        self.scaled(e, e)
    }
    #[inline]
    fn ln(self) -> Self {
        self.scaled(self.re.ln(), 1.0 / self.re)
    }
    #[inline]
    fn relu(self) -> Self {
        if self.re > 0.0 {
            self
        } else {
            Self::constant(0.0)
        }
    }
    #[inline]
    fn sigmoid(self) -> Self {
        let s = sigmoid(self.re);
        self.scaled(s, s * (1.0 - s))
    }
    #[inline]
    fn clamp_to(self, lo: f64, hi: f64) -> Self {
        if self.re < lo {
            Self::constant(lo)
        } else if self.re > hi {
            Self::constant(hi)
        } else {
            self
        }
    }
}

/// Softmax of `logits × temperature`.
pub fn softmax<T: Scalar, const K: usize>(logits: &[T; K], temperature: f64) -> [T; K] {
    let shift = logits
        .iter()
        .map(|l| l.value() * temperature)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: [T; K] = std::array::from_fn(|k| (logits[k] * temperature - shift).exp());
    let mut total = T::zero();
    for e in exps.iter() {
        total += *e;
    }
    exps.map(|e| e / total)
}

/// Entropy of `softmax(logits × temperature)` divided by ln K, in [0, 1].
///
/// 0 means one option dominates; 1 means all options are equal.
pub fn normalized_entropy<const K: usize>(logits: &[f64; K], temperature: f64) -> f64 {
    let probs = softmax(logits, temperature);
    let entropy: f64 = probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum();
    let max_entropy = (K as f64).ln();
    (entropy / (max_entropy + 1e-8)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    type D2 = Dual<2>;

    fn fd<F: Fn(f64) -> f64>(f: F, x: f64) -> f64 {
        (f(x + 1e-6) - f(x - 1e-6)) / 2e-6
    }

    #[test]
    fn test_softplus_known_values() {
        assert!((softplus(0.0) - std::f64::consts::LN_2).abs() < 1e-12);
        assert!((softplus(100.0) - 100.0).abs() < 1e-12);
        assert!(softplus(-30.0) > 0.0);
    }

    #[test]
    fn test_inverse_softplus_round_trip() {
        for &y in &[0.2, 0.5, 0.8, 1.0, 3.0] {
            assert!((softplus(inverse_softplus(y)) - y).abs() < 1e-10, "y={y}");
        }
    }

    #[test]
    fn test_inverse_softplus_guards_non_positive() {
        assert!(inverse_softplus(0.0).is_finite());
        assert!(inverse_softplus(-1.0).is_finite());
    }

    #[test]
    fn test_sigmoid_symmetry() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
        assert!(sigmoid(-800.0) >= 0.0);
    }

    #[test]
    fn test_dual_product_rule() {
        let x = D2::variable(3.0, 0);
        let y = D2::variable(2.0, 1);
        let z = x * y + x * 2.0;
        assert_eq!(z.re, 12.0);
        assert_eq!(z.eps, [4.0, 3.0]);
    }

    #[test]
    fn test_dual_quotient_rule() {
        let x = D2::variable(3.0, 0);
        let y = D2::variable(2.0, 1);
        let z = x / y;
        assert!((z.re - 1.5).abs() < 1e-12);
        assert!((z.eps[0] - 0.5).abs() < 1e-12);
        assert!((z.eps[1] + 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_dual_transcendentals_match_fd() {
        for &x0 in &[-1.3, 0.2, 0.9] {
            let x = D2::variable(x0, 0);
            assert!((x.exp().eps[0] - fd(f64::exp, x0)).abs() < 1e-6);
            assert!((x.sigmoid().eps[0] - fd(sigmoid, x0)).abs() < 1e-6);
        }
        let x = D2::variable(1.7, 0);
        assert!((x.ln().eps[0] - 1.0 / 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_dual_relu_and_clamp_conventions() {
        let neg = D2::variable(-0.5, 0);
        let pos = D2::variable(0.5, 0);
        assert_eq!(neg.relu().eps, [0.0, 0.0]);
        assert_eq!(pos.relu().eps, [1.0, 0.0]);
        assert_eq!(D2::variable(1.2, 0).clamp_to(0.0, 1.0).eps, [0.0, 0.0]);
        assert_eq!(D2::variable(1.2, 0).clamp_to(0.0, 1.0).re, 1.0);
        assert_eq!(pos.clamp_to(0.0, 1.0).eps, [1.0, 0.0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[0.1, 0.7, 0.3, 0.0], 5.0);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[1] > p[2] && p[2] > p[0] && p[0] > p[3]);
    }

    #[test]
    fn test_softmax_dual_gradient_sums_to_zero() {
        let logits = [
            Dual::<1>::variable(0.4, 0),
            Dual::<1>::constant(0.1),
            Dual::<1>::constant(0.2),
        ];
        let p = softmax(&logits, 5.0);
        let total: f64 = p.iter().map(|v| v.eps[0]).sum();
        assert!(total.abs() < 1e-12);
        assert!(p[0].eps[0] > 0.0);
    }

    #[test]
    fn test_normalized_entropy_bounds() {
        assert!((normalized_entropy(&[0.3; 4], 5.0) - 1.0).abs() < 1e-6);
        assert!(normalized_entropy(&[1.0, 0.0, 0.0, 0.0], 50.0) < 0.01);
    }
}
