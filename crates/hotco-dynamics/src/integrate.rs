// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Trajectory Integrators
// ─────────────────────────────────────────────────────────────────────
//! Explicit Euler and adaptive Dormand-Prince 5(4), both sampled on a
//! uniform evaluation grid and generic over [`Scalar`].
//!
//! Every update produces a fresh state; the clamp after each sample
//! (needs/actions → [0, 1], valences → [-1, 1]) also builds a new array.

use hotco_types::topology::{ACTION_RANGE, NEED_RANGE, VALENCE_RANGE};
use hotco_types::{SolverKind, N_NODES};

use crate::scalar::Scalar;

/// Uniform evaluation grid `0, dt, 2dt, …` up to the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    pub times: Vec<f64>,
}

impl TimeGrid {
    pub fn uniform(horizon: f64, dt: f64) -> Self {
        Self::with_points((horizon / dt + 1e-9).floor() as usize + 1, dt)
    }

    /// `points` grid values starting at 0, endpoints included.
    pub fn with_points(points: usize, dt: f64) -> Self {
        Self {
            times: (0..points).map(|k| k as f64 * dt).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn horizon(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

/// Clamp each segment to its domain, returning a new state.
pub fn clamp_state<T: Scalar>(state: &[T; N_NODES]) -> [T; N_NODES] {
    std::array::from_fn(|i| {
        if NEED_RANGE.contains(&i) || ACTION_RANGE.contains(&i) {
            state[i].clamp_to(0.0, 1.0)
        } else {
            debug_assert!(VALENCE_RANGE.contains(&i));
            state[i].clamp_to(-1.0, 1.0)
        }
    })
}

#[inline]
fn axpy<T: Scalar>(y: &[T; N_NODES], h: f64, terms: &[(f64, &[T; N_NODES])]) -> [T; N_NODES] {
    std::array::from_fn(|i| {
        let mut acc = T::zero();
        for &(c, k) in terms {
            if c != 0.0 {
                acc += k[i] * c;
            }
        }
        y[i] + acc * h
    })
}

/// Fixed-step explicit Euler on the grid, clamping after every step.
pub fn euler<T, F>(f: F, y0: &[T; N_NODES], grid: &TimeGrid) -> Vec<[T; N_NODES]>
where
    T: Scalar,
    F: Fn(&[T; N_NODES]) -> [T; N_NODES],
{
    let mut states = Vec::with_capacity(grid.len());
    states.push(*y0);
    for w in grid.times.windows(2) {
        let dt = w[1] - w[0];
        let prev = &states[states.len() - 1];
        let ds = f(prev);
        let raw = axpy(prev, dt, &[(1.0, &ds)]);
        states.push(clamp_state(&raw));
    }
    states
}

/// Tolerances of the adaptive solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

// Dormand-Prince 5(4) tableau. The field is autonomous, so the stage
// times are not needed.
const A21: f64 = 1.0 / 5.0;
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
/// 5th-order weights (also the 7th stage row).
const B5: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
/// B5 − B4.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// One Dormand-Prince attempt: 5th-order solution and scaled RMS error.
fn dopri_step<T, F>(f: &F, y: &[T; N_NODES], h: f64, tol: &Tolerances) -> ([T; N_NODES], f64)
where
    T: Scalar,
    F: Fn(&[T; N_NODES]) -> [T; N_NODES],
{
    let k1 = f(y);
    let k2 = f(&axpy(y, h, &[(A21, &k1)]));
    let k3 = f(&axpy(y, h, &[(A3[0], &k1), (A3[1], &k2)]));
    let k4 = f(&axpy(y, h, &[(A4[0], &k1), (A4[1], &k2), (A4[2], &k3)]));
    let k5 = f(&axpy(
        y,
        h,
        &[(A5[0], &k1), (A5[1], &k2), (A5[2], &k3), (A5[3], &k4)],
    ));
    let k6 = f(&axpy(
        y,
        h,
        &[(A6[0], &k1), (A6[1], &k2), (A6[2], &k3), (A6[3], &k4), (A6[4], &k5)],
    ));
    let y5 = axpy(
        y,
        h,
        &[(B5[0], &k1), (B5[2], &k3), (B5[3], &k4), (B5[4], &k5), (B5[5], &k6)],
    );
    let k7 = f(&y5);

    let ks = [&k1, &k2, &k3, &k4, &k5, &k6, &k7];
    let mut sum_sq = 0.0;
    for i in 0..N_NODES {
        let mut e = 0.0;
        for (s, k) in ks.iter().enumerate() {
            e += E[s] * k[i].value();
        }
        let scale = tol.atol + tol.rtol * y[i].value().abs().max(y5[i].value().abs());
        let r = h * e / scale;
        sum_sq += r * r;
    }
    (y5, (sum_sq / N_NODES as f64).sqrt())
}

/// Adaptive Dormand-Prince 5(4). Steps are cut to land exactly on each
/// grid point; the state is clamped there and integration continues from
/// the clamped value. A step below `1e-6 × grid step` is accepted
/// regardless of its error estimate.
pub fn dormand_prince<T, F>(
    f: F,
    y0: &[T; N_NODES],
    grid: &TimeGrid,
    tol: &Tolerances,
) -> Vec<[T; N_NODES]>
where
    T: Scalar,
    F: Fn(&[T; N_NODES]) -> [T; N_NODES],
{
    let mut states = Vec::with_capacity(grid.len());
    states.push(*y0);
    let mut y = *y0;
    let mut h = grid
        .times
        .windows(2)
        .next()
        .map(|w| w[1] - w[0])
        .unwrap_or(0.0);
    let mut underflow_warned = false;

    for w in grid.times.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        let h_min = 1e-6 * (t1 - t0);
        let mut t = t0;

        while t1 - t > h_min * 1e-3 {
            let step = h.min(t1 - t).max(h_min);
            let (y_next, err) = dopri_step(&f, &y, step, tol);

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else if err.is_finite() {
                (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            } else {
                MIN_FACTOR
            };

            if err <= 1.0 || step <= h_min {
                if err > 1.0 && !underflow_warned {
                    log::warn!(
                        "dormand_prince: step underflow at t={t:.4} (err={err:.3e}), accepting"
                    );
                    underflow_warned = true;
                }
                t += step;
                y = y_next;
                // Keep the proposal from a full step, not from a step
                // shortened to hit the grid point.
                if step >= h {
                    h = step * factor;
                }
            } else {
                h = step * factor;
            }
        }

        y = clamp_state(&y);
        states.push(y);
    }
    states
}

/// Integrate with the configured solver.
pub fn integrate<T, F>(
    solver: SolverKind,
    f: F,
    y0: &[T; N_NODES],
    grid: &TimeGrid,
    tol: &Tolerances,
) -> Vec<[T; N_NODES]>
where
    T: Scalar,
    F: Fn(&[T; N_NODES]) -> [T; N_NODES],
{
    match solver {
        SolverKind::DormandPrince => dormand_prince(f, y0, grid, tol),
        SolverKind::Euler => euler(f, y0, grid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Dual;

    const TOL: Tolerances = Tolerances {
        rtol: 1e-6,
        atol: 1e-8,
    };

    /// dy/dt = -k·y on every node, starting inside the clamp box.
    fn decay(k: f64) -> impl Fn(&[f64; N_NODES]) -> [f64; N_NODES] {
        move |y: &[f64; N_NODES]| y.map(|v| -k * v)
    }

    #[test]
    fn test_grid_default() {
        let g = TimeGrid::uniform(10.0, 0.1);
        assert_eq!(g.len(), 101);
        assert!((g.horizon() - 10.0).abs() < 1e-9);
        assert_eq!(TimeGrid::uniform(2.0, 0.1).len(), 21);
    }

    #[test]
    fn test_grid_with_points() {
        assert_eq!(TimeGrid::with_points(41, 0.1), TimeGrid::uniform(4.0, 0.1));
        assert!(TimeGrid::with_points(0, 0.1).is_empty());
    }

    #[test]
    fn test_clamp_state_segments() {
        let mut s = [2.0; N_NODES];
        for i in VALENCE_RANGE {
            s[i] = -3.0;
        }
        let c = clamp_state(&s);
        assert!(c[..13].iter().all(|&v| v == 1.0));
        assert!(c[13..].iter().all(|&v| v == -1.0));
        assert_eq!(s[0], 2.0);
    }

    #[test]
    fn test_euler_matches_closed_form_step() {
        let grid = TimeGrid::uniform(0.2, 0.1);
        let y0 = [0.5; N_NODES];
        let out = euler(decay(1.0), &y0, &grid);
        assert_eq!(out.len(), 3);
        assert!((out[2][0] - 0.5 * 0.9 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_dopri_accuracy_on_linear_decay() {
        let grid = TimeGrid::uniform(2.0, 0.1);
        let y0 = [0.8; N_NODES];
        let out = dormand_prince(decay(1.3), &y0, &grid, &TOL);
        assert_eq!(out.len(), grid.len());
        for (k, t) in grid.times.iter().enumerate() {
            let exact = 0.8 * (-1.3 * t).exp();
            assert!((out[k][3] - exact).abs() < 1e-5, "t={t}");
        }
    }

    #[test]
    fn test_dopri_clamps_at_grid_points() {
        let grid = TimeGrid::uniform(1.0, 0.1);
        let grow = |y: &[f64; N_NODES]| y.map(|_| 5.0);
        let out = dormand_prince(grow, &[0.0; N_NODES], &grid, &TOL);
        for s in out.iter() {
            assert!(s[..13].iter().all(|&v| (0.0..=1.0).contains(&v)));
            assert!(s[13..].iter().all(|&v| (-1.0..=1.0).contains(&v)));
        }
        assert_eq!(out.last().map(|s| s[0]), Some(1.0));
    }

    #[test]
    fn test_dual_derivative_through_euler() {
        // y' = -k·y → y(T) = y0·(1 - k·dt)^n ; d/dk at k0 known.
        let k0 = 0.7;
        let grid = TimeGrid::uniform(0.5, 0.1);
        let k = Dual::<1>::variable(k0, 0);
        let out = euler(
            move |y: &[Dual<1>; N_NODES]| y.map(|v| -(v * k)),
            &[Dual::constant(0.6); N_NODES],
            &grid,
        );
        let n = 5.0;
        let dt = 0.1;
        let expected = 0.6 * n * (1.0 - k0 * dt).powf(n - 1.0) * (-dt);
        assert!((out[5][0].eps[0] - expected).abs() < 1e-10);
    }

    #[test]
    fn test_integrate_dispatch() {
        let grid = TimeGrid::uniform(0.3, 0.1);
        let y0 = [0.4; N_NODES];
        let e = integrate(SolverKind::Euler, decay(1.0), &y0, &grid, &TOL);
        let d = integrate(SolverKind::DormandPrince, decay(1.0), &y0, &grid, &TOL);
        assert_eq!(e.len(), d.len());
        assert!((d[3][0] - 0.4 * (-0.3f64).exp()).abs() < 1e-6);
        assert!((e[3][0] - 0.4 * 0.9f64.powi(3)).abs() < 1e-12);
    }
}
