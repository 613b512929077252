// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Convergence Detector
// ─────────────────────────────────────────────────────────────────────

use hotco_dynamics::Scalar;
use hotco_types::topology::ACTION_RANGE;
use hotco_types::N_NODES;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    pub converged: bool,
    pub reaction_time: f64,
    /// Grid index at which the final state is read.
    pub final_index: usize,
}

/// Largest absolute change of any action between two states.
pub fn max_action_change<T: Scalar>(a: &[T; N_NODES], b: &[T; N_NODES]) -> f64 {
    ACTION_RANGE
        .map(|i| (b[i].value() - a[i].value()).abs())
        .fold(0.0, f64::max)
}

/// First grid step at or past `min_time` whose action change is below
/// `threshold`. The agent then reads out at the later point of that step.
/// Without convergence: the horizon and the last index.
///
/// The first step checked starts at `floor(min_time / dt)` (0.3 → 0.4 on
/// the default grid), so the earliest reaction time is `min_time + dt`.
pub fn detect<T: Scalar>(
    times: &[f64],
    states: &[[T; N_NODES]],
    threshold: f64,
    min_time: f64,
    dt: f64,
) -> Convergence {
    let n = times.len().min(states.len());
    let horizon = Convergence {
        converged: false,
        reaction_time: times.last().copied().unwrap_or(0.0),
        final_index: n.saturating_sub(1),
    };
    if n < 2 {
        return horizon;
    }

    let min_idx = (min_time / dt + 1e-9).floor() as usize;
    (min_idx..n - 1)
        .find(|&t| max_action_change(&states[t], &states[t + 1]) < threshold)
        .map(|t| Convergence {
            converged: true,
            reaction_time: times[t + 1],
            final_index: t + 1,
        })
        .unwrap_or(horizon)
}
