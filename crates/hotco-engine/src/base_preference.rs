// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Base-Preference Estimator
// ─────────────────────────────────────────────────────────────────────
//! Short stressor-free Euler run of the same field, giving the agent's
//! disposition absent context.

use serde::{Deserialize, Serialize};

use hotco_dynamics::{euler, Connectivity, FieldContext, ShuntingField, TimeGrid};
use hotco_types::topology::{actions_of, argmax, top_two};
use hotco_types::{Mode, StateVector, N_ACTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePreference {
    pub preference: Mode,
    pub activations: [f64; N_ACTIONS],
    pub structural_conflict: f64,
}

/// 1 − (top1 − top2) / top1, clamped to [0, 1]: 1 for a tie, 0 when the
/// runner-up is at zero.
pub fn structural_conflict(actions: &[f64; N_ACTIONS]) -> f64 {
    let (top1, top2) = top_two(actions);
    let c = 1.0 - (top1 - top2) / (top1 + 1e-8);
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

pub fn estimate(
    field: &ShuntingField,
    connectivity: &Connectivity,
    feasibility: &[f64; N_ACTIONS],
    initial_state: &StateVector,
    horizon: f64,
    dt: f64,
) -> BasePreference {
    let ctx = FieldContext::<f64> {
        connectivity,
        feasibility,
        perturbation: None,
    };
    let grid = TimeGrid::uniform(horizon, dt);
    let states = euler(|s: &StateVector| field.derivative(s, &ctx), initial_state, &grid);
    let last = states.last().copied().unwrap_or(*initial_state);
    let activations = actions_of(&last);
    BasePreference {
        preference: Mode::from_index(argmax(&activations)).unwrap_or(Mode::Car),
        activations,
        structural_conflict: structural_conflict(&activations),
    }
}
