// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Canonical Parameters
// ─────────────────────────────────────────────────────────────────────
//! Theory-fixed constants of the affective-cognitive field: stressor
//! topology, shunting constants and the initial values of the 6
//! learnable log-space parameters.

use serde::{Deserialize, Serialize};

use hotco_types::{Mode, Need, N_NODES, N_STRESSORS};

use crate::scalar::inverse_softplus;

/// 5 per-stressor scales + 1 global magnitude.
pub const N_PARAMS: usize = N_STRESSORS + 1;
/// Slot of the global magnitude in the parameter vector.
pub const GLOBAL_MAGNITUDE_PARAM: usize = N_STRESSORS;

pub const INITIAL_STRESSOR_SCALE: f64 = 1.5;
pub const INITIAL_GLOBAL_MAGNITUDE: f64 = 2.0;
pub const VULNERABILITY_EXPONENT: f64 = 1.5;

/// Gain of the need → action feedback relative to action → need.
pub const FEEDBACK_GAIN: f64 = 0.5;
/// Action ↔ valence coupling: BASE + GAIN × mean |valence|.
pub const COUPLING_BASE: f64 = 0.3;
pub const COUPLING_GAIN: f64 = 0.2;
/// Initial action activation: sigmoid(valence) × PRIOR_GAIN × feasibility.
pub const ACTION_PRIOR_GAIN: f64 = 0.2;

/// A state node a stressor acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetNode {
    Need(Need),
    Valence(Mode),
}

impl TargetNode {
    pub fn node(self) -> usize {
        match self {
            TargetNode::Need(n) => n.node(),
            TargetNode::Valence(m) => m.valence_node(),
        }
    }
}

use TargetNode::{Need as N, Valence as V};

const RAIN: &[(TargetNode, f64)] = &[
    (N(Need::Comfort), -0.5),
    (N(Need::Physical), -0.3),
    (V(Mode::Bike), -0.8),
    (V(Mode::Walk), -0.6),
    (V(Mode::Car), 0.4),
    (V(Mode::Pt), 0.2),
];

const CROWDING: &[(TargetNode, f64)] = &[
    (N(Need::Privacy), -0.6),
    (N(Need::Comfort), -0.5),
    (V(Mode::Pt), -0.7),
    (V(Mode::Walk), -0.3),
];

const DARKNESS: &[(TargetNode, f64)] = &[
    (N(Need::Safety), 0.5),
    (V(Mode::Walk), -0.6),
    (V(Mode::Bike), -0.5),
    (V(Mode::Car), 0.2),
];

const TRAFFIC: &[(TargetNode, f64)] = &[
    (N(Need::Speed), 0.4),
    (N(Need::Autonomy), -0.3),
    (V(Mode::Car), -0.6),
    (V(Mode::Bike), 0.4),
    (V(Mode::Pt), 0.2),
];

const TEMPERATURE: &[(TargetNode, f64)] = &[
    (N(Need::Comfort), -0.6),
    (N(Need::Physical), -0.4),
    (V(Mode::Bike), -0.5),
    (V(Mode::Walk), -0.5),
    (V(Mode::Car), 0.3),
];

/// Signed theory effects per stressor, in [`hotco_types::Stressor::ALL`] order.
/// Action nodes are never targeted.
pub const STRESSOR_NODE_TARGETS: [&[(TargetNode, f64)]; N_STRESSORS] =
    [RAIN, CROWDING, DARKNESS, TRAFFIC, TEMPERATURE];

/// Stressor × node table.
pub type StressorTable = [[f64; N_NODES]; N_STRESSORS];

/// Frozen topology: +1 / -1 where a stressor acts, 0 elsewhere.
pub fn build_sign_mask() -> StressorTable {
    let mut mask = [[0.0; N_NODES]; N_STRESSORS];
    for (s, targets) in STRESSOR_NODE_TARGETS.iter().enumerate() {
        for &(target, effect) in targets.iter() {
            mask[s][target.node()] = if effect > 0.0 { 1.0 } else { -1.0 };
        }
    }
    mask
}

/// |effect| per stressor and node.
pub fn build_magnitude_targets() -> StressorTable {
    let mut mags = [[0.0; N_NODES]; N_STRESSORS];
    for (s, targets) in STRESSOR_NODE_TARGETS.iter().enumerate() {
        for &(target, effect) in targets.iter() {
            mags[s][target.node()] = effect.abs();
        }
    }
    mags
}

/// Raw magnitudes such that `softplus(raw) == |effect|` on active cells.
/// Inactive cells stay 0; the sign mask zeroes them anyway.
pub fn build_raw_magnitudes(targets: &StressorTable) -> StressorTable {
    let mut raw = [[0.0; N_NODES]; N_STRESSORS];
    for (s, row) in targets.iter().enumerate() {
        for (i, &mag) in row.iter().enumerate() {
            if mag > 0.0 {
                raw[s][i] = inverse_softplus(mag);
            }
        }
    }
    raw
}

/// Fixed constants of the shunting competitive field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShuntingParams {
    /// Time constant τ.
    pub tau: f64,
    /// Passive decay A.
    pub decay: f64,
    /// Excitatory cap B.
    pub excitatory_cap: f64,
    /// Inhibitory floor C.
    pub inhibitory_floor: f64,
    /// Lateral inhibition strength λ.
    pub lateral_inhibition: f64,
    /// Divisive-inhibition softening σ.
    pub divisive_sigma: f64,
    /// Excitatory gate sharpness α.
    pub gating_alpha: f64,
    /// Inhibitory gate sharpness β = α/2.
    pub gating_beta: f64,
}

impl Default for ShuntingParams {
    fn default() -> Self {
        Self {
            tau: 0.8,
            decay: 0.15,
            excitatory_cap: 1.0,
            inhibitory_floor: 0.1,
            lateral_inhibition: 3.0,
            divisive_sigma: 0.3,
            gating_alpha: 1.5,
            gating_beta: 0.75,
        }
    }
}

/// Additive guard in the divisive lateral-inhibition denominator.
pub const LATERAL_EPS: f64 = 1e-6;
