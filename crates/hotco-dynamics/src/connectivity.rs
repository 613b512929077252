// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Connectivity Builder
// ─────────────────────────────────────────────────────────────────────
//! Per-agent excitatory / inhibitory weights. Rows receive, columns send:
//! `excitation[i] = Σ_j w_pos[i][j] · state[j]`.

use hotco_types::{BeliefMatrix, Mode, Need, StateVector, N_NODES, N_VALENCES};
use hotco_types::topology::valences_of;

use crate::params::{COUPLING_BASE, COUPLING_GAIN, FEEDBACK_GAIN};

pub type WeightMatrix = [[f64; N_NODES]; N_NODES];

#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    /// Non-negative part.
    pub w_pos: WeightMatrix,
    /// Non-positive part, −relu(−W).
    pub w_neg: WeightMatrix,
}

impl Connectivity {
    /// Build from the belief matrix and the valences of the initial state.
    pub fn build(beliefs: &BeliefMatrix, initial_state: &StateVector) -> Self {
        let mut w = [[0.0; N_NODES]; N_NODES];
        for mode in Mode::ALL {
            let act = mode.action_node();
            for need in Need::ALL {
                let b = beliefs[mode.index()][need.index()];
                w[act][need.node()] = b;
                w[need.node()][act] = FEEDBACK_GAIN * b;
            }
            w[act][mode.valence_node()] = 1.0;
        }

        let mut w_pos = [[0.0; N_NODES]; N_NODES];
        let mut w_neg = [[0.0; N_NODES]; N_NODES];
        for i in 0..N_NODES {
            for j in 0..N_NODES {
                w_pos[i][j] = w[i][j].max(0.0);
                w_neg[i][j] = w[i][j].min(0.0);
            }
        }

        let coupling = Self::coupling_strength(&valences_of(initial_state));
        for mode in Mode::ALL {
            w_pos[mode.valence_node()][mode.action_node()] = coupling;
            w_pos[mode.action_node()][mode.valence_node()] = coupling;
        }

        Self { w_pos, w_neg }
    }

    /// 0.3 + 0.2 × mean |valence|, in [0.3, 0.5] for valences in [-1, 1].
    pub fn coupling_strength(valences: &[f64; N_VALENCES]) -> f64 {
        let intensity = valences.iter().map(|v| v.abs()).sum::<f64>() / N_VALENCES as f64;
        COUPLING_BASE + COUPLING_GAIN * intensity
    }
}
