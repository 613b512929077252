// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Dissonance Triad
// ─────────────────────────────────────────────────────────────────────
//! structural conflict (pre-context ambiguity), environmental pressure
//! (how the context leans against the base preference) and behavioral
//! dissonance (did the final choice move away from it).

use serde::{Deserialize, Serialize};

use hotco_types::{DissonanceType, Mode, N_ACTIONS, N_NODES};

/// Outer weight on the mean signal over the alternatives.
const ALTERNATIVES_WEIGHT: f64 = 0.5;

/// D_env = −signal[base] + 0.5 · mean(signal[others]),
/// signal = P_action + valence_weight · P_valence.
///
/// Positive: the context opposes the base preference.
pub fn environmental_pressure(
    perturbation: &[f64; N_NODES],
    base: Mode,
    valence_weight: f64,
) -> f64 {
    let signal: [f64; N_ACTIONS] = std::array::from_fn(|m| {
        let mode = Mode::ALL[m];
        perturbation[mode.action_node()] + valence_weight * perturbation[mode.valence_node()]
    });
    let others: f64 = Mode::ALL
        .iter()
        .filter(|&&m| m != base)
        .map(|m| signal[m.index()])
        .sum();
    let mean_others = others / ((N_ACTIONS - 1) as f64 + 1e-6);
    -signal[base.index()] + ALTERNATIVES_WEIGHT * mean_others
}

pub fn behavioral_dissonance(final_choice: Mode, base_preference: Mode) -> u8 {
    u8::from(final_choice != base_preference)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DissonanceTriad {
    pub structural_conflict: f64,
    pub environmental_pressure: f64,
    pub behavioral_dissonance: u8,
    pub dissonance_type: DissonanceType,
}

impl DissonanceTriad {
    pub fn compute(
        structural_conflict: f64,
        environmental_pressure: f64,
        final_choice: Mode,
        base_preference: Mode,
    ) -> Self {
        let behavioral = behavioral_dissonance(final_choice, base_preference);
        Self {
            structural_conflict,
            environmental_pressure,
            behavioral_dissonance: behavioral,
            dissonance_type: DissonanceType::classify(
                behavioral,
                structural_conflict,
                environmental_pressure,
            ),
        }
    }
}
