// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Deliberation Trace Records
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::topology::{Mode, StateVector, N_ACTIONS};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_unit(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_unit: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_unit: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Structural conflict above which the pre-context state counts as torn.
pub const HIGH_STRUCTURAL_CONFLICT: f64 = 0.5;
/// |D_env| above which the context counts as a real pressure.
pub const HIGH_ENVIRONMENTAL_PRESSURE: f64 = 0.3;

/// Why a final choice diverged from the base preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DissonanceType {
    None,
    Compound,
    Structural,
    Environmental,
    Marginal,
}

impl DissonanceType {
    pub fn classify(
        behavioral_dissonance: u8,
        structural_conflict: f64,
        environmental_pressure: f64,
    ) -> Self {
        if behavioral_dissonance == 0 {
            return DissonanceType::None;
        }
        let high_struct = structural_conflict > HIGH_STRUCTURAL_CONFLICT;
        let high_env = environmental_pressure.abs() > HIGH_ENVIRONMENTAL_PRESSURE;
        match (high_struct, high_env) {
            (true, true) => DissonanceType::Compound,
            (true, false) => DissonanceType::Structural,
            (false, true) => DissonanceType::Environmental,
            (false, false) => DissonanceType::Marginal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DissonanceType::None => "none",
            DissonanceType::Compound => "compound",
            DissonanceType::Structural => "structural",
            DissonanceType::Environmental => "environmental",
            DissonanceType::Marginal => "marginal",
        }
    }
}

/// Complete record of one agent's simulated deliberation.
///
/// Produced once per simulation call and never fed back into dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationTrace {
    pub agent_id: usize,
    /// Evaluation grid.
    pub timestamps: Vec<f64>,
    /// State at every evaluation point.
    pub states: Vec<StateVector>,

    pub reaction_time: f64,
    pub convergence_achieved: bool,
    pub final_choice: Mode,
    /// Gap between the two highest final action activations.
    pub choice_confidence: f64,
    pub probabilities: BTreeMap<Mode, f64>,

    /// C_structural ∈ [0, 1].
    pub structural_conflict: f64,
    /// D_environmental ∈ ℝ; positive opposes the base preference.
    pub environmental_pressure: f64,
    /// D_behavioral ∈ {0, 1}.
    pub behavioral_dissonance: u8,

    pub base_preference: Mode,
    /// Converged actions of the stressor-free run.
    pub base_activations: [f64; N_ACTIONS],
    pub stress_level: f64,
    /// Normalised entropy of the action activations over time.
    pub conflict_intensity: Vec<f64>,
}

impl DeliberationTrace {
    /// True if the final choice differs from the base preference.
    pub fn is_dissonant(&self) -> bool {
        self.behavioral_dissonance == 1
    }

    pub fn dissonance_type(&self) -> DissonanceType {
        DissonanceType::classify(
            self.behavioral_dissonance,
            self.structural_conflict,
            self.environmental_pressure,
        )
    }

    /// Trace without its time series.
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            agent_id: self.agent_id,
            reaction_time: self.reaction_time,
            convergence_achieved: self.convergence_achieved,
            final_choice: self.final_choice,
            choice_confidence: self.choice_confidence,
            probabilities: self.probabilities.clone(),
            structural_conflict: self.structural_conflict,
            environmental_pressure: self.environmental_pressure,
            behavioral_dissonance: self.behavioral_dissonance,
            base_preference: self.base_preference,
            stress_level: self.stress_level,
            dissonance_type: self.dissonance_type(),
        }
    }
}

/// Compact, series-free view of a [`DeliberationTrace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub agent_id: usize,
    pub reaction_time: f64,
    pub convergence_achieved: bool,
    pub final_choice: Mode,
    pub choice_confidence: f64,
    pub probabilities: BTreeMap<Mode, f64>,
    pub structural_conflict: f64,
    pub environmental_pressure: f64,
    pub behavioral_dissonance: u8,
    pub base_preference: Mode,
    pub stress_level: f64,
    pub dissonance_type: DissonanceType,
}
