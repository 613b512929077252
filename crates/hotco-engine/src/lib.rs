// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Choice Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Affective-cognitive transport-mode choice.
//!
//! Each agent's needs, actions and valences evolve under a shunting
//! competitive field perturbed by environmental stressors. The engine
//! reads out the final choice, its reaction time and the dissonance
//! triad, and explains the result in a Cognitive Passport.
//!
//! Architecture:
//!   - AgentInput / Population: validated per-agent inputs
//!   - BasePreference: stressor-free run → structural conflict
//!   - Convergence: reaction time and read-out index
//!   - DissonanceTriad: C_structural, D_environmental, D_behavioral
//!   - ChoiceEngine: batched orchestrator (rayon)
//!   - CognitivePassport: explanation and routing record
//!   - Calibrator: fits the 6 perturbation parameters to observed choices
//!   - ChoiceRequest / respond: named-key service payload

pub mod base_preference;
pub mod calibration;
pub mod convergence;
pub mod dissonance;
pub mod engine;
pub mod input;
pub mod passport;
pub mod request;

pub use base_preference::{structural_conflict, BasePreference};
pub use calibration::{
    soft_targets_from_frequencies, CalibrationConfig, CalibrationSample, CalibrationStepLog,
    Calibrator, GradientMethod, LossKind,
};
pub use convergence::Convergence;
pub use dissonance::{behavioral_dissonance, environmental_pressure, DissonanceTriad};
pub use engine::{ChoiceEngine, ChoicePrediction, SimulationOutput};
pub use input::{AgentInput, Population};
pub use passport::CognitivePassport;
pub use request::{respond, ChoiceRequest, ChoiceResponse};

pub use hotco_dynamics::StressorPerturbation;
pub use hotco_types::{
    DeliberationTrace, DissonanceType, EngineConfig, HotcoError, HotcoResult, Mode, Need,
    SolverKind, Stressor,
};
