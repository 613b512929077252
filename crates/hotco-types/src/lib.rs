// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! State topology, configuration, error hierarchy, and deliberation
//! records for the Deep HOTCO affective-cognitive choice engine.

pub mod config;
pub mod error;
pub mod topology;
pub mod trace;

pub use config::{EngineConfig, SolverKind};
pub use error::{HotcoError, HotcoResult};
pub use topology::{
    BeliefMatrix, Mode, Need, PersonalValue, StateVector, Stressor, N_ACTIONS, N_NEEDS, N_NODES,
    N_STRESSORS, N_VALENCES, N_VALUES,
};
pub use trace::{clamp_unit, DeliberationTrace, DissonanceType, TraceSummary};
