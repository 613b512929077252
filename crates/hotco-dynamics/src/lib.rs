// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Affective-Cognitive Dynamics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Stressor perturbation unit, connectivity builder, shunting competitive
//! field and trajectory integrators. Everything on the trajectory path is
//! generic over [`Scalar`], so the same code yields values or values with
//! exact parameter derivatives.

pub mod connectivity;
pub mod integrate;
pub mod params;
pub mod perturbation;
pub mod scalar;
pub mod shunting;

pub use connectivity::{Connectivity, WeightMatrix};
pub use integrate::{clamp_state, dormand_prince, euler, integrate, TimeGrid, Tolerances};
pub use params::{ShuntingParams, StressorTable, GLOBAL_MAGNITUDE_PARAM, N_PARAMS};
pub use perturbation::{ParamVector, Perturbation, StressorPerturbation};
pub use scalar::{normalized_entropy, sigmoid, softmax, softplus, Dual, Scalar};
pub use shunting::{FieldContext, ShuntingField};
