// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Engine Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{HotcoError, HotcoResult};

/// ODE solver used for the full (stressor-perturbed) integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Adaptive embedded Runge-Kutta 5(4), sampled on the evaluation grid.
    DormandPrince,
    /// Fixed-step explicit Euler at the evaluation step.
    Euler,
}

/// Runtime configuration for the choice engine.
///
/// Dynamics constants (τ, A, B, C, λ, σ, α, β) are theory-fixed and live
/// with the shunting field; this struct only carries integration and
/// readout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Integration horizon of the full simulation.
    /// Default: 10.0 time units.
    pub t_max: f64,

    /// Evaluation grid step (also the Euler step).
    /// Default: 0.1.
    pub dt_eval: f64,

    /// Relative tolerance of the adaptive solver.
    /// Default: 1e-3.
    pub rtol: f64,

    /// Absolute tolerance of the adaptive solver.
    /// Default: 1e-4.
    pub atol: f64,

    /// Max absolute change of any action between consecutive evaluation
    /// points below which an agent counts as converged.
    /// Default: 0.005.
    pub convergence_threshold: f64,

    /// Convergence cannot be declared before this elapsed time.
    /// Default: 0.3.
    pub min_integration_time: f64,

    /// Default: Dormand-Prince.
    pub solver: SolverKind,

    /// Horizon of the stressor-free base-preference run.
    /// Default: 2.0.
    pub base_horizon: f64,

    /// Fixed Euler step of the base-preference run.
    /// Default: 0.1.
    pub base_dt: f64,

    /// Softmax scaling applied to action activations for probabilities.
    /// Default: 5.0.
    pub probability_temperature: f64,

    /// Weight of the valence perturbation in the environmental pressure.
    /// Default: 0.5.
    pub env_valence_weight: f64,

    /// Process agents on the rayon pool.
    /// Default: true.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            t_max: 10.0,
            dt_eval: 0.1,
            rtol: 1e-3,
            atol: 1e-4,
            convergence_threshold: 0.005,
            min_integration_time: 0.3,
            solver: SolverKind::DormandPrince,
            base_horizon: 2.0,
            base_dt: 0.1,
            probability_temperature: 5.0,
            env_valence_weight: 0.5,
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> HotcoResult<()> {
        if !(self.t_max.is_finite() && self.t_max > 0.0) {
            return Err(HotcoError::Config(format!(
                "t_max must be finite and > 0, got {}",
                self.t_max
            )));
        }
        if !(self.dt_eval > 0.0 && self.dt_eval <= self.t_max) {
            return Err(HotcoError::Config(format!(
                "dt_eval must be in (0, t_max], got {} (t_max = {})",
                self.dt_eval, self.t_max
            )));
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(HotcoError::Config(format!(
                "rtol and atol must be > 0, got rtol={} atol={}",
                self.rtol, self.atol
            )));
        }
        if !(self.convergence_threshold > 0.0) {
            return Err(HotcoError::Config(format!(
                "convergence_threshold must be > 0, got {}",
                self.convergence_threshold
            )));
        }
        if !(self.min_integration_time >= 0.0 && self.min_integration_time < self.t_max) {
            return Err(HotcoError::Config(format!(
                "min_integration_time must be in [0, t_max), got {}",
                self.min_integration_time
            )));
        }
        if !(self.base_horizon.is_finite()
            && self.base_dt > 0.0
            && self.base_dt <= self.base_horizon)
        {
            return Err(HotcoError::Config(format!(
                "base_dt must be in (0, base_horizon], got base_dt={} base_horizon={}",
                self.base_dt, self.base_horizon
            )));
        }
        if !(self.probability_temperature.is_finite() && self.probability_temperature > 0.0) {
            return Err(HotcoError::Config(format!(
                "probability_temperature must be finite and > 0, got {}",
                self.probability_temperature
            )));
        }
        if !self.env_valence_weight.is_finite() {
            return Err(HotcoError::Config(
                "env_valence_weight must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from JSON string. Absent fields take their defaults.
    pub fn from_json(json: &str) -> HotcoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| HotcoError::Config(format!("JSON parse error: {e}")))
    }

    /// Number of points on the evaluation grid, endpoints included.
    pub fn eval_points(&self) -> usize {
        (self.t_max / self.dt_eval + 1e-9).floor() as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_eval_points_default() {
        assert_eq!(EngineConfig::default().eval_points(), 101);
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let cfg = EngineConfig {
            dt_eval: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(HotcoError::Config(_))));
    }

    #[test]
    fn test_rejects_step_above_horizon() {
        let cfg = EngineConfig {
            t_max: 1.0,
            dt_eval: 2.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_nan_temperature() {
        let cfg = EngineConfig {
            probability_temperature: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_min_time_past_horizon() {
        let cfg = EngineConfig {
            t_max: 1.0,
            min_integration_time: 1.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = EngineConfig::from_json(r#"{"t_max": 4.0, "solver": "euler"}"#).unwrap();
        assert_eq!(cfg.t_max, 4.0);
        assert_eq!(cfg.solver, SolverKind::Euler);
        assert_eq!(cfg.dt_eval, 0.1);
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(HotcoError::Config(_))
        ));
    }
}
