// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Stressor Perturbation Unit
// ─────────────────────────────────────────────────────────────────────
//! Maps stressor intensities and tolerances onto an additive 17-node
//! perturbation:
//!
//!   vulnerability = (1 - tolerance)^1.5
//!   eff           = stressor ⊙ vulnerability ⊙ exp(log_scale)
//!   P             = (eff @ (sign_mask ⊙ softplus(raw))) · exp(log_global)
//!   stress        = mean(eff)
//!
//! Only the 6 log-space scalars are learnable; the sign mask and the raw
//! magnitudes are frozen.

use serde::{Deserialize, Serialize};

use hotco_types::{HotcoError, HotcoResult, N_NODES, N_STRESSORS};

use crate::params::{
    build_magnitude_targets, build_raw_magnitudes, build_sign_mask, StressorTable,
    GLOBAL_MAGNITUDE_PARAM, INITIAL_GLOBAL_MAGNITUDE, INITIAL_STRESSOR_SCALE, N_PARAMS,
    VULNERABILITY_EXPONENT,
};
use crate::scalar::{softplus, Scalar};

/// The 6 learnable parameters in log space: 5 stressor scales, then the
/// global magnitude.
pub type ParamVector = [f64; N_PARAMS];

/// Output of one perturbation evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Perturbation<T> {
    pub vector: [T; N_NODES],
    /// Mean effective stressor intensity.
    pub effective_stress: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressorPerturbation {
    sign_mask: StressorTable,
    raw_magnitudes: StressorTable,
    log_params: ParamVector,
}

impl Default for StressorPerturbation {
    fn default() -> Self {
        Self::new()
    }
}

impl StressorPerturbation {
    /// Theory tables with scales at 1.5 and global magnitude at 2.0.
    pub fn new() -> Self {
        let mut log_params = [INITIAL_STRESSOR_SCALE.ln(); N_PARAMS];
        log_params[GLOBAL_MAGNITUDE_PARAM] = INITIAL_GLOBAL_MAGNITUDE.ln();
        Self {
            sign_mask: build_sign_mask(),
            raw_magnitudes: build_raw_magnitudes(&build_magnitude_targets()),
            log_params,
        }
    }

    /// Custom topology. `magnitudes` are the target |effects|, mapped
    /// through the inverse softplus.
    pub fn with_tables(sign_mask: StressorTable, magnitudes: StressorTable) -> HotcoResult<Self> {
        for row in sign_mask.iter() {
            if let Some(bad) = row.iter().find(|&&v| v != 0.0 && v != 1.0 && v != -1.0) {
                return Err(HotcoError::Validation(format!(
                    "sign mask entries must be -1, 0 or +1, got {bad}"
                )));
            }
        }
        if magnitudes.iter().flatten().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(HotcoError::Validation(
                "perturbation magnitudes must be finite and >= 0".to_string(),
            ));
        }
        Ok(Self {
            sign_mask,
            raw_magnitudes: build_raw_magnitudes(&magnitudes),
            ..Self::new()
        })
    }

    /// Unit whose sign mask is all zero: every stressor is inert.
    pub fn silenced() -> Self {
        Self {
            sign_mask: [[0.0; N_NODES]; N_STRESSORS],
            ..Self::new()
        }
    }

    pub fn sign_mask(&self) -> &StressorTable {
        &self.sign_mask
    }

    /// sign_mask ⊙ softplus(raw_magnitudes).
    pub fn perturbation_matrix(&self) -> StressorTable {
        let mut m = [[0.0; N_NODES]; N_STRESSORS];
        for s in 0..N_STRESSORS {
            for i in 0..N_NODES {
                if self.sign_mask[s][i] != 0.0 {
                    m[s][i] = self.sign_mask[s][i] * softplus(self.raw_magnitudes[s][i]);
                }
            }
        }
        m
    }

    /// Log-space parameters.
    pub fn params(&self) -> ParamVector {
        self.log_params
    }

    pub fn set_params(&mut self, params: &ParamVector) -> HotcoResult<()> {
        if params.iter().any(|p| !p.is_finite()) {
            return Err(HotcoError::Numerical(format!(
                "log-space parameters must be finite, got {params:?}"
            )));
        }
        self.log_params = *params;
        Ok(())
    }

    /// Per-stressor scales in linear space.
    pub fn stressor_scale(&self) -> [f64; N_STRESSORS] {
        std::array::from_fn(|s| self.log_params[s].exp())
    }

    /// Global magnitude in linear space.
    pub fn global_magnitude(&self) -> f64 {
        self.log_params[GLOBAL_MAGNITUDE_PARAM].exp()
    }

    /// Evaluate with the unit's own parameters.
    pub fn forward(
        &self,
        stressors: &[f64; N_STRESSORS],
        tolerances: &[f64; N_STRESSORS],
    ) -> Perturbation<f64> {
        self.forward_with(&self.log_params, stressors, tolerances)
    }

    /// Evaluate with externally supplied log-space parameters, so that
    /// dual numbers can carry derivatives through.
    pub fn forward_with<T: Scalar>(
        &self,
        log_params: &[T; N_PARAMS],
        stressors: &[f64; N_STRESSORS],
        tolerances: &[f64; N_STRESSORS],
    ) -> Perturbation<T> {
        let matrix = self.perturbation_matrix();
        let global = log_params[GLOBAL_MAGNITUDE_PARAM].exp();

        let eff: [T; N_STRESSORS] = std::array::from_fn(|s| {
            let vulnerability = (1.0 - tolerances[s]).max(0.0).powf(VULNERABILITY_EXPONENT);
            log_params[s].exp() * (stressors[s] * vulnerability)
        });

        let mut vector = [T::zero(); N_NODES];
        for (i, out) in vector.iter_mut().enumerate() {
            let mut acc = T::zero();
            for s in 0..N_STRESSORS {
                if matrix[s][i] != 0.0 {
                    acc += eff[s] * matrix[s][i];
                }
            }
            *out = acc * global;
        }

        let mut total = T::zero();
        for e in eff.iter() {
            total += *e;
        }

        Perturbation {
            vector,
            effective_stress: total / N_STRESSORS as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Dual;
    use hotco_types::topology::ACTION_RANGE;
    use hotco_types::{Mode, Need};

    #[test]
    fn test_initial_parameters() {
        let unit = StressorPerturbation::new();
        for s in unit.stressor_scale() {
            assert!((s - 1.5).abs() < 1e-12);
        }
        assert!((unit.global_magnitude() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_stress_no_perturbation() {
        let unit = StressorPerturbation::new();
        let p = unit.forward(&[0.0; 5], &[0.3; 5]);
        assert!(p.vector.iter().all(|&v| v == 0.0));
        assert_eq!(p.effective_stress, 0.0);
    }

    #[test]
    fn test_full_tolerance_cancels_stress() {
        let unit = StressorPerturbation::new();
        let p = unit.forward(&[1.0; 5], &[1.0; 5]);
        assert!(p.vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rain_only_hand_computed() {
        let unit = StressorPerturbation::new();
        let p = unit.forward(&[1.0, 0.0, 0.0, 0.0, 0.0], &[0.0; 5]);
        // eff = 1.0 × 1.0 × 1.5, P = eff × effect × 2.0
        let bike = p.vector[Mode::Bike.valence_node()];
        assert!((bike - (-0.8 * 1.5 * 2.0)).abs() < 1e-9);
        let comfort = p.vector[Need::Comfort.node()];
        assert!((comfort - (-0.5 * 1.5 * 2.0)).abs() < 1e-9);
        assert!((p.effective_stress - 1.5 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_actions_unperturbed() {
        let unit = StressorPerturbation::new();
        let p = unit.forward(&[0.7; 5], &[0.1; 5]);
        for node in ACTION_RANGE {
            assert_eq!(p.vector[node], 0.0);
        }
    }

    #[test]
    fn test_silenced_unit_is_inert() {
        let unit = StressorPerturbation::silenced();
        let p = unit.forward(&[1.0; 5], &[0.0; 5]);
        assert!(p.vector.iter().all(|&v| v == 0.0));
        assert!(p.effective_stress > 0.0);
    }

    #[test]
    fn test_with_tables_rejects_bad_sign() {
        let mut mask = build_sign_mask();
        mask[0][0] = 0.5;
        assert!(StressorPerturbation::with_tables(mask, build_magnitude_targets()).is_err());
    }

    #[test]
    fn test_set_params_rejects_nan() {
        let mut unit = StressorPerturbation::new();
        assert!(unit.set_params(&[f64::NAN; 6]).is_err());
        assert!(unit.set_params(&[0.0; 6]).is_ok());
        assert!((unit.global_magnitude() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dual_gradient_matches_fd() {
        let unit = StressorPerturbation::new();
        let stressors = [0.4, 0.2, 0.6, 0.1, 0.8];
        let tolerances = [0.2, 0.5, 0.1, 0.3, 0.4];
        let base = unit.params();
        let duals: [Dual<6>; 6] = std::array::from_fn(|i| Dual::variable(base[i], i));
        let p = unit.forward_with(&duals, &stressors, &tolerances);
        let node = Mode::Walk.valence_node();

        for k in 0..6 {
            let mut plus = base;
            let mut minus = base;
            plus[k] += 1e-6;
            minus[k] -= 1e-6;
            let fp = unit.forward_with(&plus, &stressors, &tolerances).vector[node];
            let fm = unit.forward_with(&minus, &stressors, &tolerances).vector[node];
            let fd = (fp - fm) / 2e-6;
            assert!((p.vector[node].eps[k] - fd).abs() < 1e-6, "param {k}");
        }
    }
}
