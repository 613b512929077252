// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Shunting Dynamics Unit
// ─────────────────────────────────────────────────────────────────────
//! Grossberg shunting competitive field with dual affective gating:
//!
//!   τ dS/dt = -A·S + (B - S)·relu(E) - (C + S)·relu(I)
//!
//!   E = gate_exc ⊙ (W_pos · S) + relu(P_needs)
//!   I = gate_inh ⊙ (W_neg · S) + lateral + relu(-P_needs)
//!
//! Gates act on the action rows only:
//!   gate_exc = sigmoid( α · (valence + P_valence))
//!   gate_inh = sigmoid(-β · (valence + P_valence))
//!
//! Lateral inhibition on action m: λ·other_m / (σ + other_m + ε), where
//! other_m is the summed activation of the three competitors.

use hotco_types::topology::{ACTION_OFFSET, ACTION_RANGE, NEED_RANGE, VALENCE_OFFSET};
use hotco_types::{N_ACTIONS, N_NODES};

use crate::connectivity::Connectivity;
use crate::params::{ShuntingParams, LATERAL_EPS};
use crate::scalar::Scalar;

/// Per-agent inputs held fixed while one trajectory is integrated.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a, T> {
    pub connectivity: &'a Connectivity,
    pub feasibility: &'a [f64; N_ACTIONS],
    /// None in the stressor-free base run.
    pub perturbation: Option<&'a [T; N_NODES]>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShuntingField {
    pub params: ShuntingParams,
}

impl ShuntingField {
    pub fn new(params: ShuntingParams) -> Self {
        Self { params }
    }

    /// dS/dt at `state`. Builds a fresh vector; the input is untouched.
    pub fn derivative<T: Scalar>(
        &self,
        state: &[T; N_NODES],
        ctx: &FieldContext<'_, T>,
    ) -> [T; N_NODES] {
        let p = &self.params;

        let mut ext_exc = [T::zero(); N_NODES];
        let mut ext_inh = [T::zero(); N_NODES];
        let mut gate_exc = [T::constant(1.0); N_NODES];
        let mut gate_inh = [T::constant(1.0); N_NODES];

        for m in 0..N_ACTIONS {
            let mut v_eval = state[VALENCE_OFFSET + m];
            if let Some(pert) = ctx.perturbation {
                v_eval += pert[VALENCE_OFFSET + m];
            }
            gate_exc[ACTION_OFFSET + m] = (v_eval * p.gating_alpha).sigmoid();
            gate_inh[ACTION_OFFSET + m] = (v_eval * -p.gating_beta).sigmoid();
        }
        if let Some(pert) = ctx.perturbation {
            for i in NEED_RANGE {
                ext_exc[i] = pert[i].relu();
                ext_inh[i] = (-pert[i]).relu();
            }
        }

        let mut lateral = [T::zero(); N_NODES];
        let mut total_action = T::zero();
        for i in ACTION_RANGE {
            total_action += state[i];
        }
        for i in ACTION_RANGE {
            let other = total_action - state[i];
            lateral[i] = other * p.lateral_inhibition / (other + p.divisive_sigma + LATERAL_EPS);
        }

        let w_pos = &ctx.connectivity.w_pos;
        let w_neg = &ctx.connectivity.w_neg;

        std::array::from_fn(|i| {
            let mut exc = T::zero();
            let mut inh = T::zero();
            for j in 0..N_NODES {
                if w_pos[i][j] != 0.0 {
                    exc += state[j] * w_pos[i][j];
                }
                if w_neg[i][j] != 0.0 {
                    inh += state[j] * w_neg[i][j];
                }
            }
            let total_exc = gate_exc[i] * exc + ext_exc[i];
            let total_inh = gate_inh[i] * inh + lateral[i] + ext_inh[i];

            let s = state[i];
            let ds = (s * -p.decay + (-s + p.excitatory_cap) * total_exc.relu()
                - (s + p.inhibitory_floor) * total_inh.relu())
                / p.tau;

            if ACTION_RANGE.contains(&i) {
                ds * ctx.feasibility[i - ACTION_OFFSET]
            } else {
                ds
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Dual;
    use hotco_types::{Mode, Need, StateVector};

    fn setup() -> (StateVector, Connectivity) {
        let mut state = [0.0; N_NODES];
        for (i, need) in Need::ALL.iter().enumerate() {
            state[need.node()] = 0.1 * (i as f64 + 1.0) % 1.0;
        }
        for mode in Mode::ALL {
            state[mode.action_node()] = 0.1;
            state[mode.valence_node()] = 0.2 * mode.index() as f64 - 0.3;
        }
        let beliefs = std::array::from_fn(|m| std::array::from_fn(|n| if (m + n) % 3 == 0 { 0.5 } else { -0.2 }));
        let conn = Connectivity::build(&beliefs, &state);
        (state, conn)
    }

    #[test]
    fn test_zero_state_decays_nowhere() {
        let conn = Connectivity::build(&[[0.0; 9]; 4], &[0.0; N_NODES]);
        let field = ShuntingField::default();
        let ctx = FieldContext::<f64> {
            connectivity: &conn,
            feasibility: &[1.0; 4],
            perturbation: None,
        };
        let d = field.derivative(&[0.0; N_NODES], &ctx);
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_lateral_inhibition_hand_computed() {
        // Isolated actions: only decay and lateral inhibition act.
        let conn = Connectivity {
            w_pos: [[0.0; N_NODES]; N_NODES],
            w_neg: [[0.0; N_NODES]; N_NODES],
        };
        let mut state = [0.0; N_NODES];
        state[Mode::Car.action_node()] = 0.5;
        state[Mode::Bike.action_node()] = 0.2;
        let ctx = FieldContext::<f64> {
            connectivity: &conn,
            feasibility: &[1.0; 4],
            perturbation: None,
        };
        let d = ShuntingField::default().derivative(&state, &ctx);
        let s = 0.5;
        let other = 0.2;
        let lat = 3.0 * other / (0.3 + other + 1e-6);
        let expected = (-0.15 * s - (0.1 + s) * lat) / 0.8;
        assert!((d[Mode::Car.action_node()] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_infeasible_action_frozen() {
        let (state, conn) = setup();
        let ctx = FieldContext::<f64> {
            connectivity: &conn,
            feasibility: &[1.0, 0.0, 1.0, 1.0],
            perturbation: None,
        };
        let d = ShuntingField::default().derivative(&state, &ctx);
        assert_eq!(d[Mode::Bike.action_node()], 0.0);
        assert_ne!(d[Mode::Car.action_node()], 0.0);
    }

    #[test]
    fn test_positive_need_perturbation_excites() {
        let (state, conn) = setup();
        let mut pert = [0.0; N_NODES];
        pert[Need::Safety.node()] = 0.8;
        let field = ShuntingField::default();
        let base = field.derivative(
            &state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: None },
        );
        let pushed = field.derivative(
            &state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: Some(&pert) },
        );
        assert!(pushed[Need::Safety.node()] > base[Need::Safety.node()]);
    }

    #[test]
    fn test_negative_valence_perturbation_dampens_action() {
        let (state, conn) = setup();
        let mut pert = [0.0; N_NODES];
        pert[Mode::Walk.valence_node()] = -2.0;
        let field = ShuntingField::default();
        let base = field.derivative(
            &state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: None },
        );
        let pushed = field.derivative(
            &state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: Some(&pert) },
        );
        assert!(pushed[Mode::Walk.action_node()] < base[Mode::Walk.action_node()]);
    }

    #[test]
    fn test_dual_path_matches_value_path() {
        let (state, conn) = setup();
        let mut pert = [0.0; N_NODES];
        pert[Need::Comfort.node()] = -0.4;
        pert[Mode::Car.valence_node()] = 0.3;
        let field = ShuntingField::default();
        let plain = field.derivative(
            &state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: Some(&pert) },
        );
        let dual_state: [Dual<2>; N_NODES] = state.map(Dual::constant);
        let dual_pert: [Dual<2>; N_NODES] = pert.map(Dual::constant);
        let dual = field.derivative(
            &dual_state,
            &FieldContext { connectivity: &conn, feasibility: &[1.0; 4], perturbation: Some(&dual_pert) },
        );
        for i in 0..N_NODES {
            assert!((plain[i] - dual[i].re).abs() < 1e-14);
            assert_eq!(dual[i].eps, [0.0, 0.0]);
        }
    }
}
