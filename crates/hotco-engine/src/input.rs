// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Agent Inputs
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use hotco_dynamics::params::ACTION_PRIOR_GAIN;
use hotco_dynamics::sigmoid;
use hotco_types::topology::{ACTION_RANGE, NEED_RANGE, VALENCE_RANGE};
use hotco_types::{
    BeliefMatrix, HotcoError, HotcoResult, Mode, StateVector, N_ACTIONS, N_NEEDS, N_NODES,
    N_STRESSORS, N_VALENCES, N_VALUES,
};

/// Everything the engine needs to simulate one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub initial_state: StateVector,
    /// `beliefs[mode][need]` ∈ [-1, 1].
    pub beliefs: BeliefMatrix,
    pub tolerances: [f64; N_STRESSORS],
    pub stressors: [f64; N_STRESSORS],
    /// 1 = available, 0 = frozen; values in between damp the option.
    pub feasibility: [f64; N_ACTIONS],
    /// Descriptive metadata only.
    #[serde(default)]
    pub values: Option<[f64; N_VALUES]>,
}

impl AgentInput {
    /// Assemble an input from survey-level profiles. Actions start at
    /// `sigmoid(valence) × 0.2 × feasibility`, never at zero for a
    /// feasible option.
    #[allow(clippy::too_many_arguments)]
    pub fn from_profile(
        needs: [f64; N_NEEDS],
        valences: [f64; N_VALENCES],
        beliefs: BeliefMatrix,
        tolerances: [f64; N_STRESSORS],
        stressors: [f64; N_STRESSORS],
        feasibility: [f64; N_ACTIONS],
        values: Option<[f64; N_VALUES]>,
    ) -> Self {
        let mut initial_state = [0.0; N_NODES];
        for (i, &n) in needs.iter().enumerate() {
            initial_state[NEED_RANGE.start + i] = n;
        }
        for mode in Mode::ALL {
            let m = mode.index();
            initial_state[mode.valence_node()] = valences[m];
            initial_state[mode.action_node()] =
                sigmoid(valences[m]) * ACTION_PRIOR_GAIN * feasibility[m];
        }
        Self {
            initial_state,
            beliefs,
            tolerances,
            stressors,
            feasibility,
            values,
        }
    }

    /// Range and finiteness checks. Runs before any simulation work.
    pub fn validate(&self) -> HotcoResult<()> {
        check_range("initial_state.needs", &self.initial_state[NEED_RANGE], 0.0, 1.0)?;
        check_range("initial_state.actions", &self.initial_state[ACTION_RANGE], 0.0, 1.0)?;
        check_range("initial_state.valences", &self.initial_state[VALENCE_RANGE], -1.0, 1.0)?;
        for row in self.beliefs.iter() {
            check_range("beliefs", row, -1.0, 1.0)?;
        }
        check_range("tolerances", &self.tolerances, 0.0, 1.0)?;
        check_range("stressors", &self.stressors, 0.0, 1.0)?;
        check_range("feasibility", &self.feasibility, 0.0, 1.0)?;
        if let Some(values) = &self.values {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(HotcoError::Validation("values must be finite".to_string()));
            }
        }
        Ok(())
    }
}

fn check_range(what: &str, xs: &[f64], lo: f64, hi: f64) -> HotcoResult<()> {
    for (i, &x) in xs.iter().enumerate() {
        if !x.is_finite() || x < lo || x > hi {
            return Err(HotcoError::Validation(format!(
                "{what}[{i}] = {x} outside [{lo}, {hi}]"
            )));
        }
    }
    Ok(())
}

/// A batch of agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub agents: Vec<AgentInput>,
}

impl Population {
    pub fn new(agents: Vec<AgentInput>) -> Self {
        Self { agents }
    }

    /// Build from row-major batched tensors. Any length mismatch is a
    /// shape error.
    pub fn from_flat(
        n: usize,
        initial_state: &[f64],
        beliefs: &[f64],
        tolerances: &[f64],
        stressors: &[f64],
        feasibility: &[f64],
    ) -> HotcoResult<Self> {
        expect_len("initial_state", initial_state, n * N_NODES)?;
        expect_len("beliefs", beliefs, n * N_ACTIONS * N_NEEDS)?;
        expect_len("tolerances", tolerances, n * N_STRESSORS)?;
        expect_len("stressors", stressors, n * N_STRESSORS)?;
        expect_len("feasibility", feasibility, n * N_ACTIONS)?;

        let agents = (0..n)
            .map(|b| {
                let state = &initial_state[b * N_NODES..];
                let bel = &beliefs[b * N_ACTIONS * N_NEEDS..];
                AgentInput {
                    initial_state: std::array::from_fn(|i| state[i]),
                    beliefs: std::array::from_fn(|m| std::array::from_fn(|k| bel[m * N_NEEDS + k])),
                    tolerances: std::array::from_fn(|s| tolerances[b * N_STRESSORS + s]),
                    stressors: std::array::from_fn(|s| stressors[b * N_STRESSORS + s]),
                    feasibility: std::array::from_fn(|m| feasibility[b * N_ACTIONS + m]),
                    values: None,
                }
            })
            .collect();
        Ok(Self { agents })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn as_slice(&self) -> &[AgentInput] {
        &self.agents
    }

    pub fn validate(&self) -> HotcoResult<()> {
        validate_batch(&self.agents)
    }
}

/// Validate every agent; the first failure names its batch index.
pub fn validate_batch(agents: &[AgentInput]) -> HotcoResult<()> {
    for (b, agent) in agents.iter().enumerate() {
        agent.validate().map_err(|e| match e {
            HotcoError::Validation(msg) => HotcoError::Validation(format!("agent {b}: {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

fn expect_len(what: &'static str, xs: &[f64], expected: usize) -> HotcoResult<()> {
    if xs.len() != expected {
        return Err(HotcoError::Shape {
            what,
            expected,
            got: xs.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Commuter profile used across the engine tests.
    pub(crate) fn commuter() -> AgentInput {
        let mut beliefs = [[0.0; N_NEEDS]; N_ACTIONS];
        beliefs[Mode::Car.index()] = [-0.6, -0.4, 0.8, 0.8, 0.2, -0.4, 0.6, 0.4, 0.8];
        beliefs[Mode::Bike.index()] = [0.8, 0.8, 0.4, 0.6, 0.4, 0.6, 0.2, -0.2, -0.4];
        beliefs[Mode::Pt.index()] = [0.4, -0.2, -0.6, -0.4, -0.2, 0.4, 0.0, 0.2, -0.2];
        beliefs[Mode::Walk.index()] = [0.8, 0.6, 0.4, 0.6, 0.2, 0.8, -0.6, 0.0, -0.2];
        AgentInput::from_profile(
            [0.1, 0.7, 0.2, 0.3, 0.7, 0.9, 0.3, 0.1, 0.0],
            [0.0, 0.1, -0.5, 0.3],
            beliefs,
            [0.1; N_STRESSORS],
            [0.1, 0.2, 0.0, 0.1, 0.7],
            [1.0; N_ACTIONS],
            Some([0.6, 0.5, 0.3, 0.7, 0.4]),
        )
    }

    #[test]
    fn test_action_prior() {
        let a = AgentInput::from_profile(
            [0.5; 9],
            [0.0, 1.0, -1.0, 0.0],
            [[0.0; 9]; 4],
            [0.5; 5],
            [0.0; 5],
            [1.0, 1.0, 1.0, 0.0],
            None,
        );
        assert!((a.initial_state[Mode::Car.action_node()] - 0.1).abs() < 1e-12);
        assert!((a.initial_state[Mode::Bike.action_node()] - sigmoid(1.0) * 0.2).abs() < 1e-12);
        assert_eq!(a.initial_state[Mode::Walk.action_node()], 0.0);
        assert_eq!(a.initial_state[Mode::Pt.valence_node()], -1.0);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_commuter_is_valid() {
        assert!(commuter().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut a = commuter();
        a.stressors[2] = 1.5;
        let err = a.validate().unwrap_err();
        assert!(err.to_string().contains("stressors[2]"));

        let mut b = commuter();
        b.initial_state[Mode::Car.valence_node()] = f64::NAN;
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_from_flat_round_trip() {
        let a = commuter();
        let state: Vec<f64> = a.initial_state.iter().chain(a.initial_state.iter()).copied().collect();
        let beliefs: Vec<f64> = (0..2).flat_map(|_| a.beliefs.iter().flatten().copied()).collect();
        let tol: Vec<f64> = [a.tolerances, a.tolerances].concat();
        let st: Vec<f64> = [a.stressors, a.stressors].concat();
        let feas: Vec<f64> = [a.feasibility, a.feasibility].concat();
        let pop = Population::from_flat(2, &state, &beliefs, &tol, &st, &feas).unwrap();
        assert_eq!(pop.len(), 2);
        assert_eq!(pop.agents[1].beliefs, a.beliefs);
        assert_eq!(pop.agents[1].initial_state, a.initial_state);
    }

    #[test]
    fn test_from_flat_shape_error() {
        let err = Population::from_flat(1, &[0.0; 17], &[0.0; 35], &[0.0; 5], &[0.0; 5], &[1.0; 4])
            .unwrap_err();
        assert!(matches!(
            err,
            HotcoError::Shape {
                what: "beliefs",
                expected: 36,
                got: 35
            }
        ));
    }

    #[test]
    fn test_population_validate_names_agent() {
        let mut bad = commuter();
        bad.tolerances[0] = -0.1;
        let pop = Population::new(vec![commuter(), bad]);
        let err = pop.validate().unwrap_err();
        assert!(err.to_string().contains("agent 1"));
    }

    #[test]
    fn test_validate_batch_on_slices() {
        assert!(validate_batch(&[]).is_ok());
        let mut bad = commuter();
        bad.feasibility[3] = f64::INFINITY;
        let err = validate_batch(&[commuter(), commuter(), bad]).unwrap_err();
        assert!(err.to_string().contains("agent 2: feasibility[3]"));
    }
}
