// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Choice Engine (Orchestrator)
// ─────────────────────────────────────────────────────────────────────
//! Per agent:
//!   1. Build W_pos / W_neg from beliefs and initial valences
//!   2. Base preference: stressor-free Euler run → C_structural
//!   3. Stressor perturbation → P, effective stress
//!   4. D_environmental from P and the base preference
//!   5. Integrate the perturbed field on the evaluation grid
//!   6. Convergence → reaction time, read-out state
//!   7. Final choice, confidence, probabilities, D_behavioral
//!   8. Trace
//!
//! Agents share nothing; the batch is mapped on the rayon pool.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use hotco_dynamics::{
    integrate, normalized_entropy, softmax, Connectivity, FieldContext, Perturbation, Scalar,
    ShuntingField, ShuntingParams, StressorPerturbation, TimeGrid, Tolerances, N_PARAMS,
};
use hotco_types::topology::{actions_of, argmax, top_two};
use hotco_types::{
    clamp_unit, DeliberationTrace, DissonanceType, EngineConfig, HotcoError, HotcoResult, Mode,
    StateVector, N_ACTIONS, N_NODES,
};

use crate::base_preference::{self, BasePreference};
use crate::convergence::{self, Convergence};
use crate::dissonance::{environmental_pressure, DissonanceTriad};
use crate::input::{validate_batch, AgentInput};
use crate::passport::CognitivePassport;

/// Result of one batched simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    /// State at each agent's own convergence point.
    pub final_states: Vec<StateVector>,
    pub traces: Option<Vec<DeliberationTrace>>,
}

/// High-level per-agent prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoicePrediction {
    pub choice: Mode,
    pub probabilities: BTreeMap<Mode, f64>,
    pub confidence: f64,
    pub reaction_time: f64,
    pub structural_conflict: f64,
    pub environmental_pressure: f64,
    pub behavioral_dissonance: u8,
    pub base_preference: Mode,
    pub stress_level: f64,
    pub dissonance_type: DissonanceType,
    pub trace: DeliberationTrace,
}

impl ChoicePrediction {
    pub fn is_dissonant(&self) -> bool {
        self.behavioral_dissonance == 1
    }
}

impl From<DeliberationTrace> for ChoicePrediction {
    fn from(trace: DeliberationTrace) -> Self {
        Self {
            choice: trace.final_choice,
            probabilities: trace.probabilities.clone(),
            confidence: trace.choice_confidence,
            reaction_time: trace.reaction_time,
            structural_conflict: trace.structural_conflict,
            environmental_pressure: trace.environmental_pressure,
            behavioral_dissonance: trace.behavioral_dissonance,
            base_preference: trace.base_preference,
            stress_level: trace.stress_level,
            dissonance_type: trace.dissonance_type(),
            trace,
        }
    }
}

/// Trajectory of one agent under the perturbed field.
pub(crate) struct AgentRun<T> {
    pub states: Vec<[T; N_NODES]>,
    pub convergence: Convergence,
    pub perturbation: Perturbation<T>,
}

impl<T: Scalar> AgentRun<T> {
    pub fn final_state(&self) -> [T; N_NODES] {
        self.states[self.convergence.final_index]
    }
}

/// Deep HOTCO choice engine.
///
/// Thread-safe: a shared `&ChoiceEngine` may simulate from any thread;
/// the most recent traces are guarded by a `parking_lot::Mutex`.
pub struct ChoiceEngine {
    config: EngineConfig,
    field: ShuntingField,
    perturbation: StressorPerturbation,
    grid: TimeGrid,
    last_traces: Mutex<Option<Vec<DeliberationTrace>>>,
}

impl ChoiceEngine {
    pub fn new(config: EngineConfig) -> HotcoResult<Self> {
        Self::with_perturbation(config, StressorPerturbation::new())
    }

    pub fn with_perturbation(
        config: EngineConfig,
        perturbation: StressorPerturbation,
    ) -> HotcoResult<Self> {
        config.validate()?;
        let grid = TimeGrid::with_points(config.eval_points(), config.dt_eval);
        Ok(Self {
            config,
            field: ShuntingField::new(ShuntingParams::default()),
            perturbation,
            grid,
            last_traces: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn perturbation(&self) -> &StressorPerturbation {
        &self.perturbation
    }

    pub fn perturbation_mut(&mut self) -> &mut StressorPerturbation {
        &mut self.perturbation
    }

    pub fn field(&self) -> &ShuntingField {
        &self.field
    }

    /// Evaluation grid of the full simulation.
    pub fn time_grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Traces of the most recent simulation run with tracing.
    pub fn last_traces(&self) -> Option<Vec<DeliberationTrace>> {
        self.last_traces.lock().clone()
    }

    /// Simulate a batch. Inputs are validated before any integration.
    pub fn simulate(
        &self,
        agents: &[AgentInput],
        return_trace: bool,
    ) -> HotcoResult<SimulationOutput> {
        validate_batch(agents)?;
        log::debug!(
            "simulate: {} agents, solver={:?}, t_max={}, parallel={}",
            agents.len(),
            self.config.solver,
            self.config.t_max,
            self.config.parallel
        );

        let results: Vec<(StateVector, Option<DeliberationTrace>)> = if self.config.parallel {
            agents
                .par_iter()
                .enumerate()
                .map(|(id, a)| self.simulate_agent(id, a, return_trace))
                .collect()
        } else {
            agents
                .iter()
                .enumerate()
                .map(|(id, a)| self.simulate_agent(id, a, return_trace))
                .collect()
        };

        let (final_states, traces): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let traces = if return_trace {
            let traces: Vec<DeliberationTrace> = traces.into_iter().flatten().collect();
            *self.last_traces.lock() = Some(traces.clone());
            Some(traces)
        } else {
            None
        };
        Ok(SimulationOutput {
            final_states,
            traces,
        })
    }

    /// One prediction per agent, projected from the traces.
    pub fn predict_choice(&self, agents: &[AgentInput]) -> HotcoResult<Vec<ChoicePrediction>> {
        let out = self.simulate(agents, true)?;
        Ok(out
            .traces
            .unwrap_or_default()
            .into_iter()
            .map(ChoicePrediction::from)
            .collect())
    }

    /// Simulate one agent and assemble its passport.
    pub fn generate_passport(
        &self,
        agent_id: &str,
        input: &AgentInput,
    ) -> HotcoResult<CognitivePassport> {
        let out = self.simulate(std::slice::from_ref(input), true)?;
        let trace = out
            .traces
            .and_then(|t| t.into_iter().next())
            .ok_or_else(|| HotcoError::Numerical("simulation produced no trace".to_string()))?;
        let final_state = out.final_states.first().copied().unwrap_or(input.initial_state);
        Ok(CognitivePassport::assemble(
            agent_id,
            input,
            &trace,
            &final_state,
            self.config.probability_temperature,
        ))
    }

    /// Perturbed trajectory of one agent under the given log-space
    /// parameters. Generic so that dual numbers carry parameter
    /// derivatives through perturbation, field and integrator.
    pub(crate) fn run_agent<T: Scalar>(
        &self,
        input: &AgentInput,
        connectivity: &Connectivity,
        log_params: &[T; N_PARAMS],
    ) -> AgentRun<T> {
        let perturbation =
            self.perturbation
                .forward_with(log_params, &input.stressors, &input.tolerances);
        let ctx = FieldContext {
            connectivity,
            feasibility: &input.feasibility,
            perturbation: Some(&perturbation.vector),
        };
        let tol = Tolerances {
            rtol: self.config.rtol,
            atol: self.config.atol,
        };
        let y0: [T; N_NODES] = input.initial_state.map(T::constant);
        let states = integrate(
            self.config.solver,
            |s: &[T; N_NODES]| self.field.derivative(s, &ctx),
            &y0,
            &self.grid,
            &tol,
        );
        let convergence = convergence::detect(
            &self.grid.times,
            &states,
            self.config.convergence_threshold,
            self.config.min_integration_time,
            self.config.dt_eval,
        );
        AgentRun {
            states,
            convergence,
            perturbation,
        }
    }

    /// Final action activations under `log_params`.
    pub(crate) fn final_actions_with<T: Scalar>(
        &self,
        input: &AgentInput,
        log_params: &[T; N_PARAMS],
    ) -> [T; N_ACTIONS] {
        let connectivity = Connectivity::build(&input.beliefs, &input.initial_state);
        let run = self.run_agent(input, &connectivity, log_params);
        actions_of(&run.final_state())
    }

    pub(crate) fn base_preference(
        &self,
        input: &AgentInput,
        connectivity: &Connectivity,
    ) -> BasePreference {
        base_preference::estimate(
            &self.field,
            connectivity,
            &input.feasibility,
            &input.initial_state,
            self.config.base_horizon,
            self.config.base_dt,
        )
    }

    fn simulate_agent(
        &self,
        agent_id: usize,
        input: &AgentInput,
        return_trace: bool,
    ) -> (StateVector, Option<DeliberationTrace>) {
        let connectivity = Connectivity::build(&input.beliefs, &input.initial_state);
        let run = self.run_agent(input, &connectivity, &self.perturbation.params());
        let final_state = run.final_state();
        if !return_trace {
            return (final_state, None);
        }

        let base = self.base_preference(input, &connectivity);
        let d_env = environmental_pressure(
            &run.perturbation.vector,
            base.preference,
            self.config.env_valence_weight,
        );

        let temperature = self.config.probability_temperature;
        let readout = Readout::from_actions(&actions_of(&final_state), temperature);
        let triad = DissonanceTriad::compute(
            clamp_unit(base.structural_conflict, 0.0, 1.0),
            d_env,
            readout.choice,
            base.preference,
        );

        let conflict_intensity = run
            .states
            .iter()
            .map(|s| normalized_entropy(&actions_of(s), temperature))
            .collect();

        let trace = DeliberationTrace {
            agent_id,
            timestamps: self.grid.times.clone(),
            states: run.states,
            reaction_time: run.convergence.reaction_time,
            convergence_achieved: run.convergence.converged,
            final_choice: readout.choice,
            choice_confidence: readout.confidence,
            probabilities: readout.probabilities,
            structural_conflict: triad.structural_conflict,
            environmental_pressure: triad.environmental_pressure,
            behavioral_dissonance: triad.behavioral_dissonance,
            base_preference: base.preference,
            base_activations: base.activations,
            stress_level: clamp_unit(run.perturbation.effective_stress, 0.0, f64::MAX),
            conflict_intensity,
        };
        (final_state, Some(trace))
    }
}

/// Choice, confidence and probabilities read from final activations.
/// Confidence and probabilities are clamped to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Readout {
    pub choice: Mode,
    pub confidence: f64,
    pub probabilities: BTreeMap<Mode, f64>,
}

impl Readout {
    pub fn from_actions(actions: &[f64; N_ACTIONS], temperature: f64) -> Self {
        let (top1, top2) = top_two(actions);
        let probs = softmax(actions, temperature);
        Self {
            choice: Mode::from_index(argmax(actions)).unwrap_or(Mode::Car),
            confidence: clamp_unit(top1 - top2, 0.0, 1.0),
            probabilities: Mode::ALL
                .iter()
                .map(|&m| (m, clamp_unit(probs[m.index()], 0.0, 1.0)))
                .collect(),
        }
    }
}
