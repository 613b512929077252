// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Service Payload
// ─────────────────────────────────────────────────────────────────────
//! Named-key request/response contract of the prediction service. The
//! service answers with `{probabilities, confidence}` only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hotco_types::{
    BeliefMatrix, HotcoError, HotcoResult, Mode, Need, Stressor, N_ACTIONS, N_NEEDS, N_STRESSORS,
    N_VALENCES,
};

use crate::engine::ChoiceEngine;
use crate::input::AgentInput;

/// Belief used for every (mode, need) pair the request leaves out.
pub const DEFAULT_BELIEF: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRequest {
    pub needs: BTreeMap<String, f64>,
    pub valences: BTreeMap<String, f64>,
    pub stressors: BTreeMap<String, f64>,
    pub tolerances: BTreeMap<String, f64>,
    /// Missing modes are available.
    #[serde(default)]
    pub feasibility: Option<BTreeMap<String, f64>>,
    /// `beliefs[mode][need]`.
    #[serde(default)]
    pub beliefs: Option<BTreeMap<String, BTreeMap<String, f64>>>,
}

fn lookup(section: &str, map: &BTreeMap<String, f64>, key: &str) -> HotcoResult<f64> {
    map.get(key).copied().ok_or_else(|| HotcoError::MissingKey {
        section: section.to_string(),
        key: key.to_string(),
    })
}

impl ChoiceRequest {
    pub fn from_json(json: &str) -> HotcoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the named keys into an engine input.
    pub fn to_agent_input(&self) -> HotcoResult<AgentInput> {
        let mut needs = [0.0; N_NEEDS];
        for need in Need::ALL {
            needs[need.index()] = lookup("needs", &self.needs, need.label())?;
        }
        let mut valences = [0.0; N_VALENCES];
        for mode in Mode::ALL {
            valences[mode.index()] = lookup("valences", &self.valences, mode.label())?;
        }
        let mut stressors = [0.0; N_STRESSORS];
        let mut tolerances = [0.0; N_STRESSORS];
        for s in Stressor::ALL {
            stressors[s.index()] = lookup("stressors", &self.stressors, s.label())?;
            tolerances[s.index()] = lookup("tolerances", &self.tolerances, s.label())?;
        }

        let mut feasibility = [1.0; N_ACTIONS];
        if let Some(map) = &self.feasibility {
            for mode in Mode::ALL {
                if let Some(&f) = map.get(mode.label()) {
                    feasibility[mode.index()] = f;
                }
            }
        }

        let mut beliefs: BeliefMatrix = [[DEFAULT_BELIEF; N_NEEDS]; N_ACTIONS];
        if let Some(rows) = &self.beliefs {
            for mode in Mode::ALL {
                let Some(row) = rows.get(mode.label()) else {
                    continue;
                };
                for need in Need::ALL {
                    if let Some(&b) = row.get(need.label()) {
                        beliefs[mode.index()][need.index()] = b;
                    }
                }
            }
        }

        let input = AgentInput::from_profile(
            needs,
            valences,
            beliefs,
            tolerances,
            stressors,
            feasibility,
            None,
        );
        input.validate()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceResponse {
    pub probabilities: BTreeMap<Mode, f64>,
    pub confidence: f64,
}

/// Handle one request end to end.
pub fn respond(engine: &ChoiceEngine, request: &ChoiceRequest) -> HotcoResult<ChoiceResponse> {
    let input = request.to_agent_input()?;
    let prediction = engine
        .predict_choice(std::slice::from_ref(&input))?
        .into_iter()
        .next()
        .ok_or_else(|| HotcoError::Numerical("simulation produced no prediction".to_string()))?;
    Ok(ChoiceResponse {
        probabilities: prediction.probabilities,
        confidence: prediction.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotco_types::EngineConfig;

    const SCENARIO: &str = r#"{
        "needs": {"pro_env": 0.1, "physical": 0.7, "privacy": 0.2, "autonomy": 0.3,
                  "hedonism": 0.7, "cost": 0.9, "speed": 0.3, "safety": 0.1, "comfort": 0.0},
        "valences": {"car": 0.0, "bike": 0.1, "pt": -0.5, "walk": 0.3},
        "stressors": {"rain": 0.1, "crowding": 0.2, "darkness": 0.0, "traffic": 0.1,
                      "temperature": 0.7},
        "tolerances": {"rain": 0.1, "crowding": 0.1, "darkness": 0.1, "traffic": 0.1,
                       "temperature": 0.1}
    }"#;

    #[test]
    fn test_scenario_response() {
        let engine = ChoiceEngine::new(EngineConfig::default()).unwrap();
        let req = ChoiceRequest::from_json(SCENARIO).unwrap();
        let resp = respond(&engine, &req).unwrap();
        assert_eq!(resp.probabilities.len(), 4);
        let total: f64 = resp.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!((0.0..=1.0).contains(&resp.confidence));

        let again = respond(&engine, &req).unwrap();
        assert_eq!(resp, again);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let mut req = ChoiceRequest::from_json(SCENARIO).unwrap();
        req.tolerances.remove("darkness");
        match req.to_agent_input() {
            Err(HotcoError::MissingKey { section, key }) => {
                assert_eq!(section, "tolerances");
                assert_eq!(key, "darkness");
            }
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let input = ChoiceRequest::from_json(SCENARIO)
            .unwrap()
            .to_agent_input()
            .unwrap();
        assert_eq!(input.feasibility, [1.0; 4]);
        assert!(input.beliefs.iter().flatten().all(|&b| b == DEFAULT_BELIEF));
        assert_eq!(input.initial_state[Need::Cost.node()], 0.9);
        assert_eq!(input.initial_state[Mode::Walk.valence_node()], 0.3);
    }

    #[test]
    fn test_partial_beliefs_and_feasibility() {
        let mut req = ChoiceRequest::from_json(SCENARIO).unwrap();
        req.feasibility = Some([("car".to_string(), 0.0)].into_iter().collect());
        req.beliefs = Some(
            [(
                "bike".to_string(),
                [("cost".to_string(), -0.8)].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
        );
        let input = req.to_agent_input().unwrap();
        assert_eq!(input.feasibility, [0.0, 1.0, 1.0, 1.0]);
        assert_eq!(input.initial_state[Mode::Car.action_node()], 0.0);
        assert_eq!(input.beliefs[Mode::Bike.index()][Need::Cost.index()], -0.8);
        assert_eq!(input.beliefs[Mode::Bike.index()][Need::Speed.index()], DEFAULT_BELIEF);
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let mut req = ChoiceRequest::from_json(SCENARIO).unwrap();
        req.stressors.insert("rain".to_string(), 1.5);
        assert!(matches!(req.to_agent_input(), Err(HotcoError::Validation(_))));
    }

    #[test]
    fn test_response_json_shape() {
        let resp = ChoiceResponse {
            probabilities: Mode::ALL.iter().map(|&m| (m, 0.25)).collect(),
            confidence: 0.1,
        };
        let v: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["probabilities"]["pt"], 0.25);
        assert_eq!(v["confidence"], 0.1);
    }
}
