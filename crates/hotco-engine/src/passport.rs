// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Cognitive Passport
// ─────────────────────────────────────────────────────────────────────
//! Structured explanation record of one agent's deliberation, for the
//! routing optimizer and for human review. Pure formatting over the trace
//! plus the final state; no wall-clock data, so the same inputs give the
//! same document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hotco_dynamics::softmax;
use hotco_types::topology::{actions_of, needs_of};
use hotco_types::{
    DeliberationTrace, DissonanceType, HotcoResult, Mode, Need, PersonalValue, StateVector,
    Stressor, N_NEEDS,
};

use crate::input::AgentInput;

pub const PASSPORT_VERSION: &str = "4.1.0";

/// Driver / inhibitor threshold on need × belief scores.
const XAI_SCORE_THRESHOLD: f64 = 0.1;
const XAI_MAX_LISTED: usize = 5;
const XAI_NARRATIVE_DRIVERS: usize = 3;

fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

fn round4(x: f64) -> f64 {
    round_to(x, 4)
}

// ── Bands ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StressBand {
    Low,
    Moderate,
    Elevated,
    High,
}

impl StressBand {
    pub fn from_level(stress: f64) -> Self {
        if stress < 0.2 {
            StressBand::Low
        } else if stress < 0.4 {
            StressBand::Moderate
        } else if stress < 0.6 {
            StressBand::Elevated
        } else {
            StressBand::High
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StressBand::Low => "Agent is resilient to current conditions",
            StressBand::Moderate => "Some environmental pressure present",
            StressBand::Elevated => "Significant stressor impact on decision",
            StressBand::High => "Strong environmental pressure, potential for dissonance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DifficultyBand {
    Easy,
    Moderate,
    Difficult,
    Conflicted,
}

impl DifficultyBand {
    pub fn from_conflict(c: f64) -> Self {
        if c < 0.2 {
            DifficultyBand::Easy
        } else if c < 0.4 {
            DifficultyBand::Moderate
        } else if c < 0.6 {
            DifficultyBand::Difficult
        } else {
            DifficultyBand::Conflicted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictBand {
    Low,
    Moderate,
    High,
}

impl ConflictBand {
    pub fn from_conflict(c: f64) -> Self {
        if c < 0.3 {
            ConflictBand::Low
        } else if c < 0.5 {
            ConflictBand::Moderate
        } else {
            ConflictBand::High
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConflictBand::Low => "Clear preference before context",
            ConflictBand::Moderate => "Some internal conflict",
            ConflictBand::High => "Significant value conflict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvironmentalEffect {
    Opposes,
    Reinforces,
    Minimal,
}

impl EnvironmentalEffect {
    pub fn from_pressure(d_env: f64) -> Self {
        if d_env > 0.3 {
            EnvironmentalEffect::Opposes
        } else if d_env < -0.3 {
            EnvironmentalEffect::Reinforces
        } else {
            EnvironmentalEffect::Minimal
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EnvironmentalEffect::Opposes => "Context OPPOSES base preference (high friction)",
            EnvironmentalEffect::Reinforces => "Context REINFORCES base preference (supportive)",
            EnvironmentalEffect::Minimal => "Context has MINIMAL effect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BehavioralAlignment {
    Aligned,
    Dissonance,
}

impl BehavioralAlignment {
    pub fn description(self) -> &'static str {
        match self {
            BehavioralAlignment::Aligned => "Final choice matches base preference",
            BehavioralAlignment::Dissonance => "Final choice conflicts with base preference",
        }
    }
}

// ── Sections ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub score: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSection {
    pub needs: BTreeMap<Need, f64>,
    pub tolerances: BTreeMap<Stressor, f64>,
    pub values: Option<BTreeMap<PersonalValue, ValueEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    pub stressors: BTreeMap<Stressor, f64>,
    pub effective_stress: f64,
    pub stress_interpretation: StressBand,
    pub stress_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationSection {
    /// Upper-case mode label.
    pub final_choice: String,
    pub probabilities: BTreeMap<Mode, f64>,
    pub confidence: f64,
    pub reaction_time_seconds: f64,
    pub convergence_achieved: bool,
    pub decision_difficulty: DifficultyBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissonanceSection {
    #[serde(rename = "C_structural")]
    pub c_structural: f64,
    #[serde(rename = "C_interpretation")]
    pub c_interpretation: ConflictBand,
    #[serde(rename = "C_description")]
    pub c_description: String,
    #[serde(rename = "D_environmental")]
    pub d_environmental: f64,
    #[serde(rename = "D_interpretation")]
    pub d_interpretation: EnvironmentalEffect,
    #[serde(rename = "D_description")]
    pub d_description: String,
    #[serde(rename = "D_behavioral")]
    pub d_behavioral: u8,
    #[serde(rename = "D_behavioral_interpretation")]
    pub d_behavioral_interpretation: BehavioralAlignment,
    pub dissonance_type: DissonanceType,
    pub base_preference: String,
    pub final_choice: String,
    pub preference_shifted: bool,
    pub shift_explanation: Option<String>,
}

/// Per-need utility weights for the routing optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityCoefficients {
    pub time_penalty: f64,
    pub cost_penalty: f64,
    pub safety_bonus: f64,
    pub eco_bonus: f64,
    pub comfort_penalty: f64,
    pub exercise_bonus: f64,
    pub privacy_bonus: f64,
    pub autonomy_bonus: f64,
}

impl UtilityCoefficients {
    pub fn from_needs(needs: &[f64; N_NEEDS]) -> Self {
        let n = |need: Need| round4(needs[need.index()]);
        Self {
            time_penalty: n(Need::Speed),
            cost_penalty: n(Need::Cost),
            safety_bonus: n(Need::Safety),
            eco_bonus: n(Need::ProEnv),
            comfort_penalty: n(Need::Comfort),
            exercise_bonus: n(Need::Physical),
            privacy_bonus: n(Need::Privacy),
            autonomy_bonus: n(Need::Autonomy),
        }
    }
}

/// Tolerance-derived routing hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualFlags {
    pub avoid_unlit_paths: bool,
    pub prefer_covered_paths: bool,
    pub tolerate_crowding: bool,
    pub avoid_traffic: bool,
    pub prefer_climate_control: bool,
}

impl ContextualFlags {
    pub fn from_tolerances(tolerances: &[f64; 5]) -> Self {
        let tol = |s: Stressor| tolerances[s.index()];
        Self {
            avoid_unlit_paths: tol(Stressor::Darkness) < 0.4,
            prefer_covered_paths: tol(Stressor::Rain) < 0.4,
            tolerate_crowding: tol(Stressor::Crowding) > 0.6,
            avoid_traffic: tol(Stressor::Traffic) < 0.4,
            prefer_climate_control: tol(Stressor::Temperature) < 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingSection {
    pub mode_weights: BTreeMap<Mode, f64>,
    pub utility_coefficients: UtilityCoefficients,
    pub contextual_flags: ContextualFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XaiSection {
    pub decision_narrative: String,
    pub key_drivers: Vec<Need>,
    pub key_inhibitors: Vec<Need>,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitivePassport {
    pub version: String,
    pub agent_id: String,
    pub profile: ProfileSection,
    pub context: ContextSection,
    pub deliberation: DeliberationSection,
    pub dissonance_triad: DissonanceSection,
    pub routing_parameters: RoutingSection,
    pub xai_summary: XaiSection,
}

/// Top-level JSON wrapper: `{"cognitive_passport": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PassportDocument {
    cognitive_passport: CognitivePassport,
}

impl CognitivePassport {
    pub fn assemble(
        agent_id: &str,
        input: &AgentInput,
        trace: &DeliberationTrace,
        final_state: &StateVector,
        temperature: f64,
    ) -> Self {
        Self {
            version: PASSPORT_VERSION.to_string(),
            agent_id: agent_id.to_string(),
            profile: profile_section(input),
            context: context_section(input, trace),
            deliberation: deliberation_section(trace),
            dissonance_triad: dissonance_section(trace),
            routing_parameters: routing_section(input, final_state, temperature),
            xai_summary: xai_section(input, trace, final_state),
        }
    }

    /// Final choice parsed back from the deliberation section.
    pub fn final_choice(&self) -> Option<Mode> {
        Mode::from_label(&self.deliberation.final_choice)
    }

    pub fn to_json(&self) -> HotcoResult<String> {
        let doc = PassportDocument {
            cognitive_passport: self.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn from_json(json: &str) -> HotcoResult<Self> {
        let doc: PassportDocument = serde_json::from_str(json)?;
        Ok(doc.cognitive_passport)
    }
}

fn profile_section(input: &AgentInput) -> ProfileSection {
    let needs = needs_of(&input.initial_state);
    ProfileSection {
        needs: Need::ALL.iter().map(|&n| (n, round4(needs[n.index()]))).collect(),
        tolerances: Stressor::ALL
            .iter()
            .map(|&s| (s, round4(input.tolerances[s.index()])))
            .collect(),
        values: input.values.map(|values| {
            PersonalValue::ALL
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    (
                        v,
                        ValueEntry {
                            score: round4(values[i]),
                            description: v.description().to_string(),
                        },
                    )
                })
                .collect()
        }),
    }
}

fn context_section(input: &AgentInput, trace: &DeliberationTrace) -> ContextSection {
    let band = StressBand::from_level(trace.stress_level);
    ContextSection {
        stressors: Stressor::ALL
            .iter()
            .map(|&s| (s, round4(input.stressors[s.index()])))
            .collect(),
        effective_stress: round4(trace.stress_level),
        stress_interpretation: band,
        stress_description: band.description().to_string(),
    }
}

fn deliberation_section(trace: &DeliberationTrace) -> DeliberationSection {
    DeliberationSection {
        final_choice: trace.final_choice.to_string(),
        probabilities: trace
            .probabilities
            .iter()
            .map(|(&m, &p)| (m, round4(p)))
            .collect(),
        confidence: round4(trace.choice_confidence),
        reaction_time_seconds: round_to(trace.reaction_time, 3),
        convergence_achieved: trace.convergence_achieved,
        decision_difficulty: DifficultyBand::from_conflict(trace.structural_conflict),
    }
}

fn dissonance_section(trace: &DeliberationTrace) -> DissonanceSection {
    let c_band = ConflictBand::from_conflict(trace.structural_conflict);
    let d_band = EnvironmentalEffect::from_pressure(trace.environmental_pressure);
    let alignment = if trace.is_dissonant() {
        BehavioralAlignment::Dissonance
    } else {
        BehavioralAlignment::Aligned
    };
    let shifted = trace.base_preference != trace.final_choice;
    let shift_explanation = shifted.then(|| {
        format!(
            "Agent shifted from {} to {} due to environmental pressure (D_env={:.3}) \
             and stress level ({:.3})",
            trace.base_preference, trace.final_choice, trace.environmental_pressure,
            trace.stress_level
        )
    });

    DissonanceSection {
        c_structural: round4(trace.structural_conflict),
        c_interpretation: c_band,
        c_description: c_band.description().to_string(),
        d_environmental: round4(trace.environmental_pressure),
        d_interpretation: d_band,
        d_description: d_band.description().to_string(),
        d_behavioral: trace.behavioral_dissonance,
        d_behavioral_interpretation: alignment,
        dissonance_type: trace.dissonance_type(),
        base_preference: trace.base_preference.to_string(),
        final_choice: trace.final_choice.to_string(),
        preference_shifted: shifted,
        shift_explanation,
    }
}

fn routing_section(input: &AgentInput, final_state: &StateVector, temperature: f64) -> RoutingSection {
    let probs = softmax(&actions_of(final_state), temperature);
    RoutingSection {
        mode_weights: Mode::ALL.iter().map(|&m| (m, round4(probs[m.index()]))).collect(),
        utility_coefficients: UtilityCoefficients::from_needs(&needs_of(final_state)),
        contextual_flags: ContextualFlags::from_tolerances(&input.tolerances),
    }
}

/// Needs ranked by `final_need × belief[choice][need]`: drivers above
/// +0.1 (strongest first), inhibitors below −0.1 (most negative first,
/// so a top-5 cut keeps the strongest inhibitors). Ties keep need order.
pub fn rank_drivers(
    beliefs_for_choice: &[f64; N_NEEDS],
    final_needs: &[f64; N_NEEDS],
) -> (Vec<Need>, Vec<Need>) {
    let mut scored: Vec<(Need, f64)> = Need::ALL
        .iter()
        .map(|&n| (n, beliefs_for_choice[n.index()] * final_needs[n.index()]))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let drivers = scored
        .iter()
        .filter(|(_, s)| *s > XAI_SCORE_THRESHOLD)
        .map(|(n, _)| *n)
        .collect();
    let inhibitors = scored
        .iter()
        .rev()
        .filter(|(_, s)| *s < -XAI_SCORE_THRESHOLD)
        .map(|(n, _)| *n)
        .collect();
    (drivers, inhibitors)
}

fn xai_section(input: &AgentInput, trace: &DeliberationTrace, final_state: &StateVector) -> XaiSection {
    let choice = trace.final_choice;
    let (drivers, inhibitors) = rank_drivers(&input.beliefs[choice.index()], &needs_of(final_state));

    let mut lead = format!("Agent chose {choice}");
    if !drivers.is_empty() {
        let names: Vec<&str> = drivers
            .iter()
            .take(XAI_NARRATIVE_DRIVERS)
            .map(|n| n.label())
            .collect();
        lead.push_str(&format!(", driven by {} needs", names.join(", ")));
    }
    let mut sentences = vec![lead];
    if trace.base_preference != choice {
        sentences[0].push_str(&format!(
            " despite base preference for {}",
            trace.base_preference
        ));
        sentences.push(format!(
            "Environmental pressure (D_env={:.2}) caused the shift",
            trace.environmental_pressure
        ));
    }
    if trace.structural_conflict > 0.5 {
        sentences.push("The decision involved significant internal conflict".to_string());
    }

    XaiSection {
        decision_narrative: format!("{}.", sentences.join(". ")),
        key_drivers: drivers.into_iter().take(XAI_MAX_LISTED).collect(),
        key_inhibitors: inhibitors.into_iter().take(XAI_MAX_LISTED).collect(),
        confidence_level: round4(trace.choice_confidence),
    }
}
