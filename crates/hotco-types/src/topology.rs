// ─────────────────────────────────────────────────────────────────────
// Deep HOTCO — Cognitive Map Topology
// ─────────────────────────────────────────────────────────────────────
//! Fixed 17-node agent state layout.
//!
//! ```text
//!   idx 0-8    needs     [9]  ∈ [0, 1]
//!   idx 9-12   actions   [4]  ∈ [0, 1]   (car, bike, pt, walk)
//!   idx 13-16  valences  [4]  ∈ [-1, 1]
//! ```
//!
//! All node addressing goes through the constant tables below; there are
//! no string-keyed lookups on the hot path.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub const N_NEEDS: usize = 9;
pub const N_ACTIONS: usize = 4;
pub const N_VALENCES: usize = 4;
pub const N_NODES: usize = N_NEEDS + N_ACTIONS + N_VALENCES;
pub const N_STRESSORS: usize = 5;
pub const N_VALUES: usize = 5;

pub const NEED_OFFSET: usize = 0;
pub const ACTION_OFFSET: usize = N_NEEDS;
pub const VALENCE_OFFSET: usize = N_NEEDS + N_ACTIONS;

pub const NEED_RANGE: Range<usize> = NEED_OFFSET..ACTION_OFFSET;
pub const ACTION_RANGE: Range<usize> = ACTION_OFFSET..VALENCE_OFFSET;
pub const VALENCE_RANGE: Range<usize> = VALENCE_OFFSET..N_NODES;

/// Full agent state vector.
pub type StateVector = [f64; N_NODES];

/// Belief matrix: `beliefs[mode][need]` ∈ [-1, 1].
pub type BeliefMatrix = [[f64; N_NEEDS]; N_ACTIONS];

/// Psychological needs, in state order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    ProEnv,
    Physical,
    Privacy,
    Autonomy,
    Hedonism,
    Cost,
    Speed,
    Safety,
    Comfort,
}

impl Need {
    pub const ALL: [Need; N_NEEDS] = [
        Need::ProEnv,
        Need::Physical,
        Need::Privacy,
        Need::Autonomy,
        Need::Hedonism,
        Need::Cost,
        Need::Speed,
        Need::Safety,
        Need::Comfort,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn node(self) -> usize {
        NEED_OFFSET + self.index()
    }

    pub fn label(self) -> &'static str {
        match self {
            Need::ProEnv => "pro_env",
            Need::Physical => "physical",
            Need::Privacy => "privacy",
            Need::Autonomy => "autonomy",
            Need::Hedonism => "hedonism",
            Need::Cost => "cost",
            Need::Speed => "speed",
            Need::Safety => "safety",
            Need::Comfort => "comfort",
        }
    }
}

/// Competing transport modes (action nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Car,
    Bike,
    Pt,
    Walk,
}

impl Mode {
    pub const ALL: [Mode; N_ACTIONS] = [Mode::Car, Mode::Bike, Mode::Pt, Mode::Walk];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Action node of this mode.
    #[inline]
    pub fn action_node(self) -> usize {
        ACTION_OFFSET + self.index()
    }

    /// Valence node of this mode.
    #[inline]
    pub fn valence_node(self) -> usize {
        VALENCE_OFFSET + self.index()
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::Bike => "bike",
            Mode::Pt => "pt",
            Mode::Walk => "walk",
        }
    }

    /// Inverse of [`Mode::label`], case-insensitive.
    pub fn from_label(label: &str) -> Option<Mode> {
        Mode::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(label))
    }

    /// Mode for an action index, if in range.
    pub fn from_index(idx: usize) -> Option<Mode> {
        Mode::ALL.get(idx).copied()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_ascii_uppercase())
    }
}

/// Environmental stressors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stressor {
    Rain,
    Crowding,
    Darkness,
    Traffic,
    Temperature,
}

impl Stressor {
    pub const ALL: [Stressor; N_STRESSORS] = [
        Stressor::Rain,
        Stressor::Crowding,
        Stressor::Darkness,
        Stressor::Traffic,
        Stressor::Temperature,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Stressor::Rain => "rain",
            Stressor::Crowding => "crowding",
            Stressor::Darkness => "darkness",
            Stressor::Traffic => "traffic",
            Stressor::Temperature => "temperature",
        }
    }
}

/// Personal values. Descriptive metadata only: they never enter the dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalValue {
    Biospheric,
    Altruistic,
    Egoistic,
    Hedonic,
    Security,
}

impl PersonalValue {
    pub const ALL: [PersonalValue; N_VALUES] = [
        PersonalValue::Biospheric,
        PersonalValue::Altruistic,
        PersonalValue::Egoistic,
        PersonalValue::Hedonic,
        PersonalValue::Security,
    ];

    pub fn description(self) -> &'static str {
        match self {
            PersonalValue::Biospheric => "Values nature and environmental protection",
            PersonalValue::Altruistic => "Values welfare of others and social justice",
            PersonalValue::Egoistic => "Values personal success, wealth, and status",
            PersonalValue::Hedonic => "Values pleasure, comfort, and enjoyment",
            PersonalValue::Security => "Values safety, stability, and order",
        }
    }
}

/// Copy of the action segment of a state.
#[inline]
pub fn actions_of<T: Copy>(state: &[T; N_NODES]) -> [T; N_ACTIONS] {
    std::array::from_fn(|m| state[ACTION_OFFSET + m])
}

/// Copy of the needs segment of a state.
#[inline]
pub fn needs_of<T: Copy>(state: &[T; N_NODES]) -> [T; N_NEEDS] {
    std::array::from_fn(|n| state[NEED_OFFSET + n])
}

/// Copy of the valence segment of a state.
#[inline]
pub fn valences_of<T: Copy>(state: &[T; N_NODES]) -> [T; N_VALENCES] {
    std::array::from_fn(|m| state[VALENCE_OFFSET + m])
}

/// Index of the largest entry; the first one wins on ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Largest and second-largest entries (descending).
pub fn top_two(values: &[f64]) -> (f64, f64) {
    let mut first = f64::NEG_INFINITY;
    let mut second = f64::NEG_INFINITY;
    for &v in values {
        if v > first {
            second = first;
            first = v;
        } else if v > second {
            second = v;
        }
    }
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_partition_state() {
        assert_eq!(N_NODES, 17);
        assert_eq!(NEED_RANGE.len() + ACTION_RANGE.len() + VALENCE_RANGE.len(), N_NODES);
        assert_eq!(NEED_RANGE.end, ACTION_RANGE.start);
        assert_eq!(ACTION_RANGE.end, VALENCE_RANGE.start);
    }

    #[test]
    fn test_mode_nodes() {
        assert_eq!(Mode::Car.action_node(), 9);
        assert_eq!(Mode::Walk.action_node(), 12);
        assert_eq!(Mode::Car.valence_node(), 13);
        assert_eq!(Mode::Walk.valence_node(), 16);
    }

    #[test]
    fn test_need_order() {
        assert_eq!(Need::ProEnv.node(), 0);
        assert_eq!(Need::Comfort.node(), 8);
        assert_eq!(Need::ALL.iter().map(|n| n.index()).sum::<usize>(), 36);
    }

    #[test]
    fn test_mode_label_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_label(mode.label()), Some(mode));
            assert_eq!(Mode::from_label(&mode.to_string()), Some(mode));
        }
        assert_eq!(Mode::from_label("tram"), None);
    }

    #[test]
    fn test_mode_serde_lowercase() {
        let json = serde_json::to_string(&Mode::Pt).unwrap();
        assert_eq!(json, "\"pt\"");
        let need = serde_json::to_string(&Need::ProEnv).unwrap();
        assert_eq!(need, "\"pro_env\"");
    }

    #[test]
    fn test_argmax_first_on_tie() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), 1);
        assert_eq!(argmax(&[0.3, 0.3, 0.3, 0.3]), 0);
    }

    #[test]
    fn test_top_two() {
        assert_eq!(top_two(&[0.1, 0.7, 0.4, 0.7]), (0.7, 0.7));
        assert_eq!(top_two(&[0.9, 0.0, 0.2, 0.1]), (0.9, 0.2));
    }

    #[test]
    fn test_segment_views() {
        let state: StateVector = std::array::from_fn(|i| i as f64);
        assert_eq!(needs_of(&state)[8], 8.0);
        assert_eq!(actions_of(&state), [9.0, 10.0, 11.0, 12.0]);
        assert_eq!(valences_of(&state), [13.0, 14.0, 15.0, 16.0]);
    }
}
