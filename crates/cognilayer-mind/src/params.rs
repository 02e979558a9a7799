//! Vitality, Friction and Grounding with homeostatic drift

use crate::config::ParamsConfig;
use serde::{Deserialize, Serialize};

/// Golden ratio conjugate. Vitality rests here.
pub const PHI: f64 = 0.618_033_988_749_895;
/// `1 - PHI`. Friction rests here.
pub const PHI_COMPLEMENT: f64 = 1.0 - PHI;

/// Per-turn estimates fed into [`ParameterState::update`].
///
/// `sentiment` is in `[-1, 1]`, the other two in `[0, 1]`. Values outside
/// the range are clamped; non-finite values count as neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub sentiment: f64,
    pub factuality: f64,
    /// How far the input sits from what the agent already holds.
    pub idea_distance: f64,
}

impl Signal {
    pub fn neutral() -> Self {
        Self { sentiment: 0.0, factuality: 0.5, idea_distance: 0.5 }
    }

    fn sanitized(self) -> Self {
        let neutral = Self::neutral();
        Self {
            sentiment: finite_or(self.sentiment, neutral.sentiment).clamp(-1.0, 1.0),
            factuality: finite_or(self.factuality, neutral.factuality).clamp(0.0, 1.0),
            idea_distance: finite_or(self.idea_distance, neutral.idea_distance).clamp(0.0, 1.0),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Read-only reading of the parameters, strongest condition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    IdentityCrisis,
    CreativeUnrest,
    Expansion,
    Melancholy,
    Unsettled,
    Balanced,
}

impl Disposition {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::IdentityCrisis => "identity crisis: friction dominates, foundations under strain",
            Self::CreativeUnrest => "creative unrest: tension above rest, ideas in motion",
            Self::Expansion => "expansion: high vitality, open and energetic",
            Self::Melancholy => "melancholy: low vitality, withdrawn",
            Self::Unsettled => "unsettled: grounding below the golden ratio",
            Self::Balanced => "balanced",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// The three continuous parameters. Every mutation clamps to `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterState {
    vitality: f64,
    friction: f64,
    grounding: f64,
    /// Consecutive turns with grounding under `PHI_COMPLEMENT`.
    #[serde(default)]
    low_grounding_streak: u32,
    #[serde(skip)]
    config: ParamsConfig,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self::from_config(ParamsConfig::default())
    }
}

impl ParameterState {
    pub fn from_config(config: ParamsConfig) -> Self {
        Self {
            vitality: clamp_unit(config.initial_vitality),
            friction: clamp_unit(config.initial_friction),
            grounding: clamp_unit(config.initial_grounding),
            low_grounding_streak: 0,
            config,
        }
    }

    /// Explicit values with default dynamics.
    pub fn new(vitality: f64, friction: f64, grounding: f64) -> Self {
        let mut state = Self::default();
        state.vitality = clamp_unit(vitality);
        state.friction = clamp_unit(friction);
        state.grounding = clamp_unit(grounding);
        state
    }

    /// Reattach dynamics after deserializing a snapshot.
    pub fn with_config(mut self, config: ParamsConfig) -> Self {
        self.config = config;
        self.vitality = clamp_unit(self.vitality);
        self.friction = clamp_unit(self.friction);
        self.grounding = clamp_unit(self.grounding);
        self
    }

    pub fn vitality(&self) -> f64 {
        self.vitality
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn grounding(&self) -> f64 {
        self.grounding
    }

    /// `1 + friction / 2`, always in `[1.0, 1.5]`.
    pub fn plasticity(&self) -> f64 {
        1.0 + self.friction / 2.0
    }

    /// Apply one turn's signal. Sentiment moves vitality, distance from
    /// the midpoint moves friction, factuality moves grounding.
    pub fn update(&mut self, signal: Signal) {
        let s = signal.sanitized();
        self.vitality = clamp_unit(self.vitality + s.sentiment * self.config.vitality_step);
        self.friction = clamp_unit(self.friction + (s.idea_distance - 0.5) * 2.0 * self.config.friction_step);
        self.grounding = clamp_unit(self.grounding + (s.factuality - 0.5) * 2.0 * self.config.grounding_step);
    }

    /// Close a fixed fraction of the distance to the resting point.
    pub fn drift(&mut self) {
        let rate = self.config.drift_rate;
        self.vitality = clamp_unit(self.vitality + (PHI - self.vitality) * rate);
        self.friction = clamp_unit(self.friction + (PHI_COMPLEMENT - self.friction) * rate);
    }

    pub fn set_friction(&mut self, value: f64) {
        self.friction = clamp_unit(value);
    }

    pub fn adjust_vitality(&mut self, delta: f64) {
        self.vitality = clamp_unit(self.vitality + finite_or(delta, 0.0));
    }

    pub fn adjust_friction(&mut self, delta: f64) {
        self.friction = clamp_unit(self.friction + finite_or(delta, 0.0));
    }

    pub fn adjust_grounding(&mut self, delta: f64) {
        self.grounding = clamp_unit(self.grounding + finite_or(delta, 0.0));
    }

    /// Count a turn toward the grounding anchor. After enough consecutive
    /// low-grounding turns all three parameters snap to the golden ratios
    /// and `true` is returned.
    pub fn anchor_check(&mut self) -> bool {
        if self.grounding < PHI_COMPLEMENT {
            self.low_grounding_streak += 1;
        } else {
            self.low_grounding_streak = 0;
        }
        if self.config.grounding_anchor_turns > 0 && self.low_grounding_streak >= self.config.grounding_anchor_turns {
            self.vitality = PHI;
            self.friction = PHI_COMPLEMENT;
            self.grounding = PHI;
            self.low_grounding_streak = 0;
            return true;
        }
        false
    }

    pub fn low_grounding_streak(&self) -> u32 {
        self.low_grounding_streak
    }

    pub fn disposition(&self) -> Disposition {
        if self.friction > PHI {
            Disposition::IdentityCrisis
        } else if self.friction > PHI_COMPLEMENT {
            Disposition::CreativeUnrest
        } else if self.vitality > PHI {
            Disposition::Expansion
        } else if self.vitality < PHI_COMPLEMENT {
            Disposition::Melancholy
        } else if self.grounding < PHI {
            Disposition::Unsettled
        } else {
            Disposition::Balanced
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn clamp_unit(value: f64) -> f64 {
    finite_or(value, 0.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plasticity_bounds() {
        assert_eq!(ParameterState::new(0.5, 0.0, 0.5).plasticity(), 1.0);
        assert_eq!(ParameterState::new(0.5, 1.0, 0.5).plasticity(), 1.5);
    }

    #[test]
    fn non_finite_signal_is_neutral() {
        let mut p = ParameterState::new(0.5, 0.3, 0.7);
        p.update(Signal { sentiment: f64::NAN, factuality: f64::INFINITY, idea_distance: f64::NEG_INFINITY });
        assert_eq!(p.vitality(), 0.5);
        assert!((p.friction() - 0.3).abs() < 1e-12);
        assert!((p.grounding() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn anchor_fires_after_streak() {
        let mut p = ParameterState::new(0.2, 0.9, 0.1);
        assert!(!p.anchor_check());
        assert!(!p.anchor_check());
        assert!(p.anchor_check());
        assert_eq!(p.vitality(), PHI);
        assert_eq!(p.friction(), PHI_COMPLEMENT);
        assert_eq!(p.grounding(), PHI);
        assert_eq!(p.low_grounding_streak(), 0);
    }

    #[test]
    fn anchor_streak_resets_when_grounded() {
        let mut p = ParameterState::new(0.5, 0.5, 0.1);
        p.anchor_check();
        p.adjust_grounding(0.8);
        p.anchor_check();
        assert_eq!(p.low_grounding_streak(), 0);
    }
}
