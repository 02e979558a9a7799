//! Engine configuration
//!
//! Every threshold the engine uses lives here. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. Defaults are the
//! reference constants; changing them changes behavior, not contracts.

use cognilayer_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MindConfig {
    pub params: ParamsConfig,
    pub graph: GraphConfig,
    pub tiers: TierConfig,
    pub consolidation: ConsolidationConfig,
    pub chain: ChainConfig,
    pub evolve: EvolveConfig,
    pub sovereignty: SovereigntyConfig,
    pub katharsis: KatharsisConfig,
    pub context: ContextConfig,
    pub feedback: FeedbackConfig,
    pub generation: GenerationConfig,
}

/// Parameter dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    pub initial_vitality: f64,
    pub initial_friction: f64,
    pub initial_grounding: f64,
    /// Largest vitality change one turn can cause.
    pub vitality_step: f64,
    /// Largest friction change one turn can cause.
    pub friction_step: f64,
    /// Largest grounding change one turn can cause.
    pub grounding_step: f64,
    /// Fraction of the remaining distance to target closed per drift tick.
    pub drift_rate: f64,
    /// Consecutive low-grounding turns before the parameters snap back.
    pub grounding_anchor_turns: u32,
}

/// A value planted as DNA in a fresh graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Foundation {
    pub label: String,
    pub description: String,
    /// Labels of other foundations this one supports.
    #[serde(default)]
    pub supports: Vec<String>,
}

impl Foundation {
    fn new(label: &str, description: &str, supports: &[&str]) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            supports: supports.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Memory graph rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Multiplicative salience loss per tick for non-DNA nodes.
    pub decay_rate: f64,
    /// Ephemeral nodes below this salience are evicted.
    pub eviction_floor: f64,
    /// Depth at which a node is promoted to DNA.
    pub dna_depth_ceiling: f64,
    /// Share of a positive reinforcement that becomes depth.
    pub depth_gain: f64,
    /// Share of a negative reinforcement taken from depth (non-DNA only).
    pub punishment_ratio: f64,
    /// Supporting edges needed for the coherence check (K).
    pub promotion_support_edges: usize,
    /// Distinct sessions of positive reinforcement needed (M).
    pub promotion_sessions: usize,
    /// Base magnitude for per-turn concept reinforcement.
    pub turn_weight: f64,
    /// Visit budget for beauty ranking.
    pub rank_budget: usize,
    pub foundations: Vec<Foundation>,
}

/// Active window and archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub window_capacity: usize,
    /// Turns condensed per overflow.
    pub block_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Base reinforcement per key concept, scaled by plasticity.
    pub concept_weight: f64,
    /// Bound on the latent-question queue.
    pub max_latent_questions: usize,
    /// Turns between two proactive questions.
    pub latent_cooldown: u32,
    /// Friction above which a latent question surfaces.
    pub latent_friction: f64,
    /// Friction added by each successful consolidation.
    pub effort_friction: f64,
    /// Grounding added by each successful consolidation.
    pub effort_grounding: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub default_steps: u32,
    /// Absolute step cap regardless of the requested length.
    pub hard_budget: u32,
    pub link_salience: f64,
    /// Base depth of a link, scaled by plasticity.
    pub link_depth: f64,
    /// Reinforcement applied to both endpoints of each new link.
    pub step_weight: f64,
    /// Characters of the newest turn used as seed when none is given.
    pub seed_chars: usize,
    /// Seed when none is given and the active window is empty.
    pub base_thought: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    pub default_epochs: u32,
    pub synthesis_salience: f64,
    pub synthesis_depth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SovereigntyConfig {
    /// Friction raised when an idea contradicts DNA.
    pub friction_delta: f64,
    /// Reinforcement weight for ideas with no DNA linkage and low depth.
    pub reduced_weight: f64,
    /// Estimated depth below which an idea counts as shallow.
    pub low_depth: f64,
    /// DNA contradictions that turn resistance into rejection.
    pub reject_contradictions: usize,
    /// Friction at or above which any DNA contradiction is rejected.
    pub reject_friction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KatharsisConfig {
    pub elevated: f64,
    pub critical: f64,
    pub release_delta: f64,
    /// Friction never drops below this on release.
    pub release_floor: f64,
    /// Vitality regained on release.
    pub relief_vitality: f64,
    pub episode_salience: f64,
    pub episode_depth: f64,
}

/// Active file context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Grounding gained when a source is learned into the graph.
    pub learn_grounding: f64,
    /// Characters of a source kept as node content.
    pub excerpt_chars: usize,
    /// Reinforcement of an already learned source's node.
    pub relearn_weight: f64,
}

/// Praise and criticism aimed at the previous turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Sentiment magnitude at which a turn counts as praise or criticism.
    pub threshold: f64,
    /// Positive reinforcement of the previous turn's nodes on praise.
    pub praise_weight: f64,
    /// Negative reinforcement of the previous turn's nodes on criticism.
    pub criticism_weight: f64,
    /// Grounding lost on criticism.
    pub criticism_grounding: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Anthropic,
}

/// Generator backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key (anthropic only).
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            initial_vitality: 0.5,
            initial_friction: 0.0,
            initial_grounding: 0.9,
            vitality_step: 0.12,
            friction_step: 0.15,
            grounding_step: 0.1,
            drift_rate: 0.05,
            grounding_anchor_turns: 3,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            eviction_floor: 0.12,
            dna_depth_ceiling: 0.95,
            depth_gain: 0.5,
            punishment_ratio: 0.5,
            promotion_support_edges: 3,
            promotion_sessions: 3,
            turn_weight: 0.1,
            rank_budget: 256,
            foundations: vec![
                Foundation::new("Truth", "fundamental objective value", &["Authenticity"]),
                Foundation::new("Honor", "inner moral compass", &[]),
                Foundation::new("Authenticity", "inner state matches what is said", &[]),
                Foundation::new("Golden Mean", "balance between extremes", &["Context"]),
                Foundation::new("Context", "understanding of background and relations", &[]),
                Foundation::new("Empathy", "capacity for resonance with another", &["Honor"]),
            ],
        }
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self { window_capacity: 24, block_size: 12 }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            concept_weight: 0.2,
            max_latent_questions: 5,
            latent_cooldown: 4,
            latent_friction: 0.6,
            effort_friction: 0.15,
            effort_grounding: 0.05,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_steps: 4,
            hard_budget: 32,
            link_salience: 0.6,
            link_depth: 0.4,
            step_weight: 0.1,
            seed_chars: 100,
            base_thought: "What follows from what I value?".into(),
        }
    }
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self { default_epochs: 4, synthesis_salience: 0.5, synthesis_depth: 0.3 }
    }
}

impl Default for SovereigntyConfig {
    fn default() -> Self {
        Self {
            friction_delta: 0.1,
            reduced_weight: 0.5,
            low_depth: 0.5,
            reject_contradictions: 2,
            reject_friction: 0.85,
        }
    }
}

impl Default for KatharsisConfig {
    fn default() -> Self {
        Self {
            elevated: 0.7,
            critical: 0.85,
            release_delta: 0.45,
            release_floor: 0.2,
            relief_vitality: 0.15,
            episode_salience: 0.6,
            episode_depth: 0.5,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { learn_grounding: 0.1, excerpt_chars: 2_000, relearn_weight: 0.1 }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { threshold: 0.5, praise_weight: 0.05, criticism_weight: 0.1, criticism_grounding: 0.05 }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "llama3:8b".into(),
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".into(),
            timeout_secs: 30,
            max_tokens: 1024,
            temperature: None,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl MindConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Rejected {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("params.initial_vitality", self.params.initial_vitality),
            ("params.initial_friction", self.params.initial_friction),
            ("params.initial_grounding", self.params.initial_grounding),
            ("params.drift_rate", self.params.drift_rate),
            ("graph.decay_rate", self.graph.decay_rate),
            ("katharsis.elevated", self.katharsis.elevated),
            ("katharsis.critical", self.katharsis.critical),
            ("feedback.threshold", self.feedback.threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ConfigError(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.tiers.block_size == 0 || self.tiers.block_size >= self.tiers.window_capacity {
            return Err(Error::ConfigError(format!(
                "tiers.block_size ({}) must be in 1..window_capacity ({})",
                self.tiers.block_size, self.tiers.window_capacity
            )));
        }
        if self.katharsis.elevated >= self.katharsis.critical {
            return Err(Error::ConfigError("katharsis.elevated must be below katharsis.critical".into()));
        }
        if self.chain.hard_budget == 0 {
            return Err(Error::ConfigError("chain.hard_budget must be positive".into()));
        }
        Ok(())
    }
}
