//! Katharsis: forced release when friction runs too high.

use crate::config::KatharsisConfig;
use crate::graph::{MemoryGraph, NodeSeed};
use crate::params::ParameterState;
use cognilayer_core::NodeId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KatharsisState {
    #[default]
    Normal,
    Elevated,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    Released {
        episode: NodeId,
        friction_before: f64,
        friction_after: f64,
        /// The response layer drops its discretion filter for this turn.
        suppress_discretion: bool,
    },
    NotNeeded,
}

impl Release {
    pub fn fired(&self) -> bool {
        matches!(self, Self::Released { .. })
    }

    pub fn suppress_discretion(&self) -> bool {
        matches!(self, Self::Released { suppress_discretion: true, .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KatharsisMonitor {
    state: KatharsisState,
    #[serde(default)]
    releases: u64,
    #[serde(skip)]
    config: KatharsisConfig,
}

impl KatharsisMonitor {
    pub fn new(config: KatharsisConfig) -> Self {
        Self { state: KatharsisState::Normal, releases: 0, config }
    }

    pub fn with_config(mut self, config: KatharsisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> KatharsisState {
        self.state
    }

    /// Total releases over the agent's lifetime.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Track friction. Critical holds until a release.
    pub fn observe(&mut self, params: &ParameterState) -> KatharsisState {
        if self.state == KatharsisState::Critical {
            return self.state;
        }
        let fc = params.friction();
        let next = if fc > self.config.critical {
            KatharsisState::Critical
        } else if fc > self.config.elevated {
            KatharsisState::Elevated
        } else {
            KatharsisState::Normal
        };
        if next != self.state {
            debug!(from = ?self.state, to = ?next, friction = fc, "katharsis transition");
        }
        self.state = next;
        next
    }

    /// Observe, and release if that reached Critical.
    pub fn check(&mut self, params: &mut ParameterState, graph: &mut MemoryGraph) -> Release {
        self.observe(params);
        self.release(params, graph)
    }

    /// Fire the release. Outside Critical this does nothing.
    pub fn release(&mut self, params: &mut ParameterState, graph: &mut MemoryGraph) -> Release {
        if self.state != KatharsisState::Critical {
            return Release::NotNeeded;
        }
        let before = params.friction();
        params.set_friction((before - self.config.release_delta).max(self.config.release_floor));
        params.adjust_vitality(self.config.relief_vitality);
        let after = params.friction();

        let episode = graph.insert(
            NodeSeed::consolidated(
                "Katharsis",
                format!("Friction broke through at {:.2} and was released to {:.2}.", before, after),
            )
            .with_salience(self.config.episode_salience)
            .with_depth(self.config.episode_depth),
        );
        self.state = KatharsisState::Normal;
        self.releases += 1;
        info!(friction_before = before, friction_after = after, episode = %episode, "katharsis released");

        Release::Released { episode, friction_before: before, friction_after: after, suppress_discretion: true }
    }
}
