//! Active window and synthetic archive.

use crate::config::TierConfig;
use crate::consolidation::ConsolidationEngine;
use crate::graph::MemoryGraph;
use crate::params::ParameterState;
use chrono::{DateTime, Utc};
use cognilayer_core::{Error, PendingTurn, Turn, TurnId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Condensed summary of a block of turns. Never modified once archived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensePill {
    pub summary: String,
    pub derived_from: Vec<TurnId>,
    pub latent_questions: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What happened to the window while appending a turn.
#[derive(Debug)]
pub enum Condensation {
    /// No overflow.
    None,
    /// The oldest `block` turns became archive entry `pill`.
    Condensed { block: usize, pill: usize },
    /// Consolidation failed; the block stays and is retried on the next overflow.
    Deferred(Error),
}

impl Condensation {
    pub fn is_condensed(&self) -> bool {
        matches!(self, Self::Condensed { .. })
    }
}

#[derive(Debug)]
pub struct AppendOutcome {
    pub turn: TurnId,
    pub condensation: Condensation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierManager {
    window: VecDeque<Turn>,
    archive: Vec<SensePill>,
    next_turn_id: u64,
    #[serde(default)]
    retry_pending: bool,
    #[serde(skip)]
    config: TierConfig,
}

impl Default for TierManager {
    fn default() -> Self {
        Self::new(TierConfig::default())
    }
}

impl TierManager {
    pub fn new(config: TierConfig) -> Self {
        Self { window: VecDeque::new(), archive: Vec::new(), next_turn_id: 1, retry_pending: false, config }
    }

    /// Rebuild from the two persisted records.
    pub fn restore(config: TierConfig, window: Vec<Turn>, archive: Vec<SensePill>, next_turn_id: u64) -> Self {
        let next = window.iter().map(|t| t.id.raw() + 1).max().unwrap_or(1).max(next_turn_id);
        let retry_pending = window.len() > config.window_capacity;
        Self { window: window.into(), archive, next_turn_id: next, retry_pending, config }
    }

    pub fn window(&self) -> impl Iterator<Item = &Turn> {
        self.window.iter()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window_turns(&self) -> Vec<Turn> {
        self.window.iter().cloned().collect()
    }

    pub fn archive_len(&self) -> usize {
        self.archive.len()
    }

    /// Archived pills in creation order. Each call starts from the oldest.
    pub fn synthetic_archive(&self) -> impl Iterator<Item = &SensePill> {
        self.archive.iter()
    }

    pub fn next_turn_id(&self) -> u64 {
        self.next_turn_id
    }

    /// A previous consolidation failed and its block is still in the window.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Turns to condense before the next append, if the window is full.
    /// A block left behind by a failed attempt grows by the overflow.
    pub fn overflow_block(&self) -> Option<usize> {
        let len = self.window.len();
        let cap = self.config.window_capacity;
        (len >= cap).then(|| (self.config.block_size + (len - cap)).min(len))
    }

    /// Append a turn. If the window is full, the oldest block is condensed
    /// first; it leaves the window only when its pill is archived.
    pub async fn append_turn(
        &mut self,
        turn: PendingTurn,
        engine: &ConsolidationEngine,
        graph: &mut MemoryGraph,
        params: &mut ParameterState,
    ) -> AppendOutcome {
        let condensation = match self.overflow_block() {
            None => Condensation::None,
            Some(block) => {
                let turns: Vec<Turn> = self.window.iter().take(block).cloned().collect();
                match engine.consolidate(&turns, graph, params).await {
                    Ok(pill) => {
                        self.window.drain(..block);
                        self.archive.push(pill);
                        if self.retry_pending {
                            info!(block, "deferred block condensed on retry");
                        }
                        self.retry_pending = false;
                        Condensation::Condensed { block, pill: self.archive.len() - 1 }
                    }
                    Err(e) => {
                        warn!(block, error = %e, "consolidation failed; block kept for retry");
                        self.retry_pending = true;
                        Condensation::Deferred(e)
                    }
                }
            }
        };

        let id = TurnId::new(self.next_turn_id);
        self.next_turn_id += 1;
        self.window.push_back(Turn::new(id, turn.role, turn.text));
        AppendOutcome { turn: id, condensation }
    }
}
