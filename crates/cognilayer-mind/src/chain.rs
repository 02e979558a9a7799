//! Causal chain reasoning: N sequential cause and effect deductions.
//!
//! Each step is one generator call conditioned on the previous conclusion.
//! The result becomes an ephemeral node linked from its predecessor by a
//! `causes` edge, so every link can be inspected, decayed or revoked on its
//! own. A failed call ends the run `Aborted` with the links made so far.
//!
//! Cancellation is cooperative: the token is checked before each call and
//! again when the call returns. A call in flight is never interrupted, but
//! its result is dropped if cancellation arrived meanwhile.

use crate::config::ChainConfig;
use crate::graph::{derive_label, EdgeKind, MemoryGraph, MemoryNode, NodeSeed, Polarity};
use crate::params::ParameterState;
use cognilayer_core::{Error, NodeId, Result};
use cognilayer_llm::{CancellationToken, Generator};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSeed {
    Node(NodeId),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Stepping(u32),
    Done,
    Aborted,
}

impl ChainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

#[derive(Debug)]
pub struct ChainOutcome {
    pub state: ChainState,
    /// New nodes in step order.
    pub links: Vec<MemoryNode>,
    /// Why the run aborted, if it did because of a failed deduction.
    pub failure: Option<Error>,
    pub cancelled: bool,
}

pub struct CausalChainEngine {
    generator: Arc<dyn Generator>,
    config: ChainConfig,
    state: ChainState,
}

impl CausalChainEngine {
    pub fn new(generator: Arc<dyn Generator>, config: ChainConfig) -> Self {
        Self { generator, config, state: ChainState::Idle }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Run up to `steps` deductions, capped by the hard budget.
    ///
    /// Fails only if the seed node does not exist. `background` is passed to
    /// every call as context.
    pub async fn run_chain(
        &mut self,
        seed: ChainSeed,
        steps: u32,
        graph: &mut MemoryGraph,
        params: &ParameterState,
        background: &str,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome> {
        let (mut previous, mut conclusion) = match seed {
            ChainSeed::Node(id) => {
                let node = graph.get(id)?;
                let text = if node.content().trim().is_empty() { node.label() } else { node.content() };
                (Some(id), text.to_string())
            }
            ChainSeed::Text(text) => (None, text),
        };

        self.state = ChainState::Idle;
        let limit = steps.min(self.config.hard_budget);
        let plasticity = params.plasticity();
        let mut created: Vec<NodeId> = Vec::new();
        let mut failure = None;
        let mut cancelled = false;

        for k in 1..=limit {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.state = ChainState::Stepping(k);

            let prompt = format!(
                "Previous conclusion: {}\n\
                 Deduce the single most direct consequence of it. \
                 Answer with one sentence that begins with \"Because\" or \"Consequently\".",
                conclusion
            );
            let result = self.generator.generate(&prompt, background).await;

            if cancel.is_cancelled() {
                debug!(step = k, "result discarded after cancellation");
                cancelled = true;
                break;
            }

            let text = match result {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(step = k, error = %e, "deduction failed; chain aborted");
                    failure = Some(Error::deduction(e.to_string()));
                    break;
                }
            };

            let id = graph.insert(
                NodeSeed::ephemeral(derive_label(&text), text.clone())
                    .with_salience(self.config.link_salience)
                    .with_depth(self.config.link_depth * plasticity),
            );
            if let Some(prev) = previous {
                graph.add_causal_edge(prev, id, EdgeKind::Causes)?;
                graph.reinforce(prev, self.config.step_weight, Polarity::Positive, plasticity)?;
            }
            graph.reinforce(id, self.config.step_weight, Polarity::Positive, plasticity)?;

            created.push(id);
            previous = Some(id);
            conclusion = text;
        }

        self.state = if cancelled || failure.is_some() { ChainState::Aborted } else { ChainState::Done };
        info!(state = ?self.state, links = created.len(), requested = steps, "chain finished");

        let links = created
            .iter()
            .map(|id| graph.get(*id).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(ChainOutcome { state: self.state, links, failure, cancelled })
    }
}
