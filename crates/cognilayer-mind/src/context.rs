//! Active file context: ingested sources held for lookup.

use crate::config::ContextConfig;
use crate::graph::{MemoryGraph, NodeSeed, Polarity};
use crate::params::ParameterState;
use cognilayer_core::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileContext {
    sources: BTreeMap<String, String>,
}

impl FileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `text` under `source_id`, replacing any earlier version.
    pub fn attach(&mut self, source_id: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(source_id.into(), text.into());
    }

    pub fn lookup(&self, source_id: &str) -> Option<&str> {
        self.sources.get(source_id).map(String::as_str)
    }

    pub fn detach(&mut self, source_id: &str) -> Option<String> {
        self.sources.remove(source_id)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Reinforce an attached source into memory as a consolidated node.
    /// Learning it again strengthens the existing node.
    /// Returns `None` if nothing is attached under `source_id`.
    pub fn learn(
        &self,
        source_id: &str,
        config: &ContextConfig,
        graph: &mut MemoryGraph,
        params: &mut ParameterState,
    ) -> Option<NodeId> {
        let text = self.lookup(source_id)?;
        let excerpt: String = text.chars().take(config.excerpt_chars).collect();
        let id = match graph.find_by_label(source_id) {
            Some(id) => {
                graph.reinforce(id, config.relearn_weight, Polarity::Positive, params.plasticity()).ok()?;
                id
            }
            None => graph.insert(NodeSeed::consolidated(source_id, excerpt)),
        };
        params.adjust_grounding(config.learn_grounding);
        Some(id)
    }

    /// Attached text as generator background, each source under a header.
    pub fn background(&self, budget_chars: usize) -> String {
        let mut out = String::new();
        for (id, text) in &self.sources {
            if out.len() >= budget_chars {
                break;
            }
            let room = budget_chars - out.len();
            out.push_str(&format!("[{}]\n", id));
            out.extend(text.chars().take(room));
            out.push('\n');
        }
        out
    }
}
