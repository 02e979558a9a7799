//! Cross-referencing archive eras.
//!
//! Consecutive sense pills are paired newest first and the generator is
//! asked what connects them. Each answer becomes a consolidated synthesis
//! node, supported by the concept nodes either era names.

use crate::config::EvolveConfig;
use crate::graph::{derive_label, EdgeKind, MemoryGraph, NodeSeed};
use crate::tiers::SensePill;
use cognilayer_core::{Error, NodeId, Result};
use cognilayer_llm::Generator;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct EvolveOutcome {
    pub syntheses: Vec<NodeId>,
    /// Pills available when the run started.
    pub eras: usize,
    /// Set when a call failed; the run stops there.
    pub failure: Option<Error>,
}

impl EvolveOutcome {
    pub fn had_enough_eras(&self) -> bool {
        self.eras >= 2
    }
}

/// Run up to `epochs` pairings over `archive` (creation order).
pub async fn evolve(
    generator: &dyn Generator,
    config: &EvolveConfig,
    archive: &[SensePill],
    epochs: u32,
    graph: &mut MemoryGraph,
) -> Result<EvolveOutcome> {
    let mut outcome = EvolveOutcome { eras: archive.len(), ..Default::default() };
    if archive.len() < 2 {
        info!(eras = archive.len(), "evolve needs at least two eras");
        return Ok(outcome);
    }

    let newest_first: Vec<&SensePill> = archive.iter().rev().collect();
    for (epoch, pair) in newest_first.windows(2).take(epochs as usize).enumerate() {
        let (later, earlier) = (pair[0], pair[1]);
        let prompt = format!(
            "Two eras of memory.\nEarlier: {}\nLater: {}\n\
             What hidden connection or development links them? Answer in one or two sentences.",
            earlier.summary, later.summary
        );
        let text = match generator.generate(&prompt, "").await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(epoch, error = %e, "evolve stopped");
                outcome.failure = Some(Error::deduction(e.to_string()));
                break;
            }
        };

        let id = graph.insert(
            NodeSeed::consolidated(derive_label(&text), text)
                .with_salience(config.synthesis_salience)
                .with_depth(config.synthesis_depth),
        );
        for label in earlier.key_concepts.iter().chain(&later.key_concepts) {
            if let Some(concept) = graph.find_by_label(label) {
                if concept != id {
                    graph.add_causal_edge(concept, id, EdgeKind::Supports)?;
                }
            }
        }
        outcome.syntheses.push(id);
    }

    info!(syntheses = outcome.syntheses.len(), "evolve finished");
    Ok(outcome)
}
