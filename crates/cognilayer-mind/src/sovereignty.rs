//! The sovereign gate: weighing a candidate idea against DNA.
//!
//! Evaluation is a pure function of the graph snapshot and the parameters.

use crate::config::SovereigntyConfig;
use crate::graph::{EdgeKind, MemoryGraph, Tier};
use crate::params::ParameterState;
use cognilayer_core::{NodeId, Result};

const NEGATIONS: &[&str] = &["not ", "no ", "never ", "against ", "anti-", "without "];

/// An idea on its way into memory, with the links it would make.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateIdea {
    pub text: String,
    pub links: Vec<(NodeId, EdgeKind)>,
}

impl CandidateIdea {
    pub fn new(text: impl Into<String>, links: Vec<(NodeId, EdgeKind)>) -> Self {
        Self { text: text.into(), links }
    }

    /// Link `text` to every node whose label it mentions. A mention right
    /// after a negation ("not truth", "against honor") contradicts the node;
    /// any other mention supports it.
    pub fn probe(text: &str, graph: &MemoryGraph) -> Self {
        let haystack = text.to_lowercase();
        let mut links = Vec::new();
        for node in graph.nodes() {
            let needle = node.label().to_lowercase();
            if needle.trim().is_empty() {
                continue;
            }
            let mut kind = None;
            for (at, _) in haystack.match_indices(&needle) {
                if !is_word_at(&haystack, at, needle.len()) {
                    continue;
                }
                if is_negated(&haystack[..at]) {
                    kind = Some(EdgeKind::Contradicts);
                    break;
                }
                kind = Some(EdgeKind::Supports);
            }
            if let Some(kind) = kind {
                links.push((node.id(), kind));
            }
        }
        Self { text: text.to_string(), links }
    }

    /// Deepest linked node, or zero with no links.
    pub fn estimated_depth(&self, graph: &MemoryGraph) -> Result<f64> {
        self.links
            .iter()
            .map(|(id, _)| graph.get(*id).map(|n| n.depth()))
            .try_fold(0.0_f64, |acc, d| d.map(|d| acc.max(d)))
    }
}

/// `before` ends in a whole negation word ("no ", not "casino ").
fn is_negated(before: &str) -> bool {
    NEGATIONS.iter().any(|n| {
        before
            .strip_suffix(n)
            .is_some_and(|rest| !rest.chars().next_back().is_some_and(char::is_alphanumeric))
    })
}

fn is_word_at(text: &str, at: usize, len: usize) -> bool {
    let before = text[..at].chars().next_back();
    let after = text[at + len..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Take the idea in; `weight` scales its reinforcement.
    Accept { weight: f64 },
    /// Take it in under protest: friction rises by the delta.
    ResistWithFriction(f64),
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct SovereigntyGate {
    config: SovereigntyConfig,
}

impl SovereigntyGate {
    pub fn new(config: SovereigntyConfig) -> Self {
        Self { config }
    }

    /// Decide on `candidate`. Fails only if it links an unknown node.
    pub fn evaluate(&self, candidate: &CandidateIdea, graph: &MemoryGraph, params: &ParameterState) -> Result<GateDecision> {
        let mut contradictions = 0;
        let mut reinforces_dna = false;
        for (id, kind) in &candidate.links {
            if graph.get(*id)?.tier() != Tier::Dna {
                continue;
            }
            match kind {
                EdgeKind::Contradicts => contradictions += 1,
                EdgeKind::Supports | EdgeKind::Causes => reinforces_dna = true,
            }
        }

        if contradictions > 0 {
            let overwhelmed = contradictions >= self.config.reject_contradictions
                || params.friction() >= self.config.reject_friction;
            return Ok(if overwhelmed {
                GateDecision::Reject
            } else {
                GateDecision::ResistWithFriction(self.config.friction_delta)
            });
        }
        if reinforces_dna {
            return Ok(GateDecision::Accept { weight: 1.0 });
        }
        let depth = candidate.estimated_depth(graph)?;
        Ok(if depth < self.config.low_depth {
            GateDecision::Accept { weight: self.config.reduced_weight }
        } else {
            GateDecision::Accept { weight: 1.0 }
        })
    }
}
