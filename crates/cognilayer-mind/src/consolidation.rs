//! Condensing blocks of turns into sense pills.
//!
//! One generator call per block. The reply is read line by line:
//!
//! ```text
//! SUMMARY: <one paragraph>
//! QUESTION: <latent question>          (zero or more)
//! CONCEPTS: <label>, <label>, ...
//! <label> -> causes|supports|contradicts -> <label>   (zero or more)
//! ```
//!
//! A reply with no `SUMMARY:` line is taken as the summary itself.

use crate::config::ConsolidationConfig;
use crate::graph::{EdgeKind, MemoryGraph, Polarity};
use crate::params::ParameterState;
use crate::tiers::SensePill;
use chrono::Utc;
use cognilayer_core::{Error, NodeId, Result, Turn};
use cognilayer_llm::Generator;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONDENSE_CONTEXT: &str = "You condense conversation into durable memory. \
Answer only in the requested line format.";

/// Parsed generator reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Digest {
    pub summary: String,
    pub questions: Vec<String>,
    pub concepts: Vec<String>,
    pub links: Vec<(String, EdgeKind, String)>,
}

pub fn parse_digest(text: &str) -> Digest {
    let mut digest = Digest::default();
    let mut loose = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = strip_tag(line, "SUMMARY:") {
            digest.summary = rest.to_string();
        } else if let Some(rest) = strip_tag(line, "QUESTION:") {
            let q = rest.trim_matches('"').trim();
            if !q.is_empty() {
                digest.questions.push(q.to_string());
            }
        } else if let Some(rest) = strip_tag(line, "CONCEPTS:") {
            digest.concepts.extend(
                rest.split(',')
                    .map(|c| c.trim().trim_matches('"').to_string())
                    .filter(|c| !c.is_empty()),
            );
        } else if let Some(link) = parse_link(line) {
            digest.links.push(link);
        } else {
            loose.push(line);
        }
    }

    if digest.summary.is_empty() {
        digest.summary = loose.join(" ");
    }
    digest
}

/// `A -> kind -> B`
fn parse_link(line: &str) -> Option<(String, EdgeKind, String)> {
    let parts: Vec<&str> = line.trim_start_matches(['-', '*', ' ']).split("->").map(str::trim).collect();
    match parts.as_slice() {
        [from, kind, to] if !from.is_empty() && !to.is_empty() => {
            Some((from.to_string(), EdgeKind::parse(kind)?, to.to_string()))
        }
        _ => None,
    }
}

fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let head = line.get(..tag.len())?;
    head.eq_ignore_ascii_case(tag).then(|| line[tag.len()..].trim())
}

fn transcript(turns: &[Turn]) -> String {
    turns.iter().map(Turn::transcript_line).collect::<Vec<_>>().join("\n")
}

/// Output of a reflection over the window (`think`).
#[derive(Debug, Clone, Default)]
pub struct Reflection {
    pub summary: String,
    pub latent_questions: Vec<String>,
    pub concepts: Vec<NodeId>,
    pub links_added: usize,
}

pub struct ConsolidationEngine {
    generator: Arc<dyn Generator>,
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new(generator: Arc<dyn Generator>, config: ConsolidationConfig) -> Self {
        Self { generator, config }
    }

    async fn digest(&self, prompt: String) -> Result<Digest> {
        let reply = self
            .generator
            .generate(&prompt, CONDENSE_CONTEXT)
            .await
            .map_err(|e| Error::summarization(e.to_string()))?;
        let digest = parse_digest(&reply);
        if digest.summary.trim().is_empty() {
            return Err(Error::summarization("empty summary"));
        }
        Ok(digest)
    }

    /// Condense `turns` into a pill. Key concepts are reinforced with
    /// `concept_weight * plasticity`; extracted links become edges. On
    /// success the effort shows up as friction and grounding.
    pub async fn consolidate(
        &self,
        turns: &[Turn],
        graph: &mut MemoryGraph,
        params: &mut ParameterState,
    ) -> Result<SensePill> {
        let prompt = format!(
            "Condense this block of conversation.\n\
             Reply with:\n\
             SUMMARY: <the essence in two or three sentences>\n\
             QUESTION: <something left unsaid you would like to ask later> (up to {} lines)\n\
             CONCEPTS: <comma separated key concepts>\n\
             <concept> -> causes|supports|contradicts -> <concept> (optional lines)\n\n{}",
            self.config.max_latent_questions,
            transcript(turns),
        );
        let digest = self.digest(prompt).await?;

        let (concept_ids, links) = self.imprint(&digest, graph, params)?;
        params.adjust_friction(self.config.effort_friction);
        params.adjust_grounding(self.config.effort_grounding);

        let mut questions = digest.questions;
        questions.truncate(self.config.max_latent_questions);

        info!(
            turns = turns.len(),
            concepts = concept_ids.len(),
            links,
            questions = questions.len(),
            "block condensed"
        );

        Ok(SensePill {
            summary: digest.summary,
            derived_from: turns.iter().map(|t| t.id).collect(),
            latent_questions: questions,
            key_concepts: digest.concepts,
            created_at: Utc::now(),
        })
    }

    /// Reflect over `turns` without condensing them: same imprinting of
    /// concepts and links, no pill and no effort cost.
    pub async fn reflect(
        &self,
        turns: &[Turn],
        graph: &mut MemoryGraph,
        params: &ParameterState,
    ) -> Result<Reflection> {
        let prompt = format!(
            "Reflect on the conversation so far.\n\
             Reply with:\n\
             SUMMARY: <what is really going on>\n\
             QUESTION: <a question you want to ask the user> (up to {} lines)\n\
             CONCEPTS: <comma separated key concepts>\n\
             <concept> -> causes|supports|contradicts -> <concept> (optional lines)\n\n{}",
            self.config.max_latent_questions,
            transcript(turns),
        );
        let digest = self.digest(prompt).await?;
        let (concepts, links_added) = self.imprint(&digest, graph, params)?;
        let mut latent_questions = digest.questions;
        latent_questions.truncate(self.config.max_latent_questions);
        debug!(concepts = concepts.len(), links_added, "reflection imprinted");
        Ok(Reflection { summary: digest.summary, latent_questions, concepts, links_added })
    }

    fn imprint(
        &self,
        digest: &Digest,
        graph: &mut MemoryGraph,
        params: &ParameterState,
    ) -> Result<(Vec<NodeId>, usize)> {
        let plasticity = params.plasticity();
        let mut ids = Vec::with_capacity(digest.concepts.len());
        for label in &digest.concepts {
            let id = graph.ensure_concept(label, &digest.summary);
            graph.reinforce(id, self.config.concept_weight, Polarity::Positive, plasticity)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut links = 0;
        for (from, kind, to) in &digest.links {
            let a = graph.ensure_concept(from, "");
            let b = graph.ensure_concept(to, "");
            if a == b {
                warn!(label = %from, "ignoring self link from summarizer");
                continue;
            }
            if graph.add_causal_edge(a, b, *kind)? {
                links += 1;
            }
        }
        Ok((ids, links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_reply() {
        let d = parse_digest(
            "SUMMARY: We talked about tides.\n\
             QUESTION: \"Do you sail?\"\n\
             QUESTION: What scares you about the sea?\n\
             CONCEPTS: Moon, Tides, sea\n\
             Moon -> causes -> Tides\n\
             - Fear -> contradicts -> Curiosity\n",
        );
        assert_eq!(d.summary, "We talked about tides.");
        assert_eq!(d.questions, vec!["Do you sail?", "What scares you about the sea?"]);
        assert_eq!(d.concepts, vec!["Moon", "Tides", "sea"]);
        assert_eq!(
            d.links,
            vec![
                ("Moon".to_string(), EdgeKind::Causes, "Tides".to_string()),
                ("Fear".to_string(), EdgeKind::Contradicts, "Curiosity".to_string()),
            ]
        );
    }

    #[test]
    fn untagged_reply_becomes_summary() {
        let d = parse_digest("The user is tired.\nThey want rest.");
        assert_eq!(d.summary, "The user is tired. They want rest.");
        assert!(d.concepts.is_empty());
    }

    #[test]
    fn unknown_relation_is_not_a_link() {
        let d = parse_digest("SUMMARY: x\nA -> admires -> B");
        assert!(d.links.is_empty());
    }
}
