//! One agent's cognitive state and the per-turn pipeline.
//!
//! An [`AgentSession`] owns its parameters, graph, tiers and monitors. There
//! is no shared state between sessions; callers that need concurrent access
//! wrap a session in a mutex (see [`crate::registry`]).

use crate::chain::{CausalChainEngine, ChainOutcome, ChainSeed};
use crate::config::MindConfig;
use crate::consolidation::{ConsolidationEngine, Reflection};
use crate::context::FileContext;
use crate::evolve::{evolve, EvolveOutcome};
use crate::graph::{EdgeKind, GraphSummary, MemoryGraph, Polarity, Tier};
use crate::katharsis::{KatharsisMonitor, KatharsisState, Release};
use crate::latent::LatentQueue;
use crate::params::{Disposition, ParameterState, Signal};
use crate::persist::{ActiveRecord, ArchiveRecord, RECORD_VERSION};
use crate::sovereignty::{CandidateIdea, GateDecision, SovereigntyGate};
use crate::tiers::{Condensation, SensePill, TierManager};
use cognilayer_core::{NodeId, PendingTurn, Result, Role, SessionKey};
use cognilayer_llm::{CancellationToken, Generator};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Background text handed to chain deductions.
const BACKGROUND_CHARS: usize = 4_000;

/// One exchange entering the pipeline.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user: String,
    pub reply: Option<String>,
    pub signal: Signal,
}

impl TurnInput {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), reply: None, signal: Signal::neutral() }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }
}

/// How a turn's sentiment judged the turn before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Feedback {
    Praise,
    Criticism,
}

#[derive(Debug)]
pub struct TurnReport {
    /// Praise or criticism applied to the previous turn's nodes.
    pub feedback: Option<Feedback>,
    pub decision: GateDecision,
    pub release: Release,
    pub reinforced: Vec<NodeId>,
    pub evicted: Vec<NodeId>,
    pub condensations: Vec<Condensation>,
    /// The grounding anchor snapped the parameters back this turn.
    pub anchored: bool,
    pub proactive_question: Option<String>,
}

impl TurnReport {
    pub fn suppress_discretion(&self) -> bool {
        self.release.suppress_discretion()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session: String,
    pub vitality: f64,
    pub friction: f64,
    pub grounding: f64,
    pub plasticity: f64,
    pub disposition: Disposition,
    pub katharsis: KatharsisState,
    pub releases: u64,
    pub graph: GraphSummary,
    pub window: usize,
    pub archive: usize,
    pub retry_pending: bool,
    pub latent_questions: usize,
    pub attached_sources: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedNode {
    pub id: NodeId,
    pub label: String,
    pub beauty: f64,
    pub depth: f64,
    pub salience: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    pub dna: Vec<RankedNode>,
    pub consolidated: Vec<RankedNode>,
}

pub struct AgentSession {
    key: SessionKey,
    config: MindConfig,
    params: ParameterState,
    graph: MemoryGraph,
    tiers: TierManager,
    katharsis: KatharsisMonitor,
    latent: LatentQueue,
    files: FileContext,
    /// Nodes the last turn reinforced.
    recent: Vec<NodeId>,
    gate: SovereigntyGate,
    consolidation: ConsolidationEngine,
    chain: CausalChainEngine,
    generator: Arc<dyn Generator>,
}

impl AgentSession {
    /// Fresh agent with the configured foundations planted.
    pub fn new(key: SessionKey, config: MindConfig, generator: Arc<dyn Generator>) -> Self {
        Self::from_records(key, config, generator, None, None)
    }

    /// Rebuild from persisted records. A missing archive starts a fresh
    /// graph; a missing active record starts an empty window. Either way a
    /// new reinforcement session begins.
    pub fn from_records(
        key: SessionKey,
        config: MindConfig,
        generator: Arc<dyn Generator>,
        active: Option<ActiveRecord>,
        archive: Option<ArchiveRecord>,
    ) -> Self {
        let (turns, next_turn_id, files, recent) = match active {
            Some(a) => (a.turns, a.next_turn_id, a.files, a.recent_nodes),
            None => (Vec::new(), 1, FileContext::default(), Vec::new()),
        };
        let (pills, mut graph, params, katharsis, latent) = match archive {
            Some(a) => (
                a.pills,
                a.graph.with_config(config.graph.clone()),
                a.params.with_config(config.params.clone()),
                a.katharsis.with_config(config.katharsis.clone()),
                a.latent.with_config(&config.consolidation),
            ),
            None => {
                let mut graph = MemoryGraph::new(config.graph.clone());
                graph.seed_foundations(&config.graph.foundations);
                (
                    Vec::new(),
                    graph,
                    ParameterState::from_config(config.params.clone()),
                    KatharsisMonitor::new(config.katharsis.clone()),
                    LatentQueue::new(&config.consolidation),
                )
            }
        };
        let epoch = graph.begin_session();
        debug!(session = %key, epoch, "session opened");

        Self {
            tiers: TierManager::restore(config.tiers.clone(), turns, pills, next_turn_id),
            gate: SovereigntyGate::new(config.sovereignty.clone()),
            consolidation: ConsolidationEngine::new(generator.clone(), config.consolidation.clone()),
            chain: CausalChainEngine::new(generator.clone(), config.chain.clone()),
            key,
            config,
            params,
            graph,
            katharsis,
            latent,
            files,
            recent,
            generator,
        }
    }

    /// Snapshot both records for persistence.
    pub fn to_records(&self) -> (ActiveRecord, ArchiveRecord) {
        let active = ActiveRecord {
            version: RECORD_VERSION,
            turns: self.tiers.window_turns(),
            next_turn_id: self.tiers.next_turn_id(),
            files: self.files.clone(),
            recent_nodes: self.recent.clone(),
        };
        let archive = ArchiveRecord {
            version: RECORD_VERSION,
            pills: self.tiers.synthetic_archive().cloned().collect(),
            graph: self.graph.clone(),
            params: self.params.clone(),
            katharsis: self.katharsis.clone(),
            latent: self.latent.clone(),
        };
        (active, archive)
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterState {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterState {
        &mut self.params
    }

    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MemoryGraph {
        &mut self.graph
    }

    pub fn tiers(&self) -> &TierManager {
        &self.tiers
    }

    pub fn katharsis(&self) -> &KatharsisMonitor {
        &self.katharsis
    }

    pub fn latent(&self) -> &LatentQueue {
        &self.latent
    }

    pub fn files(&self) -> &FileContext {
        &self.files
    }

    pub fn archive(&self) -> impl Iterator<Item = &SensePill> {
        self.tiers.synthetic_archive()
    }

    /// Run one exchange through the pipeline: parameters, feedback on the
    /// previous turn, gate, katharsis, reinforcement, decay, window, anchor,
    /// latent intentions.
    pub async fn process_turn(&mut self, input: TurnInput) -> Result<TurnReport> {
        self.params.update(input.signal);
        self.params.drift();
        let feedback = self.apply_feedback(input.signal.sentiment)?;

        let candidate = CandidateIdea::probe(&input.user, &self.graph);
        let decision = self.gate.evaluate(&candidate, &self.graph, &self.params)?;
        if let GateDecision::ResistWithFriction(delta) = decision {
            info!(delta, "idea contradicts DNA; resisting");
            self.params.adjust_friction(delta);
        }

        let release = self.katharsis.check(&mut self.params, &mut self.graph);

        let reinforced = self.reinforce_candidate(&candidate, decision)?;
        self.recent = reinforced.clone();
        let evicted = self.graph.decay_tick();

        let mut condensations = Vec::new();
        let mut pending = vec![PendingTurn::user(input.user)];
        pending.extend(input.reply.map(PendingTurn::assistant));
        for turn in pending {
            let outcome = self
                .tiers
                .append_turn(turn, &self.consolidation, &mut self.graph, &mut self.params)
                .await;
            if let Condensation::Condensed { pill, .. } = outcome.condensation {
                if let Some(p) = self.tiers.synthetic_archive().nth(pill) {
                    for q in &p.latent_questions {
                        self.latent.push(q.clone());
                    }
                }
            }
            condensations.push(outcome.condensation);
        }

        let anchored = self.params.anchor_check();
        if anchored {
            info!("grounding anchor engaged; parameters reset to golden ratios");
        }
        let proactive_question = self.latent.next_latent_question(self.params.friction());

        Ok(TurnReport { feedback, decision, release, reinforced, evicted, condensations, anchored, proactive_question })
    }

    /// Strong sentiment is praise or criticism of the previous turn: its
    /// nodes are reinforced accordingly. Criticism also costs grounding and
    /// never touches DNA.
    fn apply_feedback(&mut self, sentiment: f64) -> Result<Option<Feedback>> {
        let cfg = &self.config.feedback;
        let sentiment = if sentiment.is_finite() { sentiment.clamp(-1.0, 1.0) } else { 0.0 };
        let (feedback, polarity, magnitude) = if sentiment >= cfg.threshold {
            (Feedback::Praise, Polarity::Positive, cfg.praise_weight)
        } else if sentiment <= -cfg.threshold {
            (Feedback::Criticism, Polarity::Negative, cfg.criticism_weight)
        } else {
            return Ok(None);
        };
        if feedback == Feedback::Criticism {
            self.params.adjust_grounding(-cfg.criticism_grounding);
        }

        let plasticity = self.params.plasticity();
        for id in std::mem::take(&mut self.recent) {
            let Ok(node) = self.graph.get(id) else {
                continue;
            };
            if polarity == Polarity::Negative && node.tier() == Tier::Dna {
                continue;
            }
            self.graph.reinforce(id, magnitude, polarity, plasticity)?;
        }
        debug!(?feedback, sentiment, "feedback applied to previous turn");
        Ok(Some(feedback))
    }

    fn reinforce_candidate(&mut self, candidate: &CandidateIdea, decision: GateDecision) -> Result<Vec<NodeId>> {
        let base = self.config.graph.turn_weight;
        let plasticity = self.params.plasticity();
        let weight = match decision {
            GateDecision::Accept { weight } => Some(weight),
            GateDecision::ResistWithFriction(_) => None,
            GateDecision::Reject => return Ok(Vec::new()),
        };

        let mut touched = Vec::new();
        for (id, kind) in &candidate.links {
            match (kind, weight) {
                (EdgeKind::Supports | EdgeKind::Causes, Some(w)) => {
                    self.graph.reinforce(*id, base * w, Polarity::Positive, plasticity)?;
                }
                (EdgeKind::Contradicts, _) if self.graph.get(*id)?.tier() != Tier::Dna => {
                    self.graph.reinforce(*id, base, Polarity::Negative, plasticity)?;
                }
                _ => continue,
            }
            touched.push(*id);
        }
        Ok(touched)
    }

    /// Reflect over the whole window without condensing it.
    pub async fn think(&mut self) -> Result<Reflection> {
        let turns = self.tiers.window_turns();
        if turns.is_empty() {
            return Ok(Reflection::default());
        }
        let reflection = self.consolidation.reflect(&turns, &mut self.graph, &self.params).await?;
        for q in &reflection.latent_questions {
            self.latent.push(q.clone());
        }
        self.graph.decay_tick();
        Ok(reflection)
    }

    /// Run a causal chain. `steps` defaults to the configured length; with
    /// no seed the chain starts from the newest reply in the window.
    pub async fn chain(
        &mut self,
        seed: Option<ChainSeed>,
        steps: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome> {
        let seed = seed.unwrap_or_else(|| self.default_seed());
        let steps = steps.unwrap_or(self.config.chain.default_steps);
        let background = self.background();
        self.chain
            .run_chain(seed, steps, &mut self.graph, &self.params, &background, cancel)
            .await
    }

    /// The newest agent reply (or, failing that, the newest turn) cut to
    /// `seed_chars`, else the configured base thought.
    pub fn default_seed(&self) -> ChainSeed {
        let newest = |role: Option<Role>| {
            self.tiers
                .window()
                .filter(|t| role.map_or(true, |r| t.role == r) && !t.text.trim().is_empty())
                .last()
        };
        let text = match newest(Some(Role::Assistant)).or_else(|| newest(None)) {
            Some(turn) => turn.text.trim().chars().take(self.config.chain.seed_chars).collect(),
            None => self.config.chain.base_thought.clone(),
        };
        ChainSeed::Text(text)
    }

    /// Cross-reference archive eras. `epochs` defaults to the configured count.
    pub async fn evolve(&mut self, epochs: Option<u32>) -> Result<EvolveOutcome> {
        let epochs = epochs.unwrap_or(self.config.evolve.default_epochs);
        let pills: Vec<SensePill> = self.tiers.synthetic_archive().cloned().collect();
        evolve(self.generator.as_ref(), &self.config.evolve, &pills, epochs, &mut self.graph).await
    }

    /// Hold a source in the file context, optionally learning it into memory.
    pub fn attach(&mut self, source_id: &str, text: impl Into<String>, learn: bool) -> Option<NodeId> {
        self.files.attach(source_id, text);
        if !learn {
            return None;
        }
        self.files.learn(source_id, &self.config.context, &mut self.graph, &mut self.params)
    }

    pub fn detach(&mut self, source_id: &str) -> Option<String> {
        self.files.detach(source_id)
    }

    pub fn next_latent_question(&mut self) -> Option<String> {
        self.latent.next_latent_question(self.params.friction())
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            session: self.key.to_string(),
            vitality: self.params.vitality(),
            friction: self.params.friction(),
            grounding: self.params.grounding(),
            plasticity: self.params.plasticity(),
            disposition: self.params.disposition(),
            katharsis: self.katharsis.state(),
            releases: self.katharsis.releases(),
            graph: self.graph.summary(),
            window: self.tiers.window_len(),
            archive: self.tiers.archive_len(),
            retry_pending: self.tiers.retry_pending(),
            latent_questions: self.latent.len(),
            attached_sources: self.files.len(),
        }
    }

    /// DNA ranked by beauty, then the `top` most beautiful consolidated nodes.
    pub fn memory(&self, top: usize) -> MemoryReport {
        let budget = self.config.graph.rank_budget;
        let ranked = |tier: Tier, limit: usize| -> Vec<RankedNode> {
            self.graph
                .rank_by_beauty(tier, budget)
                .into_iter()
                .take(limit)
                .filter_map(|(id, beauty)| {
                    let n = self.graph.get(id).ok()?;
                    Some(RankedNode {
                        id,
                        label: n.label().to_string(),
                        beauty,
                        depth: n.depth(),
                        salience: n.salience(),
                    })
                })
                .collect()
        };
        MemoryReport { dna: ranked(Tier::Dna, usize::MAX), consolidated: ranked(Tier::Consolidated, top) }
    }

    /// DNA labels plus attached sources.
    fn background(&self) -> String {
        let values: Vec<&str> = self.graph.dna_nodes().map(|n| n.label()).collect();
        let mut out = format!("Core values: {}\n", values.join(", "));
        if !self.files.is_empty() {
            out.push_str(&self.files.background(BACKGROUND_CHARS));
        }
        out
    }
}
