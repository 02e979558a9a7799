//! Memory graph: an arena of nodes with salience, depth and causal edges.
//!
//! Nodes are addressed by opaque [`NodeId`]s and edges are stored on the
//! source node, so cycles are ordinary data. Anything that walks the graph
//! takes an explicit visit budget.
//!
//! Tier promotion is one-way. The only operations that touch a node's tier
//! are [`MemoryGraph::promote_to_dna`] and the automatic promotion inside
//! [`MemoryGraph::reinforce`]; neither can demote, and no operation
//! lowers the depth of a DNA node.

use crate::config::{Foundation, GraphConfig};
use chrono::{DateTime, Utc};
use cognilayer_core::{Error, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Ephemeral,
    Consolidated,
    Dna,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Causes,
    Supports,
    Contradicts,
}

impl EdgeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "causes" | "cause" | "leads to" => Some(Self::Causes),
            "supports" | "support" => Some(Self::Supports),
            "contradicts" | "contradict" => Some(Self::Contradicts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CausalEdge {
    pub target: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    fn factor(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    id: NodeId,
    label: String,
    content: String,
    salience: f64,
    depth: f64,
    tier: Tier,
    edges: BTreeSet<CausalEdge>,
    /// Session epochs in which this node was positively reinforced.
    #[serde(default)]
    sessions: BTreeSet<u64>,
    created_at: DateTime<Utc>,
}

impl MemoryNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn salience(&self) -> f64 {
        self.salience
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn is_dna(&self) -> bool {
        self.tier == Tier::Dna
    }

    pub fn edges(&self) -> impl Iterator<Item = &CausalEdge> {
        self.edges.iter()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Description of a node to insert.
#[derive(Debug, Clone)]
pub struct NodeSeed {
    pub label: String,
    pub content: String,
    pub tier: Tier,
    pub salience: f64,
    pub depth: f64,
}

impl NodeSeed {
    pub fn ephemeral(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self { label: label.into(), content: content.into(), tier: Tier::Ephemeral, salience: 0.5, depth: 0.0 }
    }

    pub fn consolidated(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tier: Tier::Consolidated, ..Self::ephemeral(label, content) }
    }

    pub fn dna(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self { label: label.into(), content: content.into(), tier: Tier::Dna, salience: 0.9, depth: 1.0 }
    }

    pub fn with_salience(mut self, salience: f64) -> Self {
        self.salience = salience;
        self
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }
}

/// What a single reinforcement did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reinforcement {
    pub salience: f64,
    pub depth: f64,
    pub promoted: bool,
    /// Node fell under the floor and will go on the next decay tick.
    pub eviction_scheduled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub ephemeral: usize,
    pub consolidated: usize,
    pub dna: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryGraph {
    nodes: BTreeMap<NodeId, MemoryNode>,
    next_id: u64,
    /// Incremented once per opened session; tags positive reinforcement.
    session_epoch: u64,
    #[serde(skip)]
    config: GraphConfig,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl MemoryGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self { nodes: BTreeMap::new(), next_id: 1, session_epoch: 0, config }
    }

    /// Reattach rules after deserializing.
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self.next_id = self.next_id.max(self.nodes.keys().last().map_or(1, |id| id.raw() + 1));
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn session_epoch(&self) -> u64 {
        self.session_epoch
    }

    /// Start a new reinforcement session. Returns the new epoch.
    pub fn begin_session(&mut self) -> u64 {
        self.session_epoch += 1;
        self.session_epoch
    }

    pub fn get(&self, id: NodeId) -> Result<&MemoryNode> {
        self.nodes.get(&id).ok_or(Error::NotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    pub fn dna_nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values().filter(|n| n.is_dna())
    }

    pub fn insert(&mut self, seed: NodeSeed) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        let mut depth = non_negative(seed.depth);
        if seed.tier == Tier::Dna {
            depth = depth.max(self.config.dna_depth_ceiling);
        }
        self.nodes.insert(
            id,
            MemoryNode {
                id,
                label: seed.label,
                content: seed.content,
                salience: non_negative(seed.salience),
                depth,
                tier: seed.tier,
                edges: BTreeSet::new(),
                sessions: BTreeSet::new(),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Case-insensitive exact label lookup.
    pub fn find_by_label(&self, label: &str) -> Option<NodeId> {
        let wanted = label.trim();
        self.nodes
            .values()
            .find(|n| n.label.eq_ignore_ascii_case(wanted))
            .map(|n| n.id)
    }

    /// Existing node with this label, or a new consolidated one.
    pub fn ensure_concept(&mut self, label: &str, content: &str) -> NodeId {
        match self.find_by_label(label) {
            Some(id) => id,
            None => self.insert(NodeSeed::consolidated(label.trim(), content)),
        }
    }

    /// Plant the configured foundations as DNA and wire their supports.
    pub fn seed_foundations(&mut self, foundations: &[Foundation]) -> Vec<NodeId> {
        let ids: Vec<NodeId> = foundations
            .iter()
            .map(|f| match self.find_by_label(&f.label) {
                Some(id) => id,
                None => self.insert(NodeSeed::dna(f.label.clone(), f.description.clone())),
            })
            .collect();
        for (foundation, &from) in foundations.iter().zip(&ids) {
            for target in &foundation.supports {
                if let Some(to) = self.find_by_label(target) {
                    let _ = self.add_causal_edge(from, to, EdgeKind::Supports);
                }
            }
        }
        info!(count = ids.len(), "foundations planted");
        ids
    }

    /// Add an edge. Adding the same edge twice is a no-op; returns whether
    /// the edge is new.
    pub fn add_causal_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> Result<bool> {
        if !self.nodes.contains_key(&to) {
            return Err(Error::NotFound(to));
        }
        let node = self.nodes.get_mut(&from).ok_or(Error::NotFound(from))?;
        Ok(node.edges.insert(CausalEdge { target: to, kind }))
    }

    /// Edges pointing at `id` from other nodes.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = (NodeId, EdgeKind)> + '_ {
        self.nodes.values().flat_map(move |n| {
            n.edges
                .iter()
                .filter(move |e| e.target == id)
                .map(move |e| (n.id, e.kind))
        })
    }

    /// Number of edges touching `id` in either direction.
    pub fn degree(&self, id: NodeId) -> Result<usize> {
        let out = self.get(id)?.edges.len();
        Ok(out + self.incoming(id).filter(|(from, _)| *from != id).count())
    }

    /// Supporting edges touching `id` in either direction.
    fn support_count(&self, id: NodeId) -> usize {
        let out = self
            .nodes
            .get(&id)
            .map_or(0, |n| n.edges.iter().filter(|e| e.kind == EdgeKind::Supports).count());
        out + self
            .incoming(id)
            .filter(|(from, kind)| *from != id && *kind == EdgeKind::Supports)
            .count()
    }

    /// Change salience by `magnitude * sign * plasticity`.
    ///
    /// Positive reinforcement also deepens the node when it is structurally
    /// coherent (enough supporting edges, or positive reinforcement across
    /// enough sessions); reaching the depth ceiling promotes it to DNA.
    /// Negative reinforcement erodes depth on non-DNA nodes and schedules
    /// ephemeral nodes that fall under the floor for eviction.
    pub fn reinforce(&mut self, id: NodeId, magnitude: f64, sign: Polarity, plasticity: f64) -> Result<Reinforcement> {
        let supports = self.support_count(id);
        let epoch = self.session_epoch;
        let cfg = &self.config;
        let node = self.nodes.get_mut(&id).ok_or(Error::NotFound(id))?;

        let step = non_negative(magnitude) * finite_or_one(plasticity);
        node.salience = non_negative(node.salience + step * sign.factor());

        let mut promoted = false;
        let mut eviction_scheduled = false;
        match sign {
            Polarity::Positive => {
                node.sessions.insert(epoch);
                let coherent = supports >= cfg.promotion_support_edges || node.sessions.len() >= cfg.promotion_sessions;
                if coherent {
                    node.depth += step * cfg.depth_gain;
                    if node.tier != Tier::Dna && node.depth >= cfg.dna_depth_ceiling {
                        node.tier = Tier::Dna;
                        promoted = true;
                    }
                }
            }
            Polarity::Negative => {
                if node.tier != Tier::Dna {
                    node.depth = non_negative(node.depth - step * cfg.punishment_ratio);
                }
                eviction_scheduled = node.tier == Tier::Ephemeral && node.salience < cfg.eviction_floor;
            }
        }

        let outcome = Reinforcement { salience: node.salience, depth: node.depth, promoted, eviction_scheduled };
        if promoted {
            info!(node = %id, label = %node.label, depth = node.depth, "promoted to DNA");
        }
        if eviction_scheduled {
            debug!(node = %id, salience = node.salience, "scheduled for eviction");
        }
        Ok(outcome)
    }

    /// Promote a node to DNA. Depth is raised to the ceiling if below it.
    /// Returns false if the node already was DNA.
    pub fn promote_to_dna(&mut self, id: NodeId) -> Result<bool> {
        let ceiling = self.config.dna_depth_ceiling;
        let node = self.nodes.get_mut(&id).ok_or(Error::NotFound(id))?;
        if node.tier == Tier::Dna {
            return Ok(false);
        }
        node.tier = Tier::Dna;
        node.depth = node.depth.max(ceiling);
        info!(node = %id, label = %node.label, "promoted to DNA");
        Ok(true)
    }

    /// Decay salience of every non-DNA node, then evict ephemeral nodes
    /// under the floor along with edges pointing at them. Returns the
    /// evicted ids.
    pub fn decay_tick(&mut self) -> Vec<NodeId> {
        let keep = 1.0 - self.config.decay_rate;
        let floor = self.config.eviction_floor;
        let mut evicted = Vec::new();
        for node in self.nodes.values_mut() {
            if node.tier == Tier::Dna {
                continue;
            }
            node.salience *= keep;
            if node.tier == Tier::Ephemeral && node.salience < floor {
                evicted.push(node.id);
            }
        }
        if evicted.is_empty() {
            return evicted;
        }
        for id in &evicted {
            self.nodes.remove(id);
        }
        let gone: BTreeSet<NodeId> = evicted.iter().copied().collect();
        for node in self.nodes.values_mut() {
            node.edges.retain(|e| !gone.contains(&e.target));
        }
        debug!(count = evicted.len(), "evicted faded nodes");
        evicted
    }

    /// `depth / complexity`, where complexity grows with content length
    /// and edge count.
    pub fn beauty(&self, id: NodeId) -> Result<f64> {
        let node = self.get(id)?;
        let chars = node.content.chars().count() as f64;
        let complexity = 1.0 + (1.0 + chars).ln() / 10.0 + self.degree(id)? as f64 * 0.0618;
        Ok(node.depth / complexity)
    }

    /// Nodes of `tier` ordered by beauty, visiting at most `budget` nodes.
    pub fn rank_by_beauty(&self, tier: Tier, budget: usize) -> Vec<(NodeId, f64)> {
        let mut ranked: Vec<(NodeId, f64)> = self
            .nodes
            .values()
            .filter(|n| n.tier == tier)
            .take(budget)
            .filter_map(|n| self.beauty(n.id).ok().map(|b| (n.id, b)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Follow `causes` edges from `start`, breadth first, visiting at most
    /// `budget` nodes. Cycles are cut by the visited set.
    pub fn causal_reach(&self, start: NodeId, budget: usize) -> Result<Vec<NodeId>> {
        self.get(start)?;
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if order.len() >= budget {
                break;
            }
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(node) = self.nodes.get(&id) {
                queue.extend(node.edges.iter().filter(|e| e.kind == EdgeKind::Causes).map(|e| e.target));
            }
        }
        Ok(order)
    }

    pub fn summary(&self) -> GraphSummary {
        let mut s = GraphSummary { nodes: self.nodes.len(), ..Default::default() };
        for node in self.nodes.values() {
            s.edges += node.edges.len();
            match node.tier {
                Tier::Ephemeral => s.ephemeral += 1,
                Tier::Consolidated => s.consolidated += 1,
                Tier::Dna => s.dna += 1,
            }
        }
        s
    }
}

/// Short label for free text: the first few words, trimmed of trailing
/// punctuation.
pub fn derive_label(text: &str) -> String {
    let label: Vec<&str> = text.split_whitespace().take(6).collect();
    let label = label.join(" ");
    let label = label.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if label.is_empty() { "(empty)".to_string() } else { label.to_string() }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn finite_or_one(value: f64) -> f64 {
    if value.is_finite() { value } else { 1.0 }
}
