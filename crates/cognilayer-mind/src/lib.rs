//! Cognilayer Mind - cognitive state and memory graph engine
//!
//! Per agent:
//! - Parameters: Vitality, Friction and Grounding with homeostatic drift
//! - Memory graph: nodes with salience, depth and causal edges; DNA is permanent
//! - Tiers: a bounded active window condensed into an archive of sense pills
//! - Chains: step-by-step causal deduction, one node per step
//! - Gate and katharsis: DNA-guarded acceptance and forced friction release
//!
//! Text generation is an injected [`cognilayer_llm::Generator`].

pub mod chain;
pub mod config;
pub mod consolidation;
pub mod context;
pub mod evolve;
pub mod graph;
pub mod katharsis;
pub mod latent;
pub mod params;
pub mod persist;
pub mod registry;
pub mod session;
pub mod sovereignty;
pub mod tiers;

pub use chain::{CausalChainEngine, ChainOutcome, ChainSeed, ChainState};
pub use config::MindConfig;
pub use graph::{EdgeKind, MemoryGraph, MemoryNode, NodeSeed, Polarity, Tier};
pub use katharsis::{KatharsisMonitor, KatharsisState, Release};
pub use params::{Disposition, ParameterState, Signal, PHI, PHI_COMPLEMENT};
pub use persist::Workspace;
pub use registry::{SessionRegistry, SharedSession};
pub use session::{AgentSession, Feedback, TurnInput, TurnReport};
pub use sovereignty::{CandidateIdea, GateDecision, SovereigntyGate};
pub use tiers::{Condensation, SensePill, TierManager};
