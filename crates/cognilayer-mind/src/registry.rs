//! Concurrent map of live sessions.
//!
//! Each session sits behind its own async mutex: holding the guard across a
//! delegated call keeps "read parameters, call out, apply result" a single
//! critical section for that agent while other agents proceed.

use crate::config::MindConfig;
use crate::session::AgentSession;
use cognilayer_core::SessionKey;
use cognilayer_llm::Generator;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub type SharedSession = Arc<Mutex<AgentSession>>;

pub struct SessionRegistry {
    sessions: DashMap<SessionKey, SharedSession>,
    config: MindConfig,
    generator: Arc<dyn Generator>,
}

impl SessionRegistry {
    pub fn new(config: MindConfig, generator: Arc<dyn Generator>) -> Self {
        Self { sessions: DashMap::new(), config, generator }
    }

    /// Existing session for `key`, or a fresh one.
    pub fn get_or_create(&self, key: &SessionKey) -> SharedSession {
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| {
                info!("Session {} created", key);
                Arc::new(Mutex::new(AgentSession::new(key.clone(), self.config.clone(), self.generator.clone())))
            })
            .clone()
    }

    /// Register an already built (e.g. hydrated) session, replacing any
    /// session under the same key.
    pub fn insert(&self, session: AgentSession) -> SharedSession {
        let key = session.key().clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(key, shared.clone());
        shared
    }

    pub fn get(&self, key: &SessionKey) -> Option<SharedSession> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn remove(&self, key: &SessionKey) -> Option<SharedSession> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
