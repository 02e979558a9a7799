//! Latent questions: things the agent wants to ask, surfaced under tension.

use crate::config::ConsolidationConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LatentQueue {
    questions: VecDeque<String>,
    cooldown: u32,
    #[serde(skip)]
    max: usize,
    #[serde(skip)]
    cooldown_turns: u32,
    #[serde(skip)]
    friction_threshold: f64,
}

impl LatentQueue {
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self::default().with_config(config)
    }

    pub fn with_config(mut self, config: &ConsolidationConfig) -> Self {
        self.max = config.max_latent_questions;
        self.cooldown_turns = config.latent_cooldown;
        self.friction_threshold = config.latent_friction;
        self.trim();
        self
    }

    /// Queue a question; the oldest drops out when full.
    pub fn push(&mut self, question: impl Into<String>) {
        let q = question.into();
        if q.trim().is_empty() || self.questions.contains(&q) {
            return;
        }
        self.questions.push_back(q);
        self.trim();
    }

    fn trim(&mut self) {
        while self.questions.len() > self.max {
            self.questions.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(String::as_str)
    }

    /// Called once per turn. Pops the oldest question when friction is
    /// above the threshold and the cooldown has run out.
    pub fn next_latent_question(&mut self, friction: f64) -> Option<String> {
        let mut asked = None;
        if self.cooldown == 0 && friction > self.friction_threshold {
            asked = self.questions.pop_front();
            if asked.is_some() {
                self.cooldown = self.cooldown_turns;
            }
        }
        self.cooldown = self.cooldown.saturating_sub(1);
        asked
    }
}
