//! Generator port: one prompt in, one completed text out.
//!
//! The cognitive engine only ever needs whole completions (summaries,
//! deductions, syntheses), so it depends on [`Generator`] rather than on the
//! streaming [`LlmProvider`] surface. [`ProviderGenerator`] adapts any provider
//! and enforces a wall-clock timeout; [`ScriptedGenerator`] is the
//! deterministic double used by tests and offline runs.

use crate::provider::LlmProvider;
use crate::types::{LlmRequest, StreamDelta};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for `prompt`. `context` is background material
    /// (system text) and may be empty.
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, GenerationError>;
}

/// Adapts a streaming [`LlmProvider`] to the [`Generator`] port.
pub struct ProviderGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    timeout: Duration,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
            temperature: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn collect(&self, request: LlmRequest) -> Result<String, GenerationError> {
        let mut stream = self
            .provider
            .complete_stream(request, None)
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let mut text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamDelta::Text(t)) => text.push_str(&t),
                Ok(StreamDelta::Thinking(_)) => {}
                Ok(StreamDelta::Done { stop_reason, usage }) => {
                    debug!(?stop_reason, ?usage, chars = text.len(), "generation complete");
                    break;
                }
                Ok(StreamDelta::Error(e)) => return Err(GenerationError::Unavailable(e)),
                Err(e) => return Err(GenerationError::Unavailable(e.to_string())),
            }
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, GenerationError> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![crate::types::LlmMessage::user(prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            system: (!context.trim().is_empty()).then(|| context.to_string()),
        };

        let text = match tokio::time::timeout(self.timeout, self.collect(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(provider = self.provider.name(), timeout = ?self.timeout, "generation timed out");
                return Err(GenerationError::Timeout(self.timeout));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Unavailable("empty response".into()));
        }
        Ok(text.to_string())
    }
}

/// A sequence of canned results. Each call pops the next one; once the
/// script is exhausted the fallback is returned.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn sequence(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(GenerationError::Unavailable("script exhausted".into())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `text` on every call.
    pub fn constant(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(GenerationError::Unavailable(reason.into())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }

    /// Prompts received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _context: &str) -> Result<String, GenerationError> {
        self.prompts.lock().await.push(prompt.to_string());
        let next = self.script.lock().await.pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
