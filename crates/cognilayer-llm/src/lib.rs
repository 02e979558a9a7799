//! Cognilayer LLM - provider adapters with streaming support and the
//! blocking-completion generator port

pub mod anthropic;
pub mod generator;
pub mod ollama;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use generator::{GenerationError, Generator, ProviderGenerator, ScriptedGenerator};
pub use ollama::OllamaProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
