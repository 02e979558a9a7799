//! Ollama `/api/generate` provider with NDJSON streaming

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(OLLAMA_DEFAULT_URL)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let prompt = request.flattened_prompt();
        let body = GenerateRequest {
            model: &request.model,
            prompt: &prompt,
            system: request.system.as_deref(),
            stream: true,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(model = %body.model, prompt_chars = prompt.len(), "ollama request");

        let response = self.client.post(self.generate_url()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama error {}: {}", status, error_text);
            return Err(LlmError::RequestFailed(format!("{}: {}", status, error_text)));
        }

        let cancel = cancel.unwrap_or_default();
        let bytes_stream = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer = String::new();
            tokio::pin!(bytes_stream);
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => None,
                    next = bytes_stream.next() => Some(next),
                };
                let chunk = match next {
                    None => {
                        yield Err(LlmError::Cancelled);
                        break;
                    }
                    Some(None) => break,
                    Some(Some(chunk)) => chunk,
                };
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(LlmError::StreamError(e.to_string()));
                        continue;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(line_end) = buffer.find('\n') {
                    let line: String = buffer.drain(..=line_end).collect();
                    if let Some(item) = parse_ndjson_line(&line) {
                        yield item;
                    }
                }
            }
            if let Some(item) = parse_ndjson_line(&buffer) {
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Decode one line of the generate stream. Blank lines yield nothing.
pub fn parse_ndjson_line(line: &str) -> Option<LlmResult<StreamDelta>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let chunk: GenerateChunk = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => return Some(Err(LlmError::InvalidResponse(format!("{}: {}", e, line)))),
    };
    if let Some(message) = chunk.error {
        return Some(Err(LlmError::StreamError(message)));
    }
    if chunk.done {
        let usage = match (chunk.prompt_eval_count, chunk.eval_count) {
            (None, None) => None,
            (input, output) => Some(Usage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };
        return Some(Ok(StreamDelta::Done {
            stop_reason: chunk.done_reason.or_else(|| Some("stop".to_string())),
            usage,
        }));
    }
    if chunk.response.is_empty() {
        return None;
    }
    Some(Ok(StreamDelta::Text(chunk.response)))
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}
