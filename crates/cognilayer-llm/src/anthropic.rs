//! Anthropic Messages API provider with SSE streaming

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmMessage, LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = AnthropicRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(1024),
            stream: true,
            system: request.system.as_deref(),
            temperature: request.temperature,
        };

        debug!(model = %body.model, messages = body.messages.len(), "anthropic request");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, error_text);
            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60_000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let cancel = cancel.unwrap_or_default();
        let bytes_stream = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
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
                match chunk {
                    Ok(bytes) => {
                        for item in decoder.push(&String::from_utf8_lossy(&bytes)) {
                            yield item;
                        }
                    }
                    Err(e) => yield Err(LlmError::StreamError(e.to_string())),
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Incremental decoder for the `event:` / `data:` frames of the Messages stream.
///
/// Stop reason and usage arrive in `message_delta` and are held until
/// `message_stop` so they can be reported together on `Done`.
#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

impl SseDecoder {
    /// Feed a chunk of raw bytes (already utf-8 decoded). Returns every
    /// delta completed by this chunk.
    pub fn push(&mut self, chunk: &str) -> Vec<LlmResult<StreamDelta>> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_str: String = self.buffer.drain(..event_end + 2).collect();

            let mut event_type = "";
            let mut event_data = "";
            for line in event_str.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event_type = rest;
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    event_data = rest;
                }
            }
            if event_data.is_empty() {
                continue;
            }
            if let Some(item) = self.decode(event_type, event_data) {
                out.push(item);
            }
        }
        out
    }

    fn decode(&mut self, event_type: &str, data: &str) -> Option<LlmResult<StreamDelta>> {
        match event_type {
            "content_block_delta" => {
                let data = serde_json::from_str::<ContentBlockDelta>(data).ok()?;
                match data.delta {
                    DeltaType::TextDelta { text } => Some(Ok(StreamDelta::Text(text))),
                    DeltaType::ThinkingDelta { thinking } => Some(Ok(StreamDelta::Thinking(thinking))),
                    DeltaType::Other => None,
                }
            }
            "message_delta" => {
                if let Ok(data) = serde_json::from_str::<MessageDelta>(data) {
                    self.stop_reason = data.delta.stop_reason;
                    if let Some(u) = data.usage {
                        self.usage = Some(Usage {
                            input_tokens: u.input_tokens.unwrap_or(0),
                            output_tokens: u.output_tokens,
                        });
                    }
                }
                None
            }
            "message_stop" => Some(Ok(StreamDelta::Done {
                stop_reason: self.stop_reason.take().or_else(|| Some("end_turn".to_string())),
                usage: self.usage.take(),
            })),
            "error" => {
                let message = serde_json::from_str::<ErrorEvent>(data)
                    .map(|e| e.error.message)
                    .unwrap_or_else(|_| data.to_string());
                Some(Err(LlmError::StreamError(message)))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<DeltaUsage>,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaUsage {
    input_tokens: Option<u32>,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
