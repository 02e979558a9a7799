//! Tests for cognilayer-llm: request types, stream decoders, generator port

use cognilayer_llm::anthropic::SseDecoder;
use cognilayer_llm::ollama::parse_ndjson_line;
use cognilayer_llm::*;
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert!(req.messages.is_empty());
    assert_eq!(req.max_tokens, Some(1024));
    assert!(req.temperature.is_none());
    assert!(req.system.is_none());
}

#[test]
fn llm_request_prompt_builds_single_user_message() {
    let req = LlmRequest::prompt("llama3:8b", "summarize this");
    assert_eq!(req.model, "llama3:8b");
    assert_eq!(req.messages, vec![LlmMessage::user("summarize this")]);
}

#[test]
fn llm_request_flattened_prompt_joins_messages() {
    let mut req = LlmRequest::prompt("m", "first");
    req.messages.push(LlmMessage::assistant("second"));
    assert_eq!(req.flattened_prompt(), "first\n\nsecond");
}

#[test]
fn llm_request_skips_empty_optionals() {
    let mut req = LlmRequest::prompt("m", "hi");
    req.max_tokens = None;
    let json = serde_json::to_string(&req).unwrap();
    assert!(!json.contains("max_tokens"));
    assert!(!json.contains("system"));
    assert!(!json.contains("temperature"));
}

// ===========================================================================
// Anthropic SSE decoding
// ===========================================================================

#[test]
fn sse_text_deltas_decode() {
    let mut d = SseDecoder::default();
    let out = d.push(
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
    );
    assert_eq!(out.len(), 1);
    assert_eq!(*out[0].as_ref().unwrap(), StreamDelta::Text("Hel".into()));
}

#[test]
fn sse_event_split_across_chunks() {
    let mut d = SseDecoder::default();
    assert!(d.push("event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"te").is_empty());
    let out = d.push("xt_delta\",\"text\":\"lo\"}}\n\n");
    assert_eq!(*out[0].as_ref().unwrap(), StreamDelta::Text("lo".into()));
}

#[test]
fn sse_message_stop_reports_stop_reason_and_usage() {
    let mut d = SseDecoder::default();
    let out = d.push(concat!(
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":12}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    ));
    assert_eq!(out.len(), 1);
    match out[0].as_ref().unwrap() {
        StreamDelta::Done { stop_reason, usage } => {
            assert_eq!(stop_reason.as_deref(), Some("max_tokens"));
            assert_eq!(usage.as_ref().unwrap().output_tokens, 12);
        }
        other => panic!("Expected Done, got {:?}", other),
    }
}

#[test]
fn sse_error_event_becomes_stream_error() {
    let mut d = SseDecoder::default();
    let out = d.push(
        "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
    );
    match &out[0] {
        Err(LlmError::StreamError(msg)) => assert_eq!(msg, "Overloaded"),
        other => panic!("Expected StreamError, got {:?}", other),
    }
}

#[test]
fn sse_ignores_ping_and_unknown_deltas() {
    let mut d = SseDecoder::default();
    let out = d.push(concat!(
        "event: ping\ndata: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"signature_delta\",\"signature\":\"x\"}}\n\n",
    ));
    assert!(out.is_empty());
}

// ===========================================================================
// Ollama NDJSON decoding
// ===========================================================================

#[test]
fn ndjson_text_chunk() {
    let item = parse_ndjson_line(r#"{"model":"llama3","response":"The sky","done":false}"#).unwrap();
    assert_eq!(item.unwrap(), StreamDelta::Text("The sky".into()));
}

#[test]
fn ndjson_blank_and_empty_response_lines_yield_nothing() {
    assert!(parse_ndjson_line("   ").is_none());
    assert!(parse_ndjson_line(r#"{"response":"","done":false}"#).is_none());
}

#[test]
fn ndjson_done_line_carries_usage() {
    let item = parse_ndjson_line(
        r#"{"response":"","done":true,"done_reason":"stop","prompt_eval_count":26,"eval_count":290}"#,
    )
    .unwrap();
    assert_eq!(
        item.unwrap(),
        StreamDelta::Done {
            stop_reason: Some("stop".into()),
            usage: Some(Usage { input_tokens: 26, output_tokens: 290 }),
        }
    );
}

#[test]
fn ndjson_error_line() {
    match parse_ndjson_line(r#"{"error":"model 'x' not found"}"#).unwrap() {
        Err(LlmError::StreamError(msg)) => assert!(msg.contains("not found")),
        other => panic!("Expected StreamError, got {:?}", other),
    }
}

#[test]
fn ndjson_malformed_line_is_invalid_response() {
    assert!(matches!(
        parse_ndjson_line("{not json").unwrap(),
        Err(LlmError::InvalidResponse(_))
    ));
}

// ===========================================================================
// ProviderGenerator
// ===========================================================================

/// Provider that streams fixed deltas, optionally after a delay.
struct StubProvider {
    deltas: Vec<StreamDelta>,
    delay: Duration,
    fail: bool,
}

impl StubProvider {
    fn text(chunks: &[&str]) -> Self {
        let mut deltas: Vec<StreamDelta> = chunks.iter().map(|c| StreamDelta::Text(c.to_string())).collect();
        deltas.push(StreamDelta::Done { stop_reason: Some("end_turn".into()), usage: None });
        Self { deltas, delay: Duration::ZERO, fail: false }
    }
}

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete_stream(
        &self,
        _request: LlmRequest,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        if self.fail {
            return Err(LlmError::RequestFailed("connection refused".into()));
        }
        let deltas = self.deltas.clone();
        let delay = self.delay;
        Ok(Box::pin(async_stream::stream! {
            tokio::time::sleep(delay).await;
            for d in deltas {
                yield Ok(d);
            }
        }))
    }
}

#[tokio::test]
async fn provider_generator_collects_text_chunks() {
    let g = ProviderGenerator::new(Arc::new(StubProvider::text(&["  Because ", "rain falls."])), "m");
    assert_eq!(g.generate("p", "").await.unwrap(), "Because rain falls.");
    assert_eq!(g.provider_name(), "stub");
}

#[tokio::test]
async fn provider_generator_empty_response_is_unavailable() {
    let g = ProviderGenerator::new(Arc::new(StubProvider::text(&["   "])), "m");
    assert!(matches!(g.generate("p", "").await, Err(GenerationError::Unavailable(_))));
}

#[tokio::test]
async fn provider_generator_request_failure_is_unavailable() {
    let mut stub = StubProvider::text(&["x"]);
    stub.fail = true;
    let g = ProviderGenerator::new(Arc::new(stub), "m");
    match g.generate("p", "ctx").await {
        Err(GenerationError::Unavailable(msg)) => assert!(msg.contains("connection refused")),
        other => panic!("Expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn provider_generator_stream_error_delta_is_unavailable() {
    let stub = StubProvider {
        deltas: vec![StreamDelta::Text("half".into()), StreamDelta::Error("overloaded".into())],
        delay: Duration::ZERO,
        fail: false,
    };
    let g = ProviderGenerator::new(Arc::new(stub), "m");
    assert_eq!(
        g.generate("p", "").await,
        Err(GenerationError::Unavailable("overloaded".into()))
    );
}

#[tokio::test]
async fn provider_generator_times_out() {
    let mut stub = StubProvider::text(&["late"]);
    stub.delay = Duration::from_secs(5);
    let g = ProviderGenerator::new(Arc::new(stub), "m").with_timeout(Duration::from_millis(20));
    assert_eq!(
        g.generate("p", "").await,
        Err(GenerationError::Timeout(Duration::from_millis(20)))
    );
}

// ===========================================================================
// ScriptedGenerator
// ===========================================================================

#[tokio::test]
async fn scripted_generator_pops_in_order_then_falls_back() {
    let g = ScriptedGenerator::sequence(vec![
        Ok("one".into()),
        Err(GenerationError::Unavailable("down".into())),
    ]);
    assert_eq!(g.generate("a", "").await.unwrap(), "one");
    assert!(g.generate("b", "").await.is_err());
    assert!(matches!(g.generate("c", "").await, Err(GenerationError::Unavailable(_))));
    assert_eq!(g.call_count().await, 3);
    assert_eq!(g.prompts().await, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn scripted_generator_constant_and_unavailable() {
    let ok = ScriptedGenerator::constant("same");
    assert_eq!(ok.generate("x", "").await.unwrap(), "same");
    assert_eq!(ok.generate("y", "").await.unwrap(), "same");

    let down = ScriptedGenerator::unavailable("offline");
    assert_eq!(
        down.generate("x", "").await,
        Err(GenerationError::Unavailable("offline".into()))
    );
}

#[test]
fn generation_error_display() {
    assert_eq!(
        GenerationError::Unavailable("offline".into()).to_string(),
        "generator unavailable: offline"
    );
    assert!(GenerationError::Timeout(Duration::from_secs(3)).to_string().contains("3s"));
}
