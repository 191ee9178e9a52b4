//! External LLM providers, streamed over SSE.
//!
//! Every provider answers with `data: {json}` lines; only the request shape
//! and the per-event JSON differ. OpenAI and Groq share a format.

use std::pin::Pin;

use futures::Stream;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::types::{ChatMessage, LLMProvider};

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// What one SSE `data:` payload means.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Error(String),
    Skip,
}

/// Stream tokens from the given provider.
pub fn stream_llm(
    client: &Client,
    provider: LLMProvider,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    temperature: f64,
    max_tokens: usize,
) -> BoxedStream {
    debug!("Streaming from {} with model {}", provider, model);
    let request = build_request(client, provider, messages, model, api_key, temperature, max_tokens);
    let parse: fn(&str) -> SseEvent = match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => openai_event,
        LLMProvider::Anthropic => anthropic_event,
        LLMProvider::Gemini => gemini_event,
    };
    Box::pin(sse_stream(request, parse))
}

/// Run a prompt to completion and return the full text.
pub async fn complete(
    client: &Client,
    provider: LLMProvider,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    temperature: f64,
    max_tokens: usize,
) -> Result<String, String> {
    let mut stream = stream_llm(client, provider, messages, model, api_key, temperature, max_tokens);
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(t) => text.push_str(&t),
            StreamChunk::Done { tokens_used } => {
                debug!("{} finished after {} chunks", provider, tokens_used);
                break;
            }
            StreamChunk::Error(e) => return Err(e),
        }
    }
    if text.trim().is_empty() {
        return Err(format!("{} returned an empty response", provider));
    }
    Ok(text)
}

fn build_request(
    client: &Client,
    provider: LLMProvider,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    temperature: f64,
    max_tokens: usize,
) -> RequestBuilder {
    let system: Option<&str> = messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str());
    let conversation = messages.iter().filter(|m| m.role != "system");

    match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            let url = if provider == LLMProvider::Groq {
                "https://api.groq.com/openai/v1/chat/completions"
            } else {
                "https://api.openai.com/v1/chat/completions"
            };
            let msgs: Vec<Value> = messages
                .iter()
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect();
            client
                .post(url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&json!({
                    "model": model,
                    "messages": msgs,
                    "temperature": temperature,
                    "max_tokens": max_tokens,
                    "stream": true,
                }))
        }
        LLMProvider::Anthropic => {
            let msgs: Vec<Value> = conversation
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect();
            let mut body = json!({
                "model": model,
                "messages": msgs,
                "temperature": temperature,
                "max_tokens": max_tokens,
                "stream": true,
            });
            if let Some(sys) = system {
                body["system"] = json!(sys);
            }
            client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
        }
        LLMProvider::Gemini => {
            let contents: Vec<Value> = conversation
                .map(|m| {
                    let role = if m.role == "assistant" { "model" } else { "user" };
                    json!({"role": role, "parts": [{"text": m.content}]})
                })
                .collect();
            let mut body = json!({
                "contents": contents,
                "generationConfig": {
                    "temperature": temperature,
                    "maxOutputTokens": max_tokens,
                },
            });
            if let Some(sys) = system {
                body["systemInstruction"] = json!({"parts": [{"text": sys}]});
            }
            client
                .post(format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse",
                    model
                ))
                .header("x-goog-api-key", api_key)
                .json(&body)
        }
    }
}

fn sse_stream(
    request: RequestBuilder,
    parse: fn(&str) -> SseEvent,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(line_end) = buffer.find('\n') {
                let line: String = buffer.drain(..=line_end).collect();
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };
                match parse(data.trim()) {
                    SseEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    SseEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseEvent::Error(msg) => {
                        error!("LLM stream error: {}", msg);
                        yield StreamChunk::Error(msg);
                        return;
                    }
                    SseEvent::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

fn non_empty(text: Option<&str>) -> SseEvent {
    match text {
        Some(t) if !t.is_empty() => SseEvent::Token(t.to_string()),
        _ => SseEvent::Skip,
    }
}

fn openai_event(data: &str) -> SseEvent {
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(parsed) => non_empty(parsed["choices"][0]["delta"]["content"].as_str()),
        Err(_) => SseEvent::Skip,
    }
}

fn anthropic_event(data: &str) -> SseEvent {
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return SseEvent::Skip;
    };
    match parsed["type"].as_str() {
        Some("content_block_delta") => non_empty(parsed["delta"]["text"].as_str()),
        Some("message_stop") => SseEvent::Done,
        Some("error") => SseEvent::Error(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        _ => SseEvent::Skip,
    }
}

fn gemini_event(data: &str) -> SseEvent {
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return SseEvent::Skip;
    };
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return SseEvent::Error(msg.to_string());
    }
    let text: String = parsed["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    non_empty(Some(&text))
}
