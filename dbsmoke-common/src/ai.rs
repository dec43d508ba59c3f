//! AI gateway client and response-shape-tolerant text extraction.
//!
//! The gateway may wrap completions differently per deployment, so the
//! textual payload is recovered through an ordered list of typed envelope
//! extractors rather than field-presence probing. The first extractor
//! that deserializes the response wins.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AiConfig;

/// Errors from the AI gateway transport layer.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned status {0}")]
    Status(u16),

    #[error("no extractor matched the response envelope")]
    UnrecognizedEnvelope,
}

/// Capability to perform one completion round-trip.
///
/// The raw JSON envelope is returned so callers share the extractor
/// chain; generator and analyzer both consume this seam, and tests
/// substitute scripted or failing implementations.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Value, AiError>;
}

/// HTTP client for the AI completion endpoint.
pub struct AiGatewayClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiGatewayClient {
    pub fn new(config: AiConfig, timeout: std::time::Duration) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionApi for AiGatewayClient {
    async fn complete(&self, prompt: &str) -> Result<Value, AiError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(self.config.token.expose())
            .json(&serde_json::json!({
                "model": self.config.deployment,
                "prompt": prompt,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

/// One typed strategy for pulling completion text out of an envelope.
trait ExtractText {
    fn extract(&self, envelope: &Value) -> Option<String>;
}

/// Anthropic-style `{ "content": [ { "text": ... }, ... ] }`.
struct ContentBlocks;

#[derive(Deserialize)]
struct ContentBlocksEnvelope {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

impl ExtractText for ContentBlocks {
    fn extract(&self, envelope: &Value) -> Option<String> {
        let parsed: ContentBlocksEnvelope = serde_json::from_value(envelope.clone()).ok()?;
        let text: Vec<String> = parsed.content.into_iter().map(|b| b.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join(""))
        }
    }
}

/// OpenAI-style `{ "choices": [ { "message": { "content": ... } } ] }`.
struct ChatMessage;

#[derive(Deserialize)]
struct ChatEnvelope {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

impl ExtractText for ChatMessage {
    fn extract(&self, envelope: &Value) -> Option<String> {
        let parsed: ChatEnvelope = serde_json::from_value(envelope.clone()).ok()?;
        parsed.choices.into_iter().next().map(|c| c.message.content)
    }
}

/// Bare `{ "text": ... }` or `{ "content": ... }` wrapper.
struct PlainText;

#[derive(Deserialize)]
struct PlainTextEnvelope {
    #[serde(alias = "content")]
    text: String,
}

impl ExtractText for PlainText {
    fn extract(&self, envelope: &Value) -> Option<String> {
        let parsed: PlainTextEnvelope = serde_json::from_value(envelope.clone()).ok()?;
        Some(parsed.text)
    }
}

/// Extract completion text from a response envelope, trying each known
/// shape in order.
pub fn extract_text(envelope: &Value) -> Result<String, AiError> {
    const EXTRACTORS: [&dyn ExtractText; 3] = [&ContentBlocks, &ChatMessage, &PlainText];
    EXTRACTORS
        .iter()
        .find_map(|e| e.extract(envelope))
        .ok_or(AiError::UnrecognizedEnvelope)
}

/// Strip markdown code fences the model may wrap its answer in.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Locate and parse the first well-formed JSON array of strings in
/// free text. Candidate slices are tried bracket-pair by bracket-pair;
/// brackets inside string fragments simply fail the parse and the scan
/// moves on.
pub fn first_array_literal(text: &str) -> Option<Vec<String>> {
    let text = strip_fences(text);
    let opens = text.char_indices().filter(|(_, c)| *c == '[');
    for (start, _) in opens {
        let tail = &text[start..];
        for (offset, c) in tail.char_indices() {
            if c != ']' {
                continue;
            }
            let candidate = &tail[..offset + 1];
            if let Ok(fragments) = serde_json::from_str::<Vec<String>>(candidate) {
                return Some(fragments);
            }
        }
    }
    None
}
