//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API's non-streaming `chat` path, with
//! the Anthropic-specific message structure where system content goes in a
//! separate top-level `system` field rather than the messages array.

use crate::retry::with_backoff;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider, Usage, UsageSource};
use crate::util::{classify_http_error, from_reqwest};
use ae_domain::config::ProviderConfig;
use ae_domain::error::Result;
use ae_domain::tool::{Message, Role};
use serde_json::Value;
use std::time::Instant;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut system_parts: Vec<String> = Vec::new();
        if let Some(system) = &req.system_prompt_override {
            system_parts.push(system.clone());
        }
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User | Role::Tool => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content.extract_all_text(),
                })),
                Role::Assistant => api_messages.push(serde_json::json!({
                    "role": "assistant",
                    "content": msg.content.extract_all_text(),
                })),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": false,
            "max_tokens": req.max_tokens.unwrap_or(4096),
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if !req.stop.is_empty() {
            body["stop_sequences"] = serde_json::json!(req.stop);
        }
        body
    }

    async fn send_once(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req);
        let start = Instant::now();

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(classify_http_error(&self.id, status, &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        parse_anthropic_response(&resp_json, req, elapsed_ms)
    }
}

fn parse_anthropic_response(body: &Value, req: &ChatRequest, elapsed_ms: u64) -> Result<ChatResponse> {
    let content_arr = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut text_parts: Vec<String> = Vec::new();
    for block in &content_arr {
        if block.get("type").and_then(|v| v.as_str()) == Some("text") {
            if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                text_parts.push(t.to_string());
            }
        }
    }
    let content = text_parts.join("");

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();

    let finish_reason = body.get("stop_reason").and_then(|v| v.as_str()).map(|s| match s {
        "end_turn" => "stop".to_string(),
        other => other.to_string(),
    });

    let usage = body.get("usage").and_then(parse_anthropic_usage).unwrap_or_else(|| {
        let input_text: String = req.messages.iter().map(|m: &Message| m.content.extract_all_text()).collect();
        Usage::estimate(&input_text, &content)
    });

    Ok(ChatResponse {
        content,
        usage,
        prompt_messages: req.messages.clone(),
        elapsed_ms,
        model,
        finish_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()?;
    let output = v.get("output_tokens")?.as_u64()?;
    Some(Usage { input, output, total: input + output, source: UsageSource::Provider })
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        with_backoff(|| self.send_once(&req)).await
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

