use ae_domain::error::Result;
use ae_domain::tool::Message;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What shape the model's reply must take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
}

/// A provider-agnostic chat completion request.
///
/// `messages` must already be flattened to plain `{role, content}` text —
/// snippets and tool outputs are serialized to text before this boundary.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
    pub stop: Vec<String>,
    pub system_prompt_override: Option<String>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// Where a usage count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    Provider,
    Estimated,
}

/// Token accounting for one chat call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub source: UsageSource,
}

impl Usage {
    /// `ceil(utf8_bytes / 4)`, used whenever a vendor omits token counts.
    pub fn estimate(input_text: &str, output_text: &str) -> Self {
        let input = (input_text.len() as u64).div_ceil(4);
        let output = (output_text.len() as u64).div_ceil(4);
        Self {
            input,
            output,
            total: input + output,
            source: UsageSource::Estimated,
        }
    }
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
    /// The exact compiled prompt sent to the vendor, for UI transparency.
    pub prompt_messages: Vec<Message>,
    pub elapsed_ms: u64,
    pub model: String,
    pub finish_reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every vendor adapter implements. Non-streaming only: the engine
/// waits for the full response before handing it to the planner or the
/// chat surface.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    /// Must never mutate `req.messages` in place.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// A unique identifier for this provider instance (e.g. "openai").
    fn provider_id(&self) -> &str;

    /// The model used when a request does not override one.
    fn default_model(&self) -> &str;
}
