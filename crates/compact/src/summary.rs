//! Summary generation and caching for the History Compactor.

use ae_domain::error::Result;
use ae_domain::tool::Message;
use ae_providers::{ChatRequest, ChatResponse, LlmProvider, ResponseFormat};
use sha2::{Digest, Sha256};

const SUMMARY_SYSTEM_PROMPT: &str =
    "Compress the prior conversation turns into a concise summary. Preserve \
     decisions made, constraints established, and open questions. Omit \
     greetings and pleasantries. Write in present tense.";

/// A cached `{hash, summary}` pair, kept alongside one `Run` (§4.2 point 4:
/// not a global cache — one entry is enough per run).
#[derive(Debug, Clone, Default)]
pub struct SummaryCache {
    entry: Option<(String, String)>,
}

impl SummaryCache {
    /// SHA-256 hex digest of the concatenated older messages, used as the
    /// cache key.
    pub fn hash_messages(messages: &[Message]) -> String {
        let mut hasher = Sha256::new();
        for m in messages {
            hasher.update(m.content.extract_all_text().as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Return the cached summary if the given older-messages prefix hashes
    /// to the same key as last time.
    pub fn get(&self, hash: &str) -> Option<&str> {
        self.entry
            .as_ref()
            .filter(|(h, _)| h == hash)
            .map(|(_, s)| s.as_str())
    }

    pub fn put(&mut self, hash: String, summary: String) {
        self.entry = Some((hash, summary));
    }
}

/// Build the flattened conversation text fed to the summarizer, truncating
/// any one message's contribution so the summary prompt itself stays
/// bounded regardless of `max_chars_per_message`.
fn build_conversation_text(messages: &[Message]) -> String {
    let mut buf = String::new();
    for m in messages {
        let role_label = match m.role {
            ae_domain::tool::Role::User => "User",
            ae_domain::tool::Role::Assistant => "Assistant",
            ae_domain::tool::Role::Tool => "Tool",
            ae_domain::tool::Role::System => "System",
        };
        buf.push_str(role_label);
        buf.push_str(": ");
        buf.push_str(&crate::truncation::truncate_head_tail(&m.content.extract_all_text(), 2000));
        buf.push('\n');
    }
    buf
}

/// Summarize `older` via the Provider Adapter, capped at `summary_max_chars`.
pub async fn generate_summary(
    provider: &dyn LlmProvider,
    older: &[Message],
    summary_max_chars: usize,
) -> Result<String> {
    let conversation = build_conversation_text(older);
    let req = ChatRequest {
        messages: vec![Message::user(&conversation)],
        temperature: Some(0.1),
        max_tokens: Some(1024),
        response_format: ResponseFormat::Text,
        stop: Vec::new(),
        system_prompt_override: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
        model: None,
    };
    let ChatResponse { content, .. } = provider.chat(req).await?;
    Ok(crate::truncation::truncate_per_file(&content, summary_max_chars).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_same_messages() {
        let a = vec![Message::user("hello")];
        let b = vec![Message::user("hello")];
        assert_eq!(SummaryCache::hash_messages(&a), SummaryCache::hash_messages(&b));
    }

    #[test]
    fn hash_changes_when_messages_change() {
        let a = vec![Message::user("hello")];
        let b = vec![Message::user("hello there")];
        assert_ne!(SummaryCache::hash_messages(&a), SummaryCache::hash_messages(&b));
    }

    #[test]
    fn cache_returns_none_on_mismatch() {
        let mut cache = SummaryCache::default();
        cache.put("abc".into(), "summary".into());
        assert_eq!(cache.get("xyz"), None);
        assert_eq!(cache.get("abc"), Some("summary"));
    }
}
