pub mod summary;
pub mod truncation;

use ae_domain::config::CompactionConfig;
use ae_domain::error::Result;
use ae_domain::tool::Message;
use ae_providers::LlmProvider;
use summary::SummaryCache;

/// Apply the History Compactor policy to a run's full message list,
/// returning the bounded `prompt_messages` to send on this LLM call.
///
/// `cache` is mutated in place when a fresh summary is computed.
pub async fn compact(
    messages: &[Message],
    config: &CompactionConfig,
    cache: &mut SummaryCache,
    provider: &dyn LlmProvider,
) -> Result<Vec<Message>> {
    let preserved_count = config.turns.min(messages.len());
    let split_at = messages.len() - preserved_count;
    let (older, recent) = messages.split_at(split_at);

    let mut out = Vec::with_capacity(preserved_count + 1);

    if config.summary_enabled && !older.is_empty() {
        let hash = SummaryCache::hash_messages(older);
        let summary_text = if let Some(cached) = cache.get(&hash) {
            cached.to_string()
        } else {
            let generated = summary::generate_summary(provider, older, config.summary_max_chars).await?;
            cache.put(hash, generated.clone());
            generated
        };
        out.push(Message::system(&summary_text));
    }

    for msg in recent {
        let text = msg.content.extract_all_text();
        let truncated = truncation::truncate_head_tail(&text, config.max_chars_per_message);
        if truncated == text {
            out.push(msg.clone());
        } else {
            out.push(match msg.role {
                ae_domain::tool::Role::User => Message::user(&truncated),
                ae_domain::tool::Role::Assistant => Message::assistant(&truncated),
                ae_domain::tool::Role::System => Message::system(&truncated),
                ae_domain::tool::Role::Tool => msg.clone(),
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_providers::{ChatRequest, ChatResponse, ResponseFormat, Usage, UsageSource};
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: "stub summary".into(),
                usage: Usage { input: 1, output: 1, total: 2, source: UsageSource::Estimated },
                prompt_messages: req.messages,
                elapsed_ms: 0,
                model: "stub".into(),
                finish_reason: Some("stop".into()),
            })
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn default_model(&self) -> &str {
            "stub"
        }
    }

    fn cfg() -> CompactionConfig {
        CompactionConfig { turns: 2, max_chars_per_message: 4000, summary_enabled: true, summary_max_chars: 2000 }
    }

    #[tokio::test]
    async fn keeps_all_messages_when_under_the_turn_window() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let mut cache = SummaryCache::default();
        let out = compact(&messages, &cfg(), &mut cache, &StubProvider).await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn summarizes_and_caches_older_messages() {
        let messages = vec![
            Message::user("turn 1"),
            Message::assistant("reply 1"),
            Message::user("turn 2"),
            Message::assistant("reply 2"),
        ];
        let mut cache = SummaryCache::default();
        let out = compact(&messages, &cfg(), &mut cache, &StubProvider).await.unwrap();
        // 1 summary + 2 preserved turns
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, ae_domain::tool::Role::System);
        assert!(cache.get(&SummaryCache::hash_messages(&messages[..2])).is_some());
    }

    #[tokio::test]
    async fn truncates_oversized_preserved_messages() {
        let long = "x".repeat(10_000);
        let messages = vec![Message::user(&long)];
        let mut small_cfg = cfg();
        small_cfg.turns = 1;
        small_cfg.max_chars_per_message = 100;
        let mut cache = SummaryCache::default();
        let out = compact(&messages, &small_cfg, &mut cache, &StubProvider).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].content.extract_all_text().len() < 10_000);
        assert!(out[0].content.extract_all_text().contains("...[truncated]..."));
    }
}
