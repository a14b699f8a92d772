use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registered LLM providers, assembled from environment variables at
/// startup. A provider whose required env vars are absent is simply
/// omitted — never a startup failure (`LlmStartupPolicy::AllowNone`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl LlmConfig {
    /// Build the provider list from `OPENAI_*`, `ANTHROPIC_*`, and
    /// `CUSTOM_*` environment variables.
    pub fn from_env() -> Self {
        let mut providers = Vec::new();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            providers.push(ProviderConfig {
                id: "openai".into(),
                kind: ProviderKind::OpenaiCompat,
                base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
                api_key,
                default_model: std::env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".into()),
            });
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            providers.push(ProviderConfig {
                id: "anthropic".into(),
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                api_key,
                default_model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-20250514".into()),
            });
        }

        if let (Ok(api_key), Ok(base_url)) = (
            std::env::var("CUSTOM_API_KEY"),
            std::env::var("CUSTOM_BASE_URL"),
        ) {
            providers.push(ProviderConfig {
                id: "custom".into(),
                kind: ProviderKind::OpenaiCompat,
                base_url,
                api_key,
                default_model: std::env::var("CUSTOM_MODEL")
                    .unwrap_or_else(|_| "default".into()),
            });
        }

        Self { providers }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Resolved eagerly from the environment at startup; never logged.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub default_model: String,
}

/// Which wire format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_empty_when_no_keys_set() {
        for var in ["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "CUSTOM_API_KEY", "CUSTOM_BASE_URL"] {
            std::env::remove_var(var);
        }
        let cfg = LlmConfig::from_env();
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn from_env_picks_up_openai() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("CUSTOM_API_KEY");
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = LlmConfig::from_env();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].id, "openai");
        assert_eq!(cfg.providers[0].kind, ProviderKind::OpenaiCompat);
        std::env::remove_var("OPENAI_API_KEY");
    }
}
