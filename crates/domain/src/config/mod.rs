mod compaction;
mod llm;
mod server;
mod workspace;

pub use compaction::CompactionConfig;
pub use llm::{LlmConfig, ProviderConfig, ProviderKind};
pub use server::ServerConfig;
pub use workspace::WorkspaceConfig;

use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub llm: LlmConfig,
    pub compaction: CompactionConfig,
}

impl Config {
    /// Assemble configuration from the process environment. Individual
    /// sections fall back to their defaults when the corresponding
    /// variables are unset.
    pub fn from_env() -> Self {
        let mut server = ServerConfig::default();
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                server.port = p;
            }
        }
        if let Ok(host) = std::env::var("HOST") {
            server.host = host;
        }
        if let Ok(ttl) = std::env::var("RUN_TTL_SEC") {
            if let Ok(v) = ttl.parse() {
                server.run_ttl_sec = v;
            }
        }
        if let Ok(n) = std::env::var("MAX_CONCURRENT_TOOLS") {
            if let Ok(v) = n.parse() {
                server.max_concurrent_tools = v;
            }
        }

        let mut workspace = WorkspaceConfig::default();
        if let Ok(root) = std::env::var("WORKSPACE_ROOT") {
            workspace.root = root.into();
        }

        Self {
            server,
            workspace,
            llm: LlmConfig::from_env(),
            compaction: CompactionConfig::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. Returns an
    /// empty vec when everything looks good; callers decide whether any
    /// `Error`-severity entry should abort startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.max_concurrent_tools == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.max_concurrent_tools".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !self.workspace.root.exists() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "workspace.root".into(),
                message: format!(
                    "{} does not exist yet; it will be created on first write",
                    self.workspace.root.display()
                ),
            });
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured; /ai/chat will fail until credentials are set".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for (i, p) in self.llm.providers.iter().enumerate() {
            if p.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "base_url must not be empty".into(),
                });
            } else if !p.base_url.starts_with("http://") && !p.base_url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        p.base_url
                    ),
                });
            }
            if !seen.insert(p.id.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!("duplicate provider id \"{}\"", p.id),
                });
            }
        }

        if self.compaction.turns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "compaction.turns".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.compaction.max_chars_per_message == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "compaction.max_chars_per_message".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            workspace: WorkspaceConfig { root: std::env::temp_dir() },
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    api_key: "sk-test".into(),
                    default_model: "gpt-4o-mini".into(),
                }],
            },
            compaction: CompactionConfig::default(),
        }
    }

    fn find_issue<'a>(errors: &'a [ConfigError], field: &str) -> Option<&'a ConfigError> {
        errors.iter().find(|e| e.field == field)
    }

    #[test]
    fn valid_config_has_no_errors() {
        let errors = valid_config().validate();
        assert!(errors.iter().all(|e| e.severity != ConfigSeverity::Error));
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let errors = cfg.validate();
        assert!(find_issue(&errors, "server.port").is_some());
    }

    #[test]
    fn empty_providers_is_a_warning_not_error() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let errors = cfg.validate();
        let issue = find_issue(&errors, "llm.providers").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn bad_base_url_scheme_is_an_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].base_url = "ftp://example.com".into();
        let errors = cfg.validate();
        assert!(find_issue(&errors, "llm.providers[0].base_url").is_some());
    }

    #[test]
    fn duplicate_provider_id_is_a_warning() {
        let mut cfg = valid_config();
        let dup = cfg.llm.providers[0].clone();
        cfg.llm.providers.push(dup);
        let errors = cfg.validate();
        let issue = find_issue(&errors, "llm.providers[1].id").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn display_formats_severity_tag() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "x".into(),
            message: "y".into(),
        };
        assert_eq!(err.to_string(), "[ERROR] x: y");
    }
}
