use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Seconds a terminal run stays in the registry after reaching a
    /// terminal status before the background sweeper evicts it.
    #[serde(default = "d_run_ttl")]
    pub run_ttl_sec: u64,
    /// Upper bound on tool executions running concurrently across all runs.
    #[serde(default = "d_max_tools")]
    pub max_concurrent_tools: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            run_ttl_sec: d_run_ttl(),
            max_concurrent_tools: d_max_tools(),
        }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_run_ttl() -> u64 {
    3600
}
fn d_max_tools() -> usize {
    16
}
