use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History compaction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default history-compaction policy, used whenever a run does not
/// override it via its own `history_config`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Number of most recent turns (user or assistant messages) kept
    /// verbatim on every planner call.
    #[serde(default = "d_turns")]
    pub turns: usize,
    /// A preserved message longer than this (UTF-8 chars) is truncated to
    /// its first and last `max_chars_per_message / 2` characters.
    #[serde(default = "d_max_chars")]
    pub max_chars_per_message: usize,
    /// Whether older turns beyond the window are summarized into a single
    /// synthetic system message rather than dropped outright.
    #[serde(default = "d_true")]
    pub summary_enabled: bool,
    /// Cap, in characters, on the synthesized summary message.
    #[serde(default = "d_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            turns: d_turns(),
            max_chars_per_message: d_max_chars(),
            summary_enabled: true,
            summary_max_chars: d_summary_max_chars(),
        }
    }
}

fn d_turns() -> usize {
    20
}
fn d_max_chars() -> usize {
    4_000
}
fn d_summary_max_chars() -> usize {
    2_000
}
fn d_true() -> bool {
    true
}
