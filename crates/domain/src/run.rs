//! The `Run` aggregate owned by the Run Registry.

use crate::action::{ActionBatch, ActionRecord, ExecutionEvent};
use crate::tool::Message;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    WaitingUser,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Blocked,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Per-run history-compaction policy. Falls back to the server-wide
/// `CompactionConfig` defaults when a request omits it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub turns: usize,
    pub max_chars_per_message: usize,
    pub summary_enabled: bool,
    pub summary_max_chars: usize,
}

impl From<crate::config::CompactionConfig> for HistoryConfig {
    fn from(c: crate::config::CompactionConfig) -> Self {
        Self {
            turns: c.turns,
            max_chars_per_message: c.max_chars_per_message,
            summary_enabled: c.summary_enabled,
            summary_max_chars: c.summary_max_chars,
        }
    }
}

/// A conversational message as stored on the run, carrying the optional
/// editor-context fields the chat surface may attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default)]
    pub snippets: Vec<String>,
    #[serde(default)]
    pub chat_only: bool,
}

/// A run's control flags. Mutated by any caller; observed and acted upon
/// only by the run's own executor at the next safe point.
#[derive(Debug, Default)]
pub struct ControlFlags {
    pause_requested: AtomicBool,
    cancel_requested: AtomicBool,
}

impl ControlFlags {
    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::Release);
    }
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }
    pub fn is_pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::Acquire)
    }
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
    /// Clear the pause flag once the executor has observed and acted on it
    /// (e.g. after a `resume_run`).
    pub fn clear_pause(&self) {
        self.pause_requested.store(false, Ordering::Release);
    }
}

/// A server-side object tracking one user intent end-to-end.
#[derive(Debug)]
pub struct Run {
    pub run_id: uuid::Uuid,
    pub intent: String,
    pub provider_id: String,
    pub status: RunStatus,
    pub iteration: u64,
    pub max_retries: u32,
    pub messages: Vec<RunMessage>,
    pub history_config: HistoryConfig,
    pub action_history: Vec<ActionRecord>,
    pub latest_batch: Option<ActionBatch>,
    pub pending_action_ids: Vec<String>,
    pub active_action_id: Option<String>,
    pub events: Vec<ExecutionEvent>,
    pub next_event_id: u64,
    pub result_content: Option<String>,
    pub result_file_path: Option<String>,
    pub result_file_content: Option<String>,
    pub result_changes: Vec<crate::action::FileChange>,
    pub planning_mode: bool,
    pub controls: ControlFlags,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Run {
    pub fn new(
        intent: impl Into<String>,
        provider_id: impl Into<String>,
        history_config: HistoryConfig,
        planning_mode: bool,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            intent: intent.into(),
            provider_id: provider_id.into(),
            status: RunStatus::Queued,
            iteration: 0,
            max_retries: 2,
            messages: Vec::new(),
            history_config,
            action_history: Vec::new(),
            latest_batch: None,
            pending_action_ids: Vec::new(),
            active_action_id: None,
            events: Vec::new(),
            next_event_id: 0,
            result_content: None,
            result_file_path: None,
            result_file_content: None,
            result_changes: Vec::new(),
            planning_mode,
            controls: ControlFlags::default(),
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    /// Append an event, assigning the next monotonic id and a
    /// non-decreasing timestamp.
    pub fn push_event(&mut self, mut event: ExecutionEvent) -> u64 {
        event.event_id = self.next_event_id;
        self.next_event_id += 1;
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        }
        let id = event.event_id;
        self.events.push(event);
        id
    }

    pub fn transition(&mut self, status: RunStatus) {
        self.status = status;
        if status.is_terminal() {
            self.finished_at = Some(chrono::Utc::now());
        }
    }
}
