//! Request/response shapes for the `/ai/*` HTTP surface. Kept separate
//! from `ae_domain::run::Run` so the wire format can evolve (field
//! renames, optional additions) without touching the engine's internal
//! aggregate.

use ae_domain::action::{ActionBatch, ExecutionEvent, FileChange};
use ae_domain::run::{HistoryConfig, Run, RunStatus};
use ae_domain::tool::{Message, MessageContent, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageDto {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessageDto> for Message {
    fn from(m: &ChatMessageDto) -> Self {
        Message { role: m.role, content: MessageContent::Text(m.content.clone()) }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfigDto {
    pub turns: usize,
    pub max_chars_per_message: usize,
    pub summary_enabled: bool,
    pub summary_max_chars: usize,
}

impl Default for HistoryConfigDto {
    fn default() -> Self {
        Self { turns: 20, max_chars_per_message: 4_000, summary_enabled: true, summary_max_chars: 2_000 }
    }
}

impl From<HistoryConfigDto> for HistoryConfig {
    fn from(d: HistoryConfigDto) -> Self {
        Self {
            turns: d.turns,
            max_chars_per_message: d.max_chars_per_message,
            summary_enabled: d.summary_enabled,
            summary_max_chars: d.summary_max_chars,
        }
    }
}

/// Body shared by `POST /ai/chat` and `POST /ai/runs/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartRunRequest {
    pub provider: String,
    pub messages: Vec<ChatMessageDto>,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub current_code: Option<String>,
    #[serde(default)]
    pub snippets: Vec<String>,
    #[serde(default)]
    pub chat_only: bool,
    #[serde(default)]
    pub planning_mode: bool,
    #[serde(default)]
    pub history_config: Option<HistoryConfigDto>,
    #[serde(default)]
    pub force_code_edit: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRunRequest {
    pub message: String,
}

/// Full run snapshot returned by `GET /ai/runs/{id}` and embedded in
/// every `AiResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRunInfo {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub iteration: u64,
    pub events: Vec<ExecutionEvent>,
    pub latest_batch: Option<ActionBatch>,
    pub pending_action_ids: Vec<String>,
    pub result_content: Option<String>,
    pub result_file_path: Option<String>,
    pub result_file_content: Option<String>,
    pub result_changes: Vec<FileChange>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&Run> for PlanRunInfo {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.run_id,
            status: run.status,
            iteration: run.iteration,
            events: run.events.clone(),
            latest_batch: run.latest_batch.clone(),
            pending_action_ids: run.pending_action_ids.clone(),
            result_content: run.result_content.clone(),
            result_file_path: run.result_file_path.clone(),
            result_file_content: run.result_file_content.clone(),
            result_changes: run.result_changes.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

/// Response to every `/ai/chat`, `/ai/runs/{id}/continue`, and
/// `/ai/runs/{id}/reply` call.
#[derive(Debug, Clone, Serialize)]
pub struct AiResponse {
    pub content: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<serde_json::Value>,
    pub changes: Vec<FileChange>,
    pub run: PlanRunInfo,
    pub run_id: Uuid,
    pub needs_user_trigger: bool,
    pub pending_actions: Vec<String>,
}

impl AiResponse {
    pub fn from_run(run: &Run) -> Self {
        let last_file_change = run.result_changes.last();
        let needs_user_trigger =
            run.latest_batch.as_ref().map(|b| b.decision.needs_user_trigger).unwrap_or(false);
        let action = if run.result_content.is_some() {
            "final_answer".to_string()
        } else if run.status == RunStatus::WaitingUser {
            "ask_user".to_string()
        } else if run.status == RunStatus::Blocked {
            "blocked".to_string()
        } else {
            "continue".to_string()
        };
        let content = run.result_content.clone().unwrap_or_else(|| {
            run.latest_batch.as_ref().map(|b| b.summary.clone()).unwrap_or_default()
        });

        Self {
            content,
            action,
            file_path: run.result_file_path.clone().or_else(|| last_file_change.map(|c| c.file_path.clone())),
            file_content: run.result_file_content.clone(),
            plan: run
                .latest_batch
                .as_ref()
                .filter(|_| run.planning_mode)
                .and_then(|b| serde_json::to_value(b).ok()),
            changes: run.result_changes.clone(),
            run: PlanRunInfo::from(run),
            run_id: run.run_id,
            needs_user_trigger,
            pending_actions: run.pending_action_ids.clone(),
        }
    }
}
