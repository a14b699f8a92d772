//! The closed set of action types the planner may emit and the executor
//! may run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single typed operation the planner asks the executor to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub title: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub can_parallel: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

fn default_timeout_sec() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

/// The closed enum of side-effectful operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ScanWorkspace,
    ReadFiles,
    SearchCode,
    ExtractSymbols,
    AnalyzeDependencies,
    SummarizeContext,
    ProposeSubplan,
    CreateFile,
    UpdateFile,
    DeleteFile,
    MoveFile,
    ApplyPatch,
    RunCommand,
    RunTests,
    RunLint,
    RunBuild,
    ValidateResult,
    AskUser,
    RequestApproval,
    FinalAnswer,
    ReportBlocker,
}

impl ActionType {
    /// Actions whose failure must terminate the owning run.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            ActionType::CreateFile
                | ActionType::UpdateFile
                | ActionType::DeleteFile
                | ActionType::MoveFile
                | ActionType::ApplyPatch
                | ActionType::FinalAnswer
                | ActionType::ReportBlocker
        )
    }

    /// Actions that suspend the run pending human input.
    pub fn suspends_run(self) -> bool {
        matches!(self, ActionType::AskUser | ActionType::RequestApproval)
    }

    /// Actions that write to, or otherwise mutate, the workspace.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            ActionType::CreateFile
                | ActionType::UpdateFile
                | ActionType::DeleteFile
                | ActionType::MoveFile
                | ActionType::ApplyPatch
                | ActionType::RunCommand
                | ActionType::RunTests
                | ActionType::RunLint
                | ActionType::RunBuild
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ActionType::FinalAnswer | ActionType::ReportBlocker)
    }
}

/// The planner's output for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBatch {
    pub version: u32,
    pub iteration: u64,
    #[serde(default)]
    pub summary: String,
    pub decision: Decision,
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub acceptance: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub next_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub mode: DecisionMode,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub needs_user_trigger: bool,
    #[serde(default)]
    pub satisfaction_score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    Continue,
    AskUser,
    Done,
    Blocked,
}

/// Status of a single executed action: queued -> running ->
/// completed|failed|skipped|cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

/// One entry in a run's `action_history`. Never mutated in place; status
/// transitions rewrite the record at a stable index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub iteration: u64,
    pub action_id: String,
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub error: Option<ActionError>,
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionError {
    pub kind: crate::error::ErrorKind,
    pub message: String,
}

/// Emitted by file-mutating actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub file_path: String,
    #[serde(default)]
    pub before_content: Option<String>,
    #[serde(default)]
    pub after_content: Option<String>,
    pub file_content: String,
    #[serde(default)]
    pub diff_unified: Option<String>,
    #[serde(default)]
    pub before_hash: Option<String>,
    #[serde(default)]
    pub after_hash: Option<String>,
    pub write_result: WriteResult,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Written,
    Failed,
    Skipped,
}

/// Content hash used for `before_hash`/`after_hash` (SHA-256, hex).
pub fn content_hash(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Structured event appended to a run's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub event_id: u64,
    pub kind: String,
    pub stage: String,
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub status: EventStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub iteration: u64,
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub parent_action_id: Option<String>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Queued,
    Running,
    Completed,
    Failed,
    WaitingUser,
    Blocked,
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_actions_cover_writes_and_terminals() {
        assert!(ActionType::CreateFile.is_critical());
        assert!(ActionType::FinalAnswer.is_critical());
        assert!(!ActionType::ReadFiles.is_critical());
    }

    #[test]
    fn suspending_actions_are_ask_user_and_approval_only() {
        assert!(ActionType::AskUser.suspends_run());
        assert!(ActionType::RequestApproval.suspends_run());
        assert!(!ActionType::RunCommand.suspends_run());
    }

    #[test]
    fn content_hash_is_stable() {
        let a = content_hash(b"hello");
        let b = content_hash(b"hello");
        assert_eq!(a, b);
        assert_ne!(a, content_hash(b"hellp"));
    }

    #[test]
    fn action_type_roundtrips_through_json() {
        let json = serde_json::to_string(&ActionType::RunCommand).unwrap();
        assert_eq!(json, "\"run_command\"");
        let back: ActionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActionType::RunCommand);
    }
}
