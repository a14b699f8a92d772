//! Prompt assembly for the Planner.
//!
//! The planner never uses native tool-calling: the model is asked to
//! return exactly one JSON object matching the `ActionBatch` schema, and
//! the system prompt spells out the closed tool enum by hand.

use ae_domain::action::{ActionRecord, ActionType};
use ae_domain::tool::Message;

/// How many of the most recent action records to show the model. Older
/// records are still available to the executor; the planner only needs
/// enough tail context to decide the next batch.
pub const ACTION_HISTORY_WINDOW: usize = 20;

const ACTION_TYPES: &[ActionType] = &[
    ActionType::ScanWorkspace,
    ActionType::ReadFiles,
    ActionType::SearchCode,
    ActionType::ExtractSymbols,
    ActionType::AnalyzeDependencies,
    ActionType::SummarizeContext,
    ActionType::ProposeSubplan,
    ActionType::CreateFile,
    ActionType::UpdateFile,
    ActionType::DeleteFile,
    ActionType::MoveFile,
    ActionType::ApplyPatch,
    ActionType::RunCommand,
    ActionType::RunTests,
    ActionType::RunLint,
    ActionType::RunBuild,
    ActionType::ValidateResult,
    ActionType::AskUser,
    ActionType::RequestApproval,
    ActionType::FinalAnswer,
    ActionType::ReportBlocker,
];

fn action_type_name(t: ActionType) -> &'static str {
    match t {
        ActionType::ScanWorkspace => "scan_workspace",
        ActionType::ReadFiles => "read_files",
        ActionType::SearchCode => "search_code",
        ActionType::ExtractSymbols => "extract_symbols",
        ActionType::AnalyzeDependencies => "analyze_dependencies",
        ActionType::SummarizeContext => "summarize_context",
        ActionType::ProposeSubplan => "propose_subplan",
        ActionType::CreateFile => "create_file",
        ActionType::UpdateFile => "update_file",
        ActionType::DeleteFile => "delete_file",
        ActionType::MoveFile => "move_file",
        ActionType::ApplyPatch => "apply_patch",
        ActionType::RunCommand => "run_command",
        ActionType::RunTests => "run_tests",
        ActionType::RunLint => "run_lint",
        ActionType::RunBuild => "run_build",
        ActionType::ValidateResult => "validate_result",
        ActionType::AskUser => "ask_user",
        ActionType::RequestApproval => "request_approval",
        ActionType::FinalAnswer => "final_answer",
        ActionType::ReportBlocker => "report_blocker",
    }
}

/// The fixed system prompt: describes the tool enum and the required
/// output shape. Does not change between ticks; only the history and
/// action-record snapshot vary.
pub fn system_prompt(planning_mode: bool) -> String {
    let mut tool_lines = String::new();
    for t in ACTION_TYPES {
        tool_lines.push_str("- ");
        tool_lines.push_str(action_type_name(*t));
        tool_lines.push('\n');
    }

    let mut prompt = format!(
        "You are the planning component of a code-editing agent. On every turn you \
         receive the conversation so far and a record of actions already executed, \
         and you must return exactly one JSON object (no prose, no markdown fences) \
         matching this schema:\n\n\
         {{\n\
         \x20 \"version\": 1,\n\
         \x20 \"iteration\": <integer>,\n\
         \x20 \"summary\": \"<one sentence>\",\n\
         \x20 \"decision\": {{\"mode\": \"continue\"|\"ask_user\"|\"done\"|\"blocked\", \"reason\": \"<string>\", \
           \"needs_user_trigger\": <bool>, \"satisfaction_score\": <0..1 or null>}},\n\
         \x20 \"actions\": [{{\"id\": \"<string>\", \"type\": \"<one of the action types below>\", \"title\": \"<string>\", \
           \"reason\": \"<string>\", \"input\": {{...}}, \"depends_on\": [\"<action id>\"], \"can_parallel\": <bool>, \
           \"priority\": <integer>, \"timeout_sec\": <integer>, \"max_retries\": <integer>, \
           \"success_criteria\": [\"<string>\"], \"artifacts\": [\"<string>\"]}}],\n\
         \x20 \"acceptance\": [\"<string>\"],\n\
         \x20 \"risks\": [\"<string>\"],\n\
         \x20 \"next_questions\": [\"<string>\"]\n\
         }}\n\n\
         Available action types (the `type` field accepts only these):\n{tool_lines}\n\
         Rules:\n\
         - Every `depends_on` id must name an action in this same batch or an already-completed action record.\n\
         - A `done` decision requires at least one `final_answer` action in this batch or among completed records.\n\
         - An `ask_user` decision requires at least one `ask_user` or `request_approval` action and must set \
           `needs_user_trigger` to true.\n\
         - `priority` is an integer in [-100, 100]; higher runs first within a parallel frontier.\n\
         - `timeout_sec` is an integer in [1, 600].\n\
         - Keep batches small: prefer a few well-sequenced actions over a large speculative plan.\n"
    );

    if planning_mode {
        prompt.push_str(
            "\nThis run is in planning mode: produce a plan only. Do not emit `create_file`, \
             `update_file`, `delete_file`, `move_file`, `apply_patch`, `run_command`, `run_tests`, \
             `run_lint`, or `run_build` actions. End with a `final_answer` action summarising the \
             plan in prose.\n",
        );
    }

    prompt
}

/// Render the trailing window of action records as a compact JSON array
/// the model can read back.
pub fn action_history_snapshot(history: &[ActionRecord]) -> serde_json::Value {
    let start = history.len().saturating_sub(ACTION_HISTORY_WINDOW);
    serde_json::to_value(&history[start..]).unwrap_or(serde_json::Value::Array(Vec::new()))
}

/// Assemble the full message list for one planner call: system prompt,
/// compacted history (already produced by `ae_compact::compact`), and a
/// final user-role message carrying the action-record snapshot plus the
/// standing instruction to emit the next batch.
pub fn build_messages(
    planning_mode: bool,
    intent: &str,
    compacted_history: &[Message],
    action_history: &[ActionRecord],
    iteration: u64,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(compacted_history.len() + 3);
    messages.push(Message::system(system_prompt(planning_mode)));
    messages.push(Message::user(format!("User intent: {intent}")));
    messages.extend_from_slice(compacted_history);

    let snapshot = action_history_snapshot(action_history);
    messages.push(Message::user(format!(
        "iteration={iteration}\naction_history={snapshot}\n\nReturn the next ActionBatch now."
    )));

    messages
}

/// An error-repair prompt appended after a validation failure. Tells the
/// model exactly what was wrong with its own prior output so the retry
/// can target the defect.
pub fn repair_message(previous_output: &str, validation_error: &str) -> Message {
    Message::user(format!(
        "Your previous response failed validation and could not be used:\n\n{previous_output}\n\n\
         Validation error: {validation_error}\n\n\
         Return a corrected JSON object matching the ActionBatch schema. Output only the JSON object."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_action_type() {
        let p = system_prompt(false);
        assert!(p.contains("scan_workspace"));
        assert!(p.contains("final_answer"));
        assert!(p.contains("request_approval"));
    }

    #[test]
    fn planning_mode_adds_the_no_writes_constraint() {
        let p = system_prompt(true);
        assert!(p.contains("planning mode"));
        assert!(p.contains("create_file"));
    }

    #[test]
    fn action_history_snapshot_keeps_only_the_trailing_window() {
        let history: Vec<ActionRecord> = (0..30)
            .map(|i| ActionRecord {
                iteration: i,
                action_id: format!("a{i}"),
                action_type: ActionType::ReadFiles,
                status: ae_domain::action::ActionStatus::Completed,
                input: serde_json::json!({}),
                output: None,
                artifacts: Vec::new(),
                error: None,
                attempts: 1,
            })
            .collect();
        let snapshot = action_history_snapshot(&history);
        assert_eq!(snapshot.as_array().unwrap().len(), ACTION_HISTORY_WINDOW);
        assert_eq!(snapshot[0]["action_id"], "a10");
    }

    #[test]
    fn build_messages_ends_with_the_action_batch_instruction() {
        let messages = build_messages(false, "fix the bug", &[], &[], 0);
        let last = messages.last().unwrap();
        assert!(last.content.extract_all_text().contains("Return the next ActionBatch now."));
    }
}
