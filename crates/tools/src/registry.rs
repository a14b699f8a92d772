//! Tool Registry dispatch: maps a planner-emitted
//! `ActionSpec` onto the concrete tool implementation for its
//! `ActionType`, enforcing the action's `timeout_sec` uniformly via
//! cancellation regardless of which tool runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ae_domain::action::{ActionSpec, ActionType};
use ae_domain::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::analysis;
use crate::exec;
use crate::file_ops::{self, ScanWorkspaceRequest};

/// Run one action to completion (or timeout/cancellation), returning its
/// pure-data output. `cancel` is the action-scoped token; the caller
/// derives it from the run's master token.
pub async fn dispatch(workspace_root: &Path, action: &ActionSpec, cancel: CancellationToken) -> Result<Value> {
    let timeout = Duration::from_secs(action.timeout_sec);
    tokio::select! {
        result = execute(workspace_root, action, cancel.child_token()) => result,
        _ = cancel.cancelled() => Err(Error::ToolCancelled),
        _ = tokio::time::sleep(timeout) => Err(Error::ToolTimeout(action.timeout_sec)),
    }
}

fn input_as<T: for<'de> Deserialize<'de>>(action: &ActionSpec) -> Result<T> {
    serde_json::from_value(action.input.clone())
        .map_err(|e| Error::ToolInvalidInput(format!("{:?} input: {e}", action.action_type)))
}

async fn execute(workspace_root: &Path, action: &ActionSpec, cancel: CancellationToken) -> Result<Value> {
    match action.action_type {
        ActionType::ScanWorkspace => {
            let req: ScanWorkspaceRequest = if action.input.is_null() {
                ScanWorkspaceRequest::default()
            } else {
                input_as(action)?
            };
            let files = file_ops::scan_workspace(workspace_root, &req).await?;
            Ok(json!({ "file_count": files.len(), "files": files }))
        }

        ActionType::ReadFiles => {
            #[derive(Deserialize)]
            struct Req {
                paths: Vec<String>,
            }
            let req: Req = input_as(action)?;
            let files = file_ops::read_files(workspace_root, &req.paths).await;
            Ok(json!({ "files": files }))
        }

        ActionType::SearchCode => {
            #[derive(Deserialize)]
            struct Req {
                query: String,
                #[serde(default = "default_root")]
                root: String,
                #[serde(default = "default_max_matches")]
                max_matches: usize,
            }
            let req: Req = input_as(action)?;
            let matches = analysis::search_code(workspace_root, &req.query, &req.root, req.max_matches).await?;
            Ok(json!({ "query": req.query, "matches": matches }))
        }

        ActionType::ExtractSymbols => {
            #[derive(Deserialize)]
            struct Req {
                path: String,
            }
            let req: Req = input_as(action)?;
            let symbols = analysis::extract_symbols(workspace_root, &req.path).await?;
            Ok(json!({ "symbols": symbols }))
        }

        ActionType::AnalyzeDependencies => {
            #[derive(Deserialize)]
            struct Req {
                path: String,
            }
            let req: Req = input_as(action)?;
            let dependencies = analysis::analyze_dependencies(workspace_root, &req.path).await?;
            Ok(json!({ "path": req.path, "dependencies": dependencies }))
        }

        // Free-form actions with no workspace side effects: the planner
        // supplies whatever shape it wants summarized or proposed, and
        // the registry simply echoes it back under the documented key.
        ActionType::SummarizeContext => Ok(json!({ "summary": action.input })),
        ActionType::ProposeSubplan => Ok(json!({ "plan": action.input })),

        ActionType::CreateFile | ActionType::UpdateFile => {
            #[derive(Deserialize)]
            struct Req {
                path: String,
                content: String,
            }
            let req: Req = input_as(action)?;
            let change = file_ops::write_file(workspace_root, &req.path, &req.content).await;
            Ok(serde_json::to_value(change)?)
        }

        ActionType::DeleteFile => {
            #[derive(Deserialize)]
            struct Req {
                path: String,
            }
            let req: Req = input_as(action)?;
            let change = file_ops::delete_file(workspace_root, &req.path).await;
            Ok(serde_json::to_value(change)?)
        }

        ActionType::MoveFile => {
            #[derive(Deserialize)]
            struct Req {
                from: String,
                to: String,
            }
            let req: Req = input_as(action)?;
            let change = file_ops::move_file(workspace_root, &req.from, &req.to).await;
            Ok(serde_json::to_value(change)?)
        }

        ActionType::ApplyPatch => {
            #[derive(Deserialize)]
            struct Req {
                path: String,
                diff_unified: String,
            }
            let req: Req = input_as(action)?;
            let change = file_ops::apply_patch(workspace_root, &req.path, &req.diff_unified).await;
            Ok(serde_json::to_value(change)?)
        }

        ActionType::RunCommand | ActionType::RunTests | ActionType::RunLint | ActionType::RunBuild => {
            #[derive(Deserialize)]
            struct Req {
                command: String,
                #[serde(default = "default_root")]
                cwd: String,
                timeout_sec: Option<u64>,
            }
            let req: Req = input_as(action)?;
            let cwd: PathBuf = file_ops::validate_path(workspace_root, &req.cwd)?;
            let timeout = Duration::from_secs(req.timeout_sec.unwrap_or(action.timeout_sec));
            let outcome = exec::run_command(&req.command, &cwd, timeout, cancel).await?;
            Ok(serde_json::to_value(outcome)?)
        }

        ActionType::ValidateResult => {
            #[derive(Deserialize)]
            struct Req {
                criteria: Vec<String>,
                evidence: Value,
            }
            let req: Req = input_as(action)?;
            let evidence_text = req.evidence.to_string();
            let failures: Vec<String> =
                req.criteria.into_iter().filter(|c| !evidence_text.contains(c.as_str())).collect();
            Ok(json!({ "passed": failures.is_empty(), "failures": failures }))
        }

        ActionType::AskUser => {
            #[derive(Deserialize)]
            struct Req {
                question: String,
            }
            let req: Req = input_as(action)?;
            Ok(json!({ "question": req.question }))
        }

        ActionType::RequestApproval => {
            #[derive(Deserialize)]
            struct Req {
                prompt: String,
                action_summary: String,
            }
            let req: Req = input_as(action)?;
            // `approved` is filled in by the run executor once the run
            // resumes from `waiting_user`, not by this dispatch.
            Ok(json!({ "prompt": req.prompt, "action_summary": req.action_summary, "approved": Value::Null }))
        }

        ActionType::FinalAnswer | ActionType::ReportBlocker => Ok(action.input.clone()),
    }
}

fn default_root() -> String {
    ".".into()
}
fn default_max_matches() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_domain::action::ActionSpec;
    use tempfile::TempDir;

    fn spec(action_type: ActionType, input: Value) -> ActionSpec {
        ActionSpec {
            id: "a1".into(),
            action_type,
            title: "t".into(),
            reason: String::new(),
            input,
            depends_on: Vec::new(),
            can_parallel: false,
            priority: 0,
            timeout_sec: 5,
            max_retries: 0,
            success_criteria: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_file_writes_and_returns_file_change() {
        let ws = TempDir::new().unwrap();
        let action = spec(ActionType::CreateFile, json!({"path": "out.txt", "content": "hi"}));
        let result = dispatch(ws.path(), &action, CancellationToken::new()).await.unwrap();
        assert_eq!(result["write_result"], "written");
        assert!(ws.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn run_command_dispatches_to_exec() {
        let ws = TempDir::new().unwrap();
        let action = spec(ActionType::RunCommand, json!({"command": "echo hi"}));
        let result = dispatch(ws.path(), &action, CancellationToken::new()).await.unwrap();
        assert_eq!(result["exit_code"], 0);
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "hi");
    }

    #[tokio::test]
    async fn invalid_input_is_tool_invalid_input() {
        let ws = TempDir::new().unwrap();
        let action = spec(ActionType::CreateFile, json!({"path": "out.txt"}));
        let err = dispatch(ws.path(), &action, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::ToolInvalidInput(_)));
    }

    #[tokio::test]
    async fn timeout_sec_is_enforced_regardless_of_tool() {
        let ws = TempDir::new().unwrap();
        let mut action = spec(ActionType::RunCommand, json!({"command": "sleep 5"}));
        action.timeout_sec = 1;
        let err = dispatch(ws.path(), &action, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::ToolTimeout(_)));
    }

    #[tokio::test]
    async fn validate_result_reports_missing_criteria() {
        let ws = TempDir::new().unwrap();
        let action = spec(
            ActionType::ValidateResult,
            json!({"criteria": ["tests pass", "no warnings"], "evidence": "tests pass"}),
        );
        let result = dispatch(ws.path(), &action, CancellationToken::new()).await.unwrap();
        assert_eq!(result["passed"], false);
        assert_eq!(result["failures"].as_array().unwrap().len(), 1);
    }
}
