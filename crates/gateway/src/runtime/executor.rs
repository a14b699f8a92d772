//! Run Executor: drives a run from creation to a terminal state, one
//! tick at a time. Non-streaming and poll-driven: callers invoke `tick`
//! (via `continue_run`/`reply_run`/one-shot chat) and read the result
//! back off the `Run` snapshot rather than an event stream.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ae_domain::action::{
    ActionRecord, ActionSpec, ActionStatus, ActionType, DecisionMode, EventStatus, ExecutionEvent, FileChange,
};
use ae_domain::error::{Error, ErrorKind, Result};
use ae_domain::run::{HistoryConfig, Run, RunMessage, RunStatus};
use ae_domain::tool::{Message, Role};
use ae_planner::plan_next_batch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::dto::{AiResponse, ChatMessageDto, HistoryConfigDto, StartRunRequest};
use crate::state::AppState;

/// Falls back to 30s when an action omits `timeout_sec`, distinct from
/// `ae_tools::registry` which enforces whatever `timeout_sec` the planner
/// actually sent.
const DEFAULT_ACTION_TIMEOUT_SEC: u64 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run creation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_intent(req: &StartRunRequest) -> String {
    let last_user = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let mut intent = last_user;
    if let Some(path) = &req.current_file {
        intent.push_str(&format!("\n\n[current_file: {path}]"));
    }
    if let Some(code) = &req.current_code {
        intent.push_str(&format!("\n\n[current_code]\n{code}"));
    }
    intent
}

fn build_messages(req: &StartRunRequest) -> Vec<RunMessage> {
    let mut messages: Vec<RunMessage> = req
        .messages
        .iter()
        .map(|m: &ChatMessageDto| RunMessage { message: m.into(), snippets: Vec::new(), chat_only: req.chat_only })
        .collect();
    if let Some(last) = messages.last_mut() {
        last.snippets = req.snippets.clone();
    }
    messages
}

/// Create a new run from an HTTP request, register its cancel token, and
/// insert it into the registry. Does not tick.
pub fn create_run(state: &AppState, req: StartRunRequest) -> Result<Uuid> {
    let intent = build_intent(&req);
    let history_config: HistoryConfig =
        req.history_config.clone().unwrap_or_else(HistoryConfigDto::default).into();

    let mut run = Run::new(intent, req.provider.clone(), history_config, req.planning_mode);
    run.messages = build_messages(&req);
    for m in &run.messages {
        state.audit.record_message(run.run_id, m);
    }

    let run_id = run.run_id;
    state.cancel_map.register(run_id);
    state.run_registry.insert(run);
    tracing::info!(run_id = %run_id, provider = %req.provider, "run created");
    Ok(run_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Control plane
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One-shot `/ai/chat`: create the run, tick it exactly once, and return
/// the resulting `AiResponse`.
pub async fn one_shot_chat(state: &AppState, req: StartRunRequest) -> Result<AiResponse> {
    let run_id = create_run(state, req)?;
    tick(state, run_id).await?;
    get_response(state, run_id)
}

pub async fn start_run(state: &AppState, req: StartRunRequest) -> Result<Uuid> {
    create_run(state, req)
}

pub fn get_response(state: &AppState, run_id: Uuid) -> Result<AiResponse> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    let run = handle.run.read();
    Ok(AiResponse::from_run(&run))
}

/// `continue_run` is idempotent on terminal runs: returns the latched
/// result without invoking the planner again.
pub async fn continue_run(state: &AppState, run_id: Uuid) -> Result<AiResponse> {
    let is_terminal = {
        let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        let is_terminal = handle.run.read().status.is_terminal();
        is_terminal
    };
    if !is_terminal {
        tick(state, run_id).await?;
    }
    get_response(state, run_id)
}

pub async fn reply_run(state: &AppState, run_id: Uuid, message: String) -> Result<AiResponse> {
    {
        let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        let mut run = handle.run.write();
        if run.status != RunStatus::WaitingUser {
            return Err(Error::RunConflict(format!(
                "run {run_id} is {:?}, expected waiting_user",
                run.status
            )));
        }
        let reply = RunMessage {
            message: Message::user(message.clone()),
            snippets: Vec::new(),
            chat_only: false,
        };
        state.audit.record_message(run_id, &reply);
        run.messages.push(reply);

        for action_id in run.pending_action_ids.clone() {
            if let Some(record) = run.action_history.iter_mut().rev().find(|r| r.action_id == action_id) {
                record.status = ActionStatus::Completed;
                record.output = Some(serde_json::json!({ "reply": message }));
            }
        }
        run.pending_action_ids.clear();
        run.transition(RunStatus::Running);
    }
    tick(state, run_id).await?;
    get_response(state, run_id)
}

pub fn pause_run(state: &AppState, run_id: Uuid) -> Result<AiResponse> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    handle.run.read().controls.request_pause();
    get_response(state, run_id)
}

pub fn resume_run(state: &AppState, run_id: Uuid) -> Result<AiResponse> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    {
        let run = handle.run.read();
        run.controls.clear_pause();
        if run.status == RunStatus::Paused {
            drop(run);
            handle.run.write().transition(RunStatus::Running);
        }
    }
    get_response(state, run_id)
}

pub fn cancel_run(state: &AppState, run_id: Uuid) -> Result<AiResponse> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    handle.run.read().controls.request_cancel();
    state.cancel_map.cancel(run_id);
    get_response(state, run_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tick
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run exactly one tick of the per-run state machine under its lock.
pub async fn tick(state: &AppState, run_id: Uuid) -> Result<()> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    let span = tracing::info_span!("run_tick", run_id = %run_id);
    async {
        // Step 1: cancellation wins over everything else.
        if handle.run.read().controls.is_cancel_requested() {
            let mut run = handle.run.write();
            run.transition(RunStatus::Cancelled);
            push_event(&mut run, state, "finalize", "run cancelled", EventStatus::Info, None);
            state.cancel_map.remove(run_id);
            return Ok(());
        }

        // Step 2: pause, if nothing is in flight (nothing ever is between
        // ticks — the executor never parks a task on `waiting_user`).
        if handle.run.read().controls.is_pause_requested() {
            let mut run = handle.run.write();
            run.transition(RunStatus::Paused);
            return Ok(());
        }

        {
            let mut run = handle.run.write();
            run.transition(RunStatus::Running);
        }

        // Step 3: plan.
        let provider = {
            let run = handle.run.read();
            state.providers.get(&run.provider_id).ok_or_else(|| Error::Config(format!(
                "provider '{}' is not configured",
                run.provider_id
            )))?
        };

        let (compacted, intent, action_history, last_batch, planning_mode, iteration) = {
            let run = handle.run.read();
            let plain: Vec<Message> = run.messages.iter().map(|m| m.message.clone()).collect();
            (
                plain,
                run.intent.clone(),
                run.action_history.clone(),
                run.latest_batch.clone(),
                run.planning_mode,
                run.iteration,
            )
        };

        let mut compaction_cache = ae_compact::summary::SummaryCache::default();
        let compacted = ae_compact::compact(&compacted, &state.config.compaction, &mut compaction_cache, provider.as_ref())
            .await
            .unwrap_or(compacted);

        let outcome = plan_next_batch(
            provider.as_ref(),
            &run_provider_id(&handle),
            &intent,
            &compacted,
            &action_history,
            last_batch.as_ref(),
            planning_mode,
        )
        .await;

        let batch = match outcome {
            Ok(outcome) => {
                let mut run = handle.run.write();
                let event_id = push_event(
                    &mut run,
                    state,
                    "planning",
                    &outcome.batch.summary,
                    EventStatus::Info,
                    None,
                );
                let _ = event_id;
                run.iteration = iteration + 1;
                run.latest_batch = Some(outcome.batch.clone());
                outcome.batch
            }
            Err(e) => {
                let mut run = handle.run.write();
                push_event(&mut run, state, "planning", "planner failed", EventStatus::Failed, Some(e.to_string()));
                run.transition(RunStatus::Failed);
                state.cancel_map.remove(run_id);
                return Err(e);
            }
        };

        execute_batch(state, &handle, run_id, &batch).await?;
        Ok(())
    }
    .instrument(span)
    .await
}

fn run_provider_id(handle: &crate::runtime::registry::RunHandle) -> String {
    handle.run.read().provider_id.clone()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Batch execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Actions whose transient failures are worth retrying at the executor
/// level (separate from the provider adapter's own backoff for
/// `ProviderTimeout`/`ProviderTransport`, which already happens inside
/// the planner's `chat()` call).
fn is_action_error_retryable(e: &Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ToolTimeout | ErrorKind::ToolIo | ErrorKind::ProviderTimeout | ErrorKind::ProviderTransport
    )
}

fn topological_frontiers(actions: &[ActionSpec]) -> std::result::Result<Vec<Vec<ActionSpec>>, String> {
    let mut remaining: HashMap<String, ActionSpec> = actions.iter().map(|a| (a.id.clone(), a.clone())).collect();
    let mut done: HashSet<String> = HashSet::new();
    let mut frontiers = Vec::new();

    while !remaining.is_empty() {
        let mut ready: Vec<ActionSpec> = remaining
            .values()
            .filter(|a| a.depends_on.iter().all(|d| done.contains(d) || !remaining.contains_key(d)))
            .cloned()
            .collect();
        if ready.is_empty() {
            return Err("dependency cycle detected while ordering batch".into());
        }
        ready.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        for a in &ready {
            remaining.remove(&a.id);
            done.insert(a.id.clone());
        }
        frontiers.push(ready);
    }
    Ok(frontiers)
}

async fn execute_batch(
    state: &AppState,
    handle: &Arc<crate::runtime::registry::RunHandle>,
    run_id: Uuid,
    batch: &ae_domain::action::ActionBatch,
) -> Result<()> {
    let frontiers = match topological_frontiers(&batch.actions) {
        Ok(f) => f,
        Err(msg) => {
            let mut run = handle.run.write();
            push_event(&mut run, state, "execute", "batch rejected", EventStatus::Failed, Some(msg.clone()));
            run.transition(RunStatus::Failed);
            state.cancel_map.remove(run_id);
            return Err(Error::PlannerInvalidOutput(msg));
        }
    };

    let mut failed_ids: HashSet<String> = HashSet::new();

    for frontier in frontiers {
        if handle.run.read().controls.is_cancel_requested() {
            break;
        }

        let to_run: Vec<ActionSpec> = frontier
            .iter()
            .filter(|a| {
                let blocked = a.depends_on.iter().any(|d| failed_ids.contains(d));
                if blocked {
                    let mut run = handle.run.write();
                    record_action(
                        &mut run,
                        state,
                        a,
                        ActionStatus::Skipped,
                        None,
                        Some("upstream dependency failed".into()),
                        0,
                    );
                }
                !blocked
            })
            .cloned()
            .collect();

        if to_run.is_empty() {
            continue;
        }

        let all_parallel = to_run.iter().all(|a| a.can_parallel);
        let results = if all_parallel {
            let futures = to_run.iter().map(|a| run_action(state, handle, run_id, a));
            futures_util::future::join_all(futures).await
        } else {
            let mut out = Vec::with_capacity(to_run.len());
            for a in &to_run {
                out.push(run_action(state, handle, run_id, a).await);
            }
            out
        };

        for (action, outcome) in to_run.iter().zip(results.into_iter()) {
            match outcome {
                ActionOutcome::Completed(output) => {
                    let mut run = handle.run.write();
                    if action.action_type.is_mutating() {
                        if let Ok(change) = serde_json::from_value::<FileChange>(output.clone()) {
                            run.result_changes.push(change);
                        }
                    }
                    if action.action_type == ActionType::FinalAnswer {
                        run.result_content =
                            output.get("content").and_then(|v| v.as_str()).map(str::to_string).or_else(|| {
                                output.as_str().map(str::to_string)
                            });
                        run.result_file_path = output.get("file_path").and_then(|v| v.as_str()).map(str::to_string);
                        run.result_file_content =
                            output.get("file_content").and_then(|v| v.as_str()).map(str::to_string);
                    }
                    record_action(&mut run, state, action, ActionStatus::Completed, Some(output), None, 1);
                }
                ActionOutcome::Suspend(output) => {
                    let mut run = handle.run.write();
                    record_action(&mut run, state, action, ActionStatus::Completed, Some(output), None, 1);
                    run.pending_action_ids.push(action.id.clone());
                    run.transition(RunStatus::WaitingUser);
                }
                ActionOutcome::Failed(err, attempts) => {
                    failed_ids.insert(action.id.clone());
                    let mut run = handle.run.write();
                    record_action(
                        &mut run,
                        state,
                        action,
                        ActionStatus::Failed,
                        None,
                        Some(err.to_string()),
                        attempts,
                    );
                    if action.action_type.is_critical() || err.is_fatal_to_run() {
                        run.transition(RunStatus::Failed);
                    }
                }
                ActionOutcome::Cancelled => {
                    failed_ids.insert(action.id.clone());
                    let mut run = handle.run.write();
                    record_action(&mut run, state, action, ActionStatus::Cancelled, None, Some("cancelled".into()), 1);
                    run.transition(RunStatus::Cancelled);
                }
            }
        }

        let status = handle.run.read().status;
        if status.is_terminal() || status == RunStatus::WaitingUser {
            if status.is_terminal() {
                state.cancel_map.remove(run_id);
            }
            return Ok(());
        }
    }

    let status = handle.run.read().status;
    if status == RunStatus::Running {
        let has_final_answer = handle.run.read().result_content.is_some();
        if batch.decision.mode == DecisionMode::Done && has_final_answer {
            handle.run.write().transition(RunStatus::Completed);
            state.cancel_map.remove(run_id);
        } else if matches!(batch.decision.mode, DecisionMode::AskUser | DecisionMode::Blocked) {
            handle.run.write().transition(RunStatus::WaitingUser);
        }
    }

    Ok(())
}

enum ActionOutcome {
    Completed(serde_json::Value),
    Suspend(serde_json::Value),
    Failed(Error, u32),
    Cancelled,
}

async fn run_action(
    state: &AppState,
    handle: &Arc<crate::runtime::registry::RunHandle>,
    run_id: Uuid,
    action: &ActionSpec,
) -> ActionOutcome {
    let mut action = action.clone();
    if action.timeout_sec == 0 {
        action.timeout_sec = DEFAULT_ACTION_TIMEOUT_SEC;
    }

    let max_retries = action.max_retries;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let _permit = state.tool_semaphore.clone().acquire_owned().await;
        let cancel = state.cancel_map.child_token(run_id);
        let span = tracing::info_span!("action", run_id = %run_id, action_id = %action.id, attempts);
        let result = dispatch_action(state, &action, cancel).instrument(span).await;

        match result {
            Ok(output) => {
                if action.action_type.suspends_run() {
                    return ActionOutcome::Suspend(output);
                }
                return ActionOutcome::Completed(output);
            }
            Err(Error::ToolCancelled) => return ActionOutcome::Cancelled,
            Err(e) => {
                if attempts < max_retries.max(1) && is_action_error_retryable(&e) {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempts - 1)).min(Duration::from_secs(4));
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return ActionOutcome::Failed(e, attempts);
            }
        }
    }
}

async fn dispatch_action(state: &AppState, action: &ActionSpec, cancel: CancellationToken) -> Result<serde_json::Value> {
    ae_tools::dispatch(&state.config.workspace.root, action, cancel).await
}

fn record_action(
    run: &mut Run,
    state: &AppState,
    action: &ActionSpec,
    status: ActionStatus,
    output: Option<serde_json::Value>,
    error: Option<String>,
    attempts: u32,
) {
    let record = ActionRecord {
        iteration: run.iteration,
        action_id: action.id.clone(),
        action_type: action.action_type,
        status,
        input: action.input.clone(),
        output,
        artifacts: action.artifacts.clone(),
        error: error.clone().map(|message| ae_domain::action::ActionError { kind: ErrorKind::Other, message }),
        attempts,
    };
    run.action_history.push(record);

    let event_status = match status {
        ActionStatus::Completed => EventStatus::Completed,
        ActionStatus::Failed => EventStatus::Failed,
        ActionStatus::Skipped => EventStatus::Info,
        ActionStatus::Cancelled => EventStatus::Failed,
        ActionStatus::Queued | ActionStatus::Running => EventStatus::Running,
    };
    push_event(run, state, "execute", &action.title, event_status, error);
}

fn push_event(
    run: &mut Run,
    state: &AppState,
    stage: &str,
    title: &str,
    status: EventStatus,
    error: Option<String>,
) -> u64 {
    let event = ExecutionEvent {
        event_id: 0,
        kind: "run".into(),
        stage: stage.into(),
        title: title.into(),
        detail: None,
        status,
        timestamp: chrono::Utc::now(),
        iteration: run.iteration,
        action_id: None,
        parent_action_id: None,
        input: None,
        output: None,
        metrics: None,
        artifacts: Vec::new(),
        error,
        data: Default::default(),
    };
    let id = run.push_event(event.clone());
    state.audit.record_event(run.run_id, &event);
    id
}
