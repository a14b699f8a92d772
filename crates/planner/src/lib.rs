//! The Planner: turns `(intent, messages, action_history, last_batch)`
//! into the next `ActionBatch` by prompting the model for a single JSON
//! object and validating the result, with a bounded error-repair retry
//! loop.

pub mod prompt;
pub mod validate;

use ae_domain::action::{ActionBatch, ActionRecord};
use ae_domain::error::{Error, Result};
use ae_domain::tool::Message;
use ae_providers::{ChatRequest, LlmProvider, ResponseFormat};
use std::time::Instant;
use tracing::Instrument;

/// Number of repair attempts after the initial call before the run is
/// marked failed.
const MAX_REPAIR_ATTEMPTS: u32 = 2;

/// `response_format=json_object`, `temperature` low.
const PLANNER_TEMPERATURE: f32 = 0.2;

/// Everything the Run Executor needs to append the planning
/// `ExecutionEvent` without the planner crate depending on
/// `ae_domain::run::Run` directly.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlannerOutcome {
    pub batch: ActionBatch,
    pub provider_id: String,
    pub model: String,
    pub prompt_messages: Vec<Message>,
    pub elapsed_ms: u64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    /// Number of calls made to reach a valid batch (1 = no repair needed).
    pub attempts: u32,
}

/// Produce the next `ActionBatch` for a run. `compacted_messages` is the
/// output of `ae_compact::compact` over the run's full message list;
/// `action_history` is the run's executed-action tail (not yet windowed —
/// windowing happens in `prompt::action_history_snapshot`).
#[allow(clippy::too_many_arguments)]
pub async fn plan_next_batch(
    provider: &dyn LlmProvider,
    provider_id: &str,
    intent: &str,
    compacted_messages: &[Message],
    action_history: &[ActionRecord],
    last_batch: Option<&ActionBatch>,
    planning_mode: bool,
) -> Result<PlannerOutcome> {
    let iteration = last_batch.map(|b| b.iteration + 1).unwrap_or(0);
    let completed = validate::completed_ids(action_history);

    let mut messages = prompt::build_messages(planning_mode, intent, compacted_messages, action_history, iteration);

    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_raw = String::new();

    loop {
        attempts += 1;
        let span = tracing::info_span!("planner_call", provider_id, iteration, attempts);
        let response = provider
            .chat(ChatRequest {
                messages: messages.clone(),
                temperature: Some(PLANNER_TEMPERATURE),
                max_tokens: None,
                response_format: ResponseFormat::JsonObject,
                stop: Vec::new(),
                system_prompt_override: None,
                model: None,
            })
            .instrument(span)
            .await?;

        last_raw = response.content.clone();

        match parse_and_validate(&last_raw, &completed, iteration) {
            Ok(batch) => {
                tracing::debug!(provider_id, iteration, attempts, "planner produced a valid batch");
                return Ok(PlannerOutcome {
                    batch,
                    provider_id: provider_id.to_string(),
                    model: response.model,
                    prompt_messages: response.prompt_messages,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    tokens_input: response.usage.input,
                    tokens_output: response.usage.output,
                    attempts,
                });
            }
            Err(validation_error) => {
                if attempts > MAX_REPAIR_ATTEMPTS {
                    tracing::warn!(provider_id, iteration, attempts, error = %validation_error, "planner exhausted repair attempts");
                    return Err(Error::PlannerInvalidOutput(format!(
                        "planner failed validation after {attempts} attempts: {validation_error}"
                    )));
                }
                tracing::warn!(provider_id, iteration, attempts, error = %validation_error, "planner output failed validation, retrying");
                messages.push(Message::assistant(last_raw.clone()));
                messages.push(prompt::repair_message(&last_raw, &validation_error));
            }
        }
    }
}

fn parse_and_validate(
    raw: &str,
    completed: &std::collections::HashSet<String>,
    expected_iteration: u64,
) -> std::result::Result<ActionBatch, String> {
    let mut batch: ActionBatch =
        serde_json::from_str(raw).map_err(|e| format!("not a valid ActionBatch JSON object: {e}"))?;
    // The model is unreliable about echoing the iteration counter back
    // exactly; the executor owns iteration numbering, not the model.
    batch.iteration = expected_iteration;
    validate::validate_batch(&batch, completed)?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_providers::{ChatResponse, Usage, UsageSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        replies: Vec<&'static str>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let content = self.replies[i.min(self.replies.len() - 1)].to_string();
            Ok(ChatResponse {
                content,
                usage: Usage { input: 10, output: 5, total: 15, source: UsageSource::Estimated },
                prompt_messages: req.messages,
                elapsed_ms: 1,
                model: "stub-model".into(),
                finish_reason: Some("stop".into()),
            })
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn default_model(&self) -> &str {
            "stub-model"
        }
    }

    const VALID_BATCH: &str = r#"{
        "version": 1, "iteration": 0, "summary": "read a file",
        "decision": {"mode": "continue", "needs_user_trigger": false},
        "actions": [{"id": "a1", "type": "read_files", "title": "read", "input": {"paths": ["README.md"]},
                     "timeout_sec": 10, "max_retries": 1}]
    }"#;

    #[tokio::test]
    async fn returns_the_first_valid_batch_without_repair() {
        let provider = ScriptedProvider { replies: vec![VALID_BATCH], calls: AtomicU32::new(0) };
        let outcome = plan_next_batch(&provider, "stub", "do something", &[], &[], None, false).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.batch.actions.len(), 1);
    }

    #[tokio::test]
    async fn repairs_once_after_invalid_json_then_succeeds() {
        let provider =
            ScriptedProvider { replies: vec!["not json at all", VALID_BATCH], calls: AtomicU32::new(0) };
        let outcome = plan_next_batch(&provider, "stub", "do something", &[], &[], None, false).await.unwrap();
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn fails_the_run_after_exhausting_repair_attempts() {
        let provider = ScriptedProvider { replies: vec!["garbage"], calls: AtomicU32::new(0) };
        let err = plan_next_batch(&provider, "stub", "do something", &[], &[], None, false).await.unwrap_err();
        assert!(matches!(err, Error::PlannerInvalidOutput(_)));
    }

    #[tokio::test]
    async fn done_without_final_answer_triggers_a_repair_round() {
        let done_no_final = r#"{
            "version": 1, "iteration": 0, "summary": "done",
            "decision": {"mode": "done", "needs_user_trigger": false},
            "actions": []
        }"#;
        let provider = ScriptedProvider {
            replies: vec![done_no_final, VALID_BATCH],
            calls: AtomicU32::new(0),
        };
        let outcome = plan_next_batch(&provider, "stub", "do something", &[], &[], None, false).await.unwrap();
        assert_eq!(outcome.attempts, 2);
    }
}
