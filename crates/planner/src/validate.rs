//! `ActionBatch` validation: schema acceptance beyond what `serde`
//! already enforces, dependency-graph checks, and bound checks. Returns a
//! human-readable error string suitable for feeding straight back into a
//! repair prompt.

use ae_domain::action::{ActionBatch, ActionRecord, ActionStatus, ActionType, DecisionMode};
use std::collections::{HashMap, HashSet};

const MIN_TIMEOUT_SEC: u64 = 1;
const MAX_TIMEOUT_SEC: u64 = 600;
const MIN_PRIORITY: i32 = -100;
const MAX_PRIORITY: i32 = 100;

pub fn validate_batch(batch: &ActionBatch, completed_ids: &HashSet<String>) -> Result<(), String> {
    if batch.version == 0 {
        return Err("version must be present and non-zero".into());
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for action in &batch.actions {
        if action.id.is_empty() {
            return Err("every action must have a non-empty id".into());
        }
        if !seen_ids.insert(action.id.as_str()) {
            return Err(format!("duplicate action id in batch: {}", action.id));
        }
        if action.timeout_sec < MIN_TIMEOUT_SEC || action.timeout_sec > MAX_TIMEOUT_SEC {
            return Err(format!(
                "action {} timeout_sec {} out of bounds [{}, {}]",
                action.id, action.timeout_sec, MIN_TIMEOUT_SEC, MAX_TIMEOUT_SEC
            ));
        }
        if action.priority < MIN_PRIORITY || action.priority > MAX_PRIORITY {
            return Err(format!(
                "action {} priority {} out of bounds [{}, {}]",
                action.id, action.priority, MIN_PRIORITY, MAX_PRIORITY
            ));
        }
    }

    for action in &batch.actions {
        for dep in &action.depends_on {
            if dep == &action.id {
                return Err(format!("action {} depends on itself", action.id));
            }
            if !seen_ids.contains(dep.as_str()) && !completed_ids.contains(dep) {
                return Err(format!(
                    "action {} depends_on unknown id {dep} (not in this batch or completed records)",
                    action.id
                ));
            }
        }
    }

    check_no_cycles(&batch.actions)?;

    match batch.decision.mode {
        DecisionMode::Done => {
            let has_final = batch.actions.iter().any(|a| a.action_type == ActionType::FinalAnswer);
            if !has_final && !completed_ids.iter().any(|id| id.starts_with("final:")) {
                return Err("decision.mode=done requires a final_answer action in this batch \
                             or a previously completed one"
                    .into());
            }
        }
        DecisionMode::AskUser => {
            let has_ask = batch
                .actions
                .iter()
                .any(|a| matches!(a.action_type, ActionType::AskUser | ActionType::RequestApproval));
            if !has_ask {
                return Err(
                    "decision.mode=ask_user requires an ask_user or request_approval action".into()
                );
            }
            if !batch.decision.needs_user_trigger {
                return Err("decision.mode=ask_user must set needs_user_trigger=true".into());
            }
        }
        DecisionMode::Continue | DecisionMode::Blocked => {}
    }

    Ok(())
}

/// Mark `final:<id>` sentinels in the completed-id set so a `done`
/// decision can reference a `final_answer` from a prior tick without the
/// planner needing to repeat it. Callers build this set from the run's
/// `action_history`.
pub fn completed_ids(history: &[ActionRecord]) -> HashSet<String> {
    let mut ids: HashSet<String> = HashSet::new();
    for record in history {
        if record.status != ActionStatus::Completed {
            continue;
        }
        ids.insert(record.action_id.clone());
        if record.action_type == ActionType::FinalAnswer {
            ids.insert(format!("final:{}", record.action_id));
        }
    }
    ids
}

fn check_no_cycles(actions: &[ae_domain::action::ActionSpec]) -> Result<(), String> {
    let index: HashMap<&str, usize> = actions.iter().enumerate().map(|(i, a)| (a.id.as_str(), i)).collect();
    let mut state = vec![0u8; actions.len()]; // 0=unvisited 1=in-progress 2=done

    fn visit(
        i: usize,
        actions: &[ae_domain::action::ActionSpec],
        index: &HashMap<&str, usize>,
        state: &mut Vec<u8>,
    ) -> Result<(), String> {
        match state[i] {
            1 => return Err(format!("dependency cycle detected at action {}", actions[i].id)),
            2 => return Ok(()),
            _ => {}
        }
        state[i] = 1;
        for dep in &actions[i].depends_on {
            if let Some(&j) = index.get(dep.as_str()) {
                visit(j, actions, index, state)?;
            }
        }
        state[i] = 2;
        Ok(())
    }

    for i in 0..actions.len() {
        visit(i, actions, &index, &mut state)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_domain::action::{ActionSpec, Decision};

    fn action(id: &str, action_type: ActionType, depends_on: &[&str]) -> ActionSpec {
        ActionSpec {
            id: id.into(),
            action_type,
            title: "t".into(),
            reason: String::new(),
            input: serde_json::json!({}),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            can_parallel: false,
            priority: 0,
            timeout_sec: 30,
            max_retries: 2,
            success_criteria: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    fn batch(mode: DecisionMode, actions: Vec<ActionSpec>) -> ActionBatch {
        ActionBatch {
            version: 1,
            iteration: 0,
            summary: String::new(),
            decision: Decision { mode, reason: None, needs_user_trigger: mode == DecisionMode::AskUser, satisfaction_score: None },
            actions,
            acceptance: Vec::new(),
            risks: Vec::new(),
            next_questions: Vec::new(),
        }
    }

    #[test]
    fn accepts_a_simple_continue_batch() {
        let b = batch(DecisionMode::Continue, vec![action("a1", ActionType::ReadFiles, &[])]);
        assert!(validate_batch(&b, &HashSet::new()).is_ok());
    }

    #[test]
    fn rejects_zero_version() {
        let mut b = batch(DecisionMode::Continue, vec![action("a1", ActionType::ReadFiles, &[])]);
        b.version = 0;
        assert!(validate_batch(&b, &HashSet::new()).is_err());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let b = batch(DecisionMode::Continue, vec![action("a1", ActionType::ReadFiles, &["ghost"])]);
        assert!(validate_batch(&b, &HashSet::new()).is_err());
    }

    #[test]
    fn accepts_dependency_on_a_completed_prior_record() {
        let b = batch(DecisionMode::Continue, vec![action("a2", ActionType::ReadFiles, &["a1"])]);
        let mut completed = HashSet::new();
        completed.insert("a1".to_string());
        assert!(validate_batch(&b, &completed).is_ok());
    }

    #[test]
    fn rejects_a_dependency_cycle() {
        let b = batch(
            DecisionMode::Continue,
            vec![action("a1", ActionType::ReadFiles, &["a2"]), action("a2", ActionType::ReadFiles, &["a1"])],
        );
        let err = validate_batch(&b, &HashSet::new()).unwrap_err();
        assert!(err.contains("cycle"));
    }

    #[test]
    fn done_without_final_answer_is_rejected() {
        let b = batch(DecisionMode::Done, vec![action("a1", ActionType::ReadFiles, &[])]);
        assert!(validate_batch(&b, &HashSet::new()).is_err());
    }

    #[test]
    fn done_with_final_answer_in_batch_is_accepted() {
        let b = batch(DecisionMode::Done, vec![action("a1", ActionType::FinalAnswer, &[])]);
        assert!(validate_batch(&b, &HashSet::new()).is_ok());
    }

    #[test]
    fn ask_user_requires_needs_user_trigger() {
        let mut b = batch(DecisionMode::AskUser, vec![action("a1", ActionType::AskUser, &[])]);
        b.decision.needs_user_trigger = false;
        assert!(validate_batch(&b, &HashSet::new()).is_err());
    }

    #[test]
    fn timeout_out_of_bounds_is_rejected() {
        let mut a = action("a1", ActionType::ReadFiles, &[]);
        a.timeout_sec = 0;
        let b = batch(DecisionMode::Continue, vec![a]);
        assert!(validate_batch(&b, &HashSet::new()).is_err());
    }

    #[test]
    fn completed_ids_includes_final_sentinel() {
        let history = vec![ActionRecord {
            iteration: 0,
            action_id: "a1".into(),
            action_type: ActionType::FinalAnswer,
            status: ActionStatus::Completed,
            input: serde_json::json!({}),
            output: None,
            artifacts: Vec::new(),
            error: None,
            attempts: 1,
        }];
        let ids = completed_ids(&history);
        assert!(ids.contains("a1"));
        assert!(ids.contains("final:a1"));
    }
}
