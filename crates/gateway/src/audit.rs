//! Append-only JSONL audit log: the transcript of committed messages and
//! run events is additionally appended to a JSONL audit log on disk, one
//! file per run, opened in append mode, one JSON object per line. Never
//! read back by the engine itself — it is write-only, for operator
//! inspection.

use std::io::Write;
use std::path::{Path, PathBuf};

use ae_domain::action::ExecutionEvent;
use ae_domain::run::RunMessage;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AuditLine<'a> {
    Message { timestamp: String, run_id: Uuid, message: &'a RunMessage },
    Event { timestamp: String, run_id: Uuid, event: &'a ExecutionEvent },
}

pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(error = %e, dir = %dir.display(), "could not create audit log directory");
        }
        Self { dir }
    }

    fn append_line(&self, run_id: Uuid, line: &impl Serialize) {
        let path = self.dir.join(format!("{run_id}.jsonl"));
        let json = match serde_json::to_string(line) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize audit line");
                return;
            }
        };
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{json}"));
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "failed to append audit line");
        }
    }

    pub fn record_message(&self, run_id: Uuid, message: &RunMessage) {
        self.append_line(
            run_id,
            &AuditLine::Message { timestamp: Utc::now().to_rfc3339(), run_id, message },
        );
    }

    pub fn record_event(&self, run_id: Uuid, event: &ExecutionEvent) {
        self.append_line(run_id, &AuditLine::Event { timestamp: Utc::now().to_rfc3339(), run_id, event });
    }

    pub fn path_for(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.jsonl"))
    }
}

pub fn default_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".agent-engine").join("audit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_domain::action::{EventStatus, ExecutionEvent};
    use ae_domain::tool::Message;

    #[test]
    fn record_message_appends_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        let run_id = Uuid::new_v4();
        let msg = RunMessage { message: Message::user("hi"), snippets: Vec::new(), chat_only: false };
        log.record_message(run_id, &msg);

        let content = std::fs::read_to_string(log.path_for(run_id)).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"kind\":\"message\""));
    }

    #[test]
    fn record_event_appends_and_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        let run_id = Uuid::new_v4();
        let event = ExecutionEvent {
            event_id: 0,
            kind: "action".into(),
            stage: "execute".into(),
            title: "read_files".into(),
            detail: None,
            status: EventStatus::Completed,
            timestamp: Utc::now(),
            iteration: 0,
            action_id: Some("a1".into()),
            parent_action_id: None,
            input: None,
            output: None,
            metrics: None,
            artifacts: Vec::new(),
            error: None,
            data: Default::default(),
        };
        log.record_event(run_id, &event);
        log.record_event(run_id, &event);

        let content = std::fs::read_to_string(log.path_for(run_id)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn each_run_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let msg = RunMessage { message: Message::user("hi"), snippets: Vec::new(), chat_only: false };
        log.record_message(a, &msg);
        assert!(log.path_for(a).exists());
        assert!(!log.path_for(b).exists());
    }
}
