//! Terminal session surface: persistent interactive shell sessions,
//! independent of the Tool Registry's `run_command` family.
//!
//! Sessions are single-owner (§5): the session id is a capability, and
//! create/close never race because both go through the sessions map's
//! own write lock.
//!
//! This spawns the shell with piped stdio rather than a real PTY — none
//! of the pack's teacher repos carries a PTY crate, so `resize` is
//! recorded but has no effect on the child's line discipline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

const DEFAULT_SHELL: &str = "sh";
const MAX_OUTPUT_CHARS: usize = 512 * 1024;

pub enum StdinMessage {
    Data(Vec<u8>),
    Eof,
}

pub struct OutputBuffer {
    combined: String,
    /// Byte offset up to which `output_since` has already been delivered.
    read_cursor: usize,
}

impl OutputBuffer {
    fn new() -> Self {
        Self { combined: String::new(), read_cursor: 0 }
    }

    fn push(&mut self, text: &str) {
        self.combined.push_str(text);
        if self.combined.len() > MAX_OUTPUT_CHARS {
            let drop_count = self.combined.len() - MAX_OUTPUT_CHARS;
            let mut boundary = drop_count;
            while boundary < self.combined.len() && !self.combined.is_char_boundary(boundary) {
                boundary += 1;
            }
            self.combined.drain(..boundary);
            self.read_cursor = self.read_cursor.saturating_sub(boundary);
        }
    }

    /// Drain and return everything accumulated since the last read.
    fn take_new(&mut self) -> String {
        let new = self.combined[self.read_cursor.min(self.combined.len())..].to_string();
        self.read_cursor = self.combined.len();
        new
    }
}

pub struct TerminalSession {
    pub id: String,
    pub cwd: String,
    pub shell: String,
    pub created_at: DateTime<Utc>,
    pub alive: bool,
    pub exit_code: Option<i32>,
    pub cols: u16,
    pub rows: u16,
    output: OutputBuffer,
    stdin_tx: Option<mpsc::Sender<StdinMessage>>,
    kill_tx: Option<mpsc::Sender<()>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminalSessionInfo {
    pub session_id: String,
    pub cwd: String,
    pub shell: String,
    pub alive: bool,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminalOutput {
    pub session_id: String,
    pub output: String,
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// In-memory registry of live terminal sessions.
#[derive(Default)]
pub struct TerminalManager {
    sessions: RwLock<HashMap<String, Arc<RwLock<TerminalSession>>>>,
}

impl TerminalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new interactive shell rooted at `cwd` (already validated
    /// by the caller to lie within the workspace).
    pub fn create(&self, cwd: String, shell: Option<String>) -> TerminalSessionInfo {
        let shell = shell.unwrap_or_else(|| DEFAULT_SHELL.to_string());
        let id = uuid::Uuid::new_v4().to_string();

        let mut cmd = Command::new(&shell);
        cmd.arg("-i");
        cmd.current_dir(&cwd);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.stdin(std::process::Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return TerminalSessionInfo {
                    session_id: id,
                    cwd,
                    shell,
                    alive: false,
                    output: format!("failed to spawn shell: {e}"),
                };
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<StdinMessage>(32);
        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);

        let session = TerminalSession {
            id: id.clone(),
            cwd: cwd.clone(),
            shell: shell.clone(),
            created_at: Utc::now(),
            alive: true,
            exit_code: None,
            cols: 80,
            rows: 24,
            output: OutputBuffer::new(),
            stdin_tx: Some(stdin_tx),
            kill_tx: Some(kill_tx),
        };

        let arc = Arc::new(RwLock::new(session));
        self.sessions.write().insert(id.clone(), arc.clone());

        tokio::spawn(async move {
            let out_arc = arc.clone();
            let stdout_task = tokio::spawn(async move {
                if let Some(stdout) = stdout {
                    let mut reader = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = reader.next_line().await {
                        let mut s = out_arc.write();
                        s.output.push(&line);
                        s.output.push("\n");
                    }
                }
            });

            let err_arc = arc.clone();
            let stderr_task = tokio::spawn(async move {
                if let Some(stderr) = stderr {
                    let mut reader = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = reader.next_line().await {
                        let mut s = err_arc.write();
                        s.output.push(&line);
                        s.output.push("\n");
                    }
                }
            });

            let stdin_task = tokio::spawn(async move {
                if let Some(mut stdin) = stdin {
                    while let Some(msg) = stdin_rx.recv().await {
                        match msg {
                            StdinMessage::Data(data) => {
                                let _ = stdin.write_all(&data).await;
                                let _ = stdin.flush().await;
                            }
                            StdinMessage::Eof => {
                                drop(stdin);
                                return;
                            }
                        }
                    }
                }
            });

            tokio::select! {
                result = child.wait() => {
                    let _ = stdout_task.await;
                    let _ = stderr_task.await;
                    stdin_task.abort();
                    let mut s = arc.write();
                    s.alive = false;
                    s.exit_code = result.ok().and_then(|st| st.code());
                    s.stdin_tx = None;
                    s.kill_tx = None;
                }
                _ = kill_rx.recv() => {
                    let _ = child.kill().await;
                    let _ = stdout_task.await;
                    let _ = stderr_task.await;
                    stdin_task.abort();
                    let mut s = arc.write();
                    s.alive = false;
                    s.stdin_tx = None;
                    s.kill_tx = None;
                }
            }
        });

        TerminalSessionInfo { session_id: id, cwd, shell, alive: true, output: String::new() }
    }

    fn get(&self, id: &str) -> Option<Arc<RwLock<TerminalSession>>> {
        self.sessions.read().get(id).cloned()
    }

    /// Write bytes to a session's stdin.
    pub async fn input(&self, id: &str, data: Vec<u8>) -> bool {
        let tx = self.get(id).and_then(|s| s.read().stdin_tx.clone());
        match tx {
            Some(tx) => tx.send(StdinMessage::Data(data)).await.is_ok(),
            None => false,
        }
    }

    /// Return output accumulated since the last call to this method.
    pub fn output_since_last_read(&self, id: &str) -> Option<TerminalOutput> {
        let arc = self.get(id)?;
        let mut s = arc.write();
        Some(TerminalOutput {
            session_id: id.to_string(),
            output: s.output.take_new(),
            alive: s.alive,
            exit_code: s.exit_code,
        })
    }

    /// Record a resize request. Has no effect on the underlying process
    /// since sessions are piped, not a PTY.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> bool {
        match self.get(id) {
            Some(arc) => {
                let mut s = arc.write();
                s.cols = cols;
                s.rows = rows;
                true
            }
            None => false,
        }
    }

    /// Kill the session's shell, if still running, and drop it from the
    /// registry.
    pub fn close(&self, id: &str) -> bool {
        let kill_tx = self.get(id).and_then(|s| s.read().kill_tx.clone());
        if let Some(tx) = kill_tx {
            let _ = tx.try_send(());
        }
        self.sessions.write().remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_input_and_read_output_roundtrip() {
        let manager = TerminalManager::new();
        let info = manager.create(".".into(), Some("sh".into()));
        assert!(info.alive);

        manager.input(&info.session_id, b"echo hello\n".to_vec()).await;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let out = manager.output_since_last_read(&info.session_id).unwrap();
        assert!(out.output.contains("hello"), "output was: {}", out.output);

        // A second read with nothing new returns empty output.
        let out2 = manager.output_since_last_read(&info.session_id).unwrap();
        assert!(out2.output.is_empty());
    }

    #[tokio::test]
    async fn resize_updates_recorded_dimensions_and_reports_success() {
        let manager = TerminalManager::new();
        let info = manager.create(".".into(), Some("sh".into()));
        assert!(manager.resize(&info.session_id, 120, 40));
        assert!(!manager.resize("does-not-exist", 80, 24));
    }

    #[tokio::test]
    async fn close_removes_the_session() {
        let manager = TerminalManager::new();
        let info = manager.create(".".into(), Some("sh".into()));
        assert!(manager.close(&info.session_id));
        assert!(manager.output_since_last_read(&info.session_id).is_none());
    }
}
