//! Run Registry storage: `{run_id → Run}`, a bounded in-memory ring
//! buffer with an O(1) index, guarded by per-run locks.
//!
//! A `VecDeque<Arc<RunHandle>>` plus a `HashMap<Uuid, usize>` index with a
//! logical `base_seq` offset means eviction never requires reindexing the
//! whole map. Control-plane operations
//! (`start`/`continue`/`reply`/`pause`/`resume`/`cancel`) live in
//! `runtime::executor`, since they need the provider registry, tool
//! dispatch, and cancel map alongside the registry itself; this module
//! only owns storage and per-run locking.
//!
//! `ae_domain::run::Run` holds `ControlFlags` with atomics and is not
//! `Clone`, so each run lives behind its own `parking_lot::RwLock` rather
//! than being copied in and out of the ring.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ae_domain::run::Run;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Runs kept in memory at once before the oldest is evicted regardless of
/// status — a safety valve against unbounded growth.
const MAX_RUNS_IN_MEMORY: usize = 2000;

/// Emitted on the run's broadcast channel whenever an `ExecutionEvent` is
/// appended. Internal-only (sweeper, tests) — the HTTP surface is
/// poll-only per the no-streaming non-goal.
#[derive(Debug, Clone, Copy)]
pub struct RunEventNotice {
    pub run_id: Uuid,
    pub event_id: u64,
}

/// A run plus its own lock and notification channel.
pub struct RunHandle {
    pub run: RwLock<Run>,
    notify: broadcast::Sender<RunEventNotice>,
}

impl RunHandle {
    fn new(run: Run) -> Self {
        let (notify, _rx) = broadcast::channel(128);
        Self { run: RwLock::new(run), notify }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEventNotice> {
        self.notify.subscribe()
    }

    pub fn notify(&self, event_id: u64) {
        let run_id = self.run.read().run_id;
        let _ = self.notify.send(RunEventNotice { run_id, event_id });
    }
}

struct Inner {
    runs: VecDeque<Arc<RunHandle>>,
    index: HashMap<Uuid, usize>,
    /// Logical sequence number of the front element.
    base_seq: usize,
}

impl Inner {
    fn new() -> Self {
        Self { runs: VecDeque::new(), index: HashMap::new(), base_seq: 0 }
    }

    fn deque_idx(&self, seq: usize) -> usize {
        seq - self.base_seq
    }

    fn get(&self, run_id: Uuid) -> Option<Arc<RunHandle>> {
        let seq = *self.index.get(&run_id)?;
        self.runs.get(self.deque_idx(seq)).cloned()
    }

    fn push_back(&mut self, run_id: Uuid, handle: Arc<RunHandle>) {
        let seq = self.base_seq + self.runs.len();
        self.index.insert(run_id, seq);
        self.runs.push_back(handle);
    }

    fn pop_front(&mut self) -> Option<Arc<RunHandle>> {
        let handle = self.runs.pop_front()?;
        let id = handle.run.read().run_id;
        self.index.remove(&id);
        self.base_seq += 1;
        Some(handle)
    }

    /// Remove an arbitrary run (not necessarily the oldest). Used by the
    /// TTL sweeper, which targets terminal runs regardless of position in
    /// the ring. O(n) in the distance to the tail — acceptable at the
    /// registry's bounded size.
    fn remove(&mut self, run_id: Uuid) -> bool {
        let Some(&seq) = self.index.get(&run_id) else {
            return false;
        };
        let idx = self.deque_idx(seq);
        self.runs.remove(idx);
        self.index.remove(&run_id);
        for (i, handle) in self.runs.iter().enumerate().skip(idx) {
            let id = handle.run.read().run_id;
            self.index.insert(id, self.base_seq + i);
        }
        true
    }
}

/// Owns every run known to this process. Bounded; never persisted — the
/// audit log is write-only, not a recovery source, so a restart starts
/// with an empty registry.
pub struct RunRegistry {
    inner: RwLock<Inner>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::new()) }
    }

    /// Register a freshly created run and return its handle.
    pub fn insert(&self, run: Run) -> Arc<RunHandle> {
        let run_id = run.run_id;
        let handle = Arc::new(RunHandle::new(run));
        let mut inner = self.inner.write();
        inner.push_back(run_id, handle.clone());
        if inner.runs.len() > MAX_RUNS_IN_MEMORY {
            inner.pop_front();
        }
        handle
    }

    pub fn get(&self, run_id: Uuid) -> Option<Arc<RunHandle>> {
        self.inner.read().get(run_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict terminal runs whose `finished_at` is older than `ttl`.
    /// Returns the number of runs evicted.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = chrono::Utc::now();
        let expired: Vec<Uuid> = {
            let inner = self.inner.read();
            inner
                .runs
                .iter()
                .filter_map(|h| {
                    let r = h.run.read();
                    if !r.status.is_terminal() {
                        return None;
                    }
                    let finished = r.finished_at?;
                    let age_sec = now.signed_duration_since(finished).num_seconds();
                    (age_sec >= 0 && age_sec as u64 >= ttl.as_secs()).then_some(r.run_id)
                })
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut inner = self.inner.write();
        for id in &expired {
            inner.remove(*id);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_domain::run::{HistoryConfig, RunStatus};

    fn history_config() -> HistoryConfig {
        HistoryConfig { turns: 20, max_chars_per_message: 4000, summary_enabled: true, summary_max_chars: 2000 }
    }

    fn new_run() -> Run {
        Run::new("do something", "openai", history_config(), false)
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let registry = RunRegistry::new();
        let run = new_run();
        let id = run.run_id;
        registry.insert(run);

        let handle = registry.get(id).unwrap();
        assert_eq!(handle.run.read().run_id, id);
    }

    #[test]
    fn get_unknown_run_returns_none() {
        let registry = RunRegistry::new();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let registry = RunRegistry::new();
        let mut first_id = None;
        for i in 0..(MAX_RUNS_IN_MEMORY + 5) {
            let run = Run::new(format!("intent {i}"), "openai", history_config(), false);
            if i == 0 {
                first_id = Some(run.run_id);
            }
            registry.insert(run);
        }
        assert_eq!(registry.len(), MAX_RUNS_IN_MEMORY);
        assert!(registry.get(first_id.unwrap()).is_none());
    }

    #[test]
    fn sweep_expired_removes_terminal_runs_past_ttl() {
        let registry = RunRegistry::new();
        let mut run = new_run();
        run.transition(RunStatus::Completed);
        run.finished_at = Some(chrono::Utc::now() - chrono::Duration::seconds(120));
        let id = run.run_id;
        registry.insert(run);

        let evicted = registry.sweep_expired(Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn sweep_expired_keeps_running_runs() {
        let registry = RunRegistry::new();
        let run = new_run();
        let id = run.run_id;
        registry.insert(run);

        let evicted = registry.sweep_expired(Duration::from_secs(0));
        assert_eq!(evicted, 0);
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn sweep_expired_keeps_runs_within_ttl() {
        let registry = RunRegistry::new();
        let mut run = new_run();
        run.transition(RunStatus::Completed);
        let id = run.run_id;
        registry.insert(run);

        let evicted = registry.sweep_expired(Duration::from_secs(3600));
        assert_eq!(evicted, 0);
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn notify_broadcasts_to_subscribers() {
        let registry = RunRegistry::new();
        let run = new_run();
        let id = run.run_id;
        let handle = registry.insert(run);
        let mut rx = handle.subscribe();

        handle.notify(3);
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.run_id, id);
        assert_eq!(notice.event_id, 3);
    }

    #[test]
    fn remove_reindexes_remaining_runs() {
        let registry = RunRegistry::new();
        let a = new_run();
        let b = new_run();
        let c = new_run();
        let (id_a, id_b, id_c) = (a.run_id, b.run_id, c.run_id);
        registry.insert(a);
        let mut middle = b;
        middle.transition(RunStatus::Failed);
        middle.finished_at = Some(chrono::Utc::now() - chrono::Duration::seconds(120));
        registry.insert(middle);
        registry.insert(c);

        let evicted = registry.sweep_expired(Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert!(registry.get(id_a).is_some());
        assert!(registry.get(id_b).is_none());
        assert!(registry.get(id_c).is_some());
    }
}
