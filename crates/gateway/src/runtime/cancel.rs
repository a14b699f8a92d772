//! Per-run cancellation: a master token per run, with action-scoped child
//! tokens derived from it so cancelling the run aborts every in-flight
//! tool execution without a separate registry of "children" to keep in
//! sync.
//!
//! Built on `tokio_util::sync::CancellationToken`, which gives
//! child-token cascading for free and is the token type the `tools`
//! crate's `dispatch()` already expects.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tracks one master cancellation token per active run.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a fresh master token for a run.
    pub fn register(&self, run_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.lock().insert(run_id, token.clone());
        token
    }

    /// Fetch the run's master token, if it is still registered.
    pub fn get(&self, run_id: Uuid) -> Option<CancellationToken> {
        self.tokens.lock().get(&run_id).cloned()
    }

    /// Derive an action-scoped child token for a run. Registers a fresh
    /// master token first if the run has none yet (defensive — normal
    /// flow always registers at `create_run`).
    pub fn child_token(&self, run_id: Uuid) -> CancellationToken {
        let mut tokens = self.tokens.lock();
        tokens.entry(run_id).or_insert_with(CancellationToken::new).child_token()
    }

    /// Cancel a run's master token, which cascades to every child token
    /// already handed out for its in-flight actions.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.tokens.lock().get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a run's token once it reaches a terminal state.
    pub fn remove(&self, run_id: Uuid) {
        self.tokens.lock().remove(&run_id);
    }

    pub fn is_registered(&self, run_id: Uuid) -> bool {
        self.tokens.lock().contains_key(&run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_cancel() {
        let map = CancelMap::new();
        let id = Uuid::new_v4();
        let token = map.register(id);
        assert!(!token.is_cancelled());
        assert!(map.cancel(id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_cascades_to_child_tokens() {
        let map = CancelMap::new();
        let id = Uuid::new_v4();
        map.register(id);
        let child = map.child_token(id);
        assert!(!child.is_cancelled());
        map.cancel(id);
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancel_unregistered_run_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel(Uuid::new_v4()));
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        let id = Uuid::new_v4();
        map.register(id);
        map.remove(id);
        map.remove(id);
        assert!(!map.is_registered(id));
    }

    #[test]
    fn child_token_without_prior_register_creates_one() {
        let map = CancelMap::new();
        let id = Uuid::new_v4();
        let child = map.child_token(id);
        assert!(map.is_registered(id));
        map.cancel(id);
        assert!(child.is_cancelled());
    }
}
