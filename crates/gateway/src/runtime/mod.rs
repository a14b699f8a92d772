//! Run Registry & Control Plane: storage, per-run cancellation, the
//! tick-driven executor, and the TTL sweeper.

pub mod cancel;
pub mod executor;
pub mod registry;
pub mod sweeper;
