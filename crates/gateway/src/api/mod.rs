pub mod chat;
pub mod dto;
pub mod error;
pub mod files;
pub mod providers;
pub mod runs;
pub mod terminal;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router: the workspace file surface, the `/ai/*`
/// chat and run control plane, and `/terminal/*`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/tree", get(files::tree))
        .route("/files/read", get(files::read))
        .route("/files/write", post(files::write))
        .route("/files/create", post(files::create))
        .route("/files/delete", post(files::delete))
        .route("/files/rename", post(files::rename))
        .route("/ai/providers", get(providers::list))
        .route("/ai/chat", post(chat::chat))
        .route("/ai/runs/start", post(runs::start))
        .route("/ai/runs/:id", get(runs::get))
        .route("/ai/runs/:id/continue", post(runs::continue_run))
        .route("/ai/runs/:id/reply", post(runs::reply))
        .route("/ai/runs/:id/pause", post(runs::pause))
        .route("/ai/runs/:id/resume", post(runs::resume))
        .route("/ai/runs/:id/cancel", post(runs::cancel))
        .route("/terminal/sessions", post(terminal::create))
        .route("/terminal/sessions/:id/input", post(terminal::input))
        .route("/terminal/sessions/:id/output", get(terminal::output))
        .route("/terminal/sessions/:id/resize", post(terminal::resize))
        .route("/terminal/sessions/:id", delete(terminal::close))
}
