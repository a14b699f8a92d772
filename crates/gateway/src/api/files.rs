//! Workspace file surface: `GET /files/tree`, `GET /files/read`,
//! `POST /files/write|create|delete|rename`. Thin HTTP wrappers over
//! `ae_tools::file_ops` — path validation and the actual filesystem work
//! both live there.

use crate::api::error::ApiError;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

pub async fn tree(State(state): State<AppState>, Query(req): Query<TreeQuery>) -> Result<impl IntoResponse, ApiError> {
    let scan_req = ae_tools::file_ops::ScanWorkspaceRequest {
        root: req.path.unwrap_or_else(|| ".".to_string()),
        ..Default::default()
    };
    let files = ae_tools::file_ops::scan_workspace(&state.workspace_root, &scan_req).await?;
    Ok(Json(files))
}

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    pub path: String,
}

pub async fn read(State(state): State<AppState>, Query(req): Query<ReadQuery>) -> impl IntoResponse {
    let results = ae_tools::file_ops::read_files(&state.workspace_root, &[req.path]).await;
    Json(results.into_iter().next())
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub content: String,
}

pub async fn write(State(state): State<AppState>, Json(req): Json<WriteRequest>) -> impl IntoResponse {
    let change = ae_tools::file_ops::write_file(&state.workspace_root, &req.path, &req.content).await;
    Json(change)
}

/// `create` behaves like `write` for a path with no prior content — the
/// distinction is in the planner's `ActionType`, not the filesystem op.
pub async fn create(State(state): State<AppState>, Json(req): Json<WriteRequest>) -> impl IntoResponse {
    write(State(state), Json(req)).await
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
}

pub async fn delete(State(state): State<AppState>, Json(req): Json<DeleteRequest>) -> impl IntoResponse {
    let change = ae_tools::file_ops::delete_file(&state.workspace_root, &req.path).await;
    Json(change)
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub from: String,
    pub to: String,
}

pub async fn rename(State(state): State<AppState>, Json(req): Json<RenameRequest>) -> impl IntoResponse {
    let change = ae_tools::file_ops::move_file(&state.workspace_root, &req.from, &req.to).await;
    Json(change)
}
