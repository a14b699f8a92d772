//! Terminal session HTTP surface: `POST /terminal/sessions`,
//! `POST /terminal/sessions/{id}/input`,
//! `GET /terminal/sessions/{id}/output`,
//! `POST /terminal/sessions/{id}/resize`,
//! `DELETE /terminal/sessions/{id}`.

use crate::api::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub cwd: Option<String>,
    pub shell: Option<String>,
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateSessionRequest>) -> Result<impl IntoResponse, ApiError> {
    let cwd = match &req.cwd {
        Some(c) => ae_tools::file_ops::validate_path(&state.workspace_root, c)?,
        None => state.workspace_root.clone(),
    };
    let info = state.terminal.create(cwd.to_string_lossy().to_string(), req.shell.clone());
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub data: String,
}

pub async fn input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> impl IntoResponse {
    if state.terminal.input(&id, req.data.into_bytes()).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn output(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.terminal.output_since_last_read(&id) {
        Some(out) => Json(out).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

pub async fn resize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResizeRequest>,
) -> impl IntoResponse {
    if state.terminal.resize(&id, req.cols, req.rows) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn close(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if state.terminal.close(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
