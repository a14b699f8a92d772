//! Run control-plane HTTP surface: `POST /ai/runs/start`,
//! `GET /ai/runs/{id}`,
//! `POST /ai/runs/{id}/continue|reply|pause|resume|cancel`.
//!
//! No SSE: every endpoint here is a synchronous request/response pair
//! the caller polls.

use ae_domain::error::Error;
use crate::api::error::ApiError;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use uuid::Uuid;

use crate::api::dto::{AiResponse, ReplyRunRequest, StartRunRequest};
use crate::runtime::executor;
use crate::state::AppState;

pub async fn start(State(state): State<AppState>, Json(req): Json<StartRunRequest>) -> Result<impl IntoResponse, ApiError> {
    let run_id = executor::start_run(&state, req).await?;
    let response = executor::get_response(&state, run_id)?;
    Ok(Json(response))
}

pub async fn get(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let handle = state.run_registry.get(run_id).ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
    let run = handle.run.read();
    Ok(Json(crate::api::dto::PlanRunInfo::from(&*run)))
}

pub async fn continue_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let response = executor::continue_run(&state, run_id).await?;
    Ok(Json(response))
}

pub async fn reply(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(req): Json<ReplyRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = executor::reply_run(&state, run_id, req.message).await?;
    Ok(Json(response))
}

pub async fn pause(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Json<AiResponse>, ApiError> {
    Ok(Json(executor::pause_run(&state, run_id)?))
}

pub async fn resume(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Json<AiResponse>, ApiError> {
    Ok(Json(executor::resume_run(&state, run_id)?))
}

pub async fn cancel(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Json<AiResponse>, ApiError> {
    Ok(Json(executor::cancel_run(&state, run_id)?))
}
