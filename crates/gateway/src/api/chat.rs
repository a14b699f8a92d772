//! `POST /ai/chat`: create a run and tick it exactly once, returning the
//! resulting `AiResponse`. The one-shot sibling of the multi-tick
//! `/ai/runs/*` surface in `api::runs`.

use crate::api::error::ApiError;
use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::api::dto::StartRunRequest;
use crate::runtime::executor;
use crate::state::AppState;

pub async fn chat(State(state): State<AppState>, Json(req): Json<StartRunRequest>) -> Result<impl IntoResponse, ApiError> {
    let response = executor::one_shot_chat(&state, req).await?;
    Ok(Json(response))
}
