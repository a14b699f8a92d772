//! `GET /ai/providers`: lists the providers available for `/ai/chat` and
//! `/ai/runs/start` to target by id.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub model: String,
}

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<ProviderInfo> = state
        .providers
        .iter()
        .map(|(id, provider)| ProviderInfo { id: id.clone(), model: provider.default_model().to_string() })
        .collect();
    Json(providers)
}
