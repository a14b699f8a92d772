//! Maps `ae_domain::error::Error` to an HTTP response in exactly one
//! place: every error kind maps to a status code in a single
//! `impl IntoResponse`, not scattered per-handler matches.

use ae_domain::error::{Error, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    detail: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ToolPathEscape => StatusCode::BAD_REQUEST,
        ErrorKind::ToolInvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Json => StatusCode::BAD_REQUEST,
        ErrorKind::ToolNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RunNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RunConflict => StatusCode::CONFLICT,
        ErrorKind::WorkspaceConflict => StatusCode::CONFLICT,
        ErrorKind::ToolTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ToolCancelled => StatusCode::CONFLICT,
        ErrorKind::ProviderAuth => StatusCode::BAD_GATEWAY,
        ErrorKind::ProviderRateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ProviderBadResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::ProviderTransport => StatusCode::BAD_GATEWAY,
        ErrorKind::PlannerInvalidOutput => StatusCode::BAD_GATEWAY,
        ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::ToolIo => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Http => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Newtype over `ae_domain::error::Error` so `IntoResponse` can be
/// implemented here despite both the trait and `Error` being foreign to
/// this crate (Rust's orphan rules forbid `impl IntoResponse for Error`
/// directly).
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(err.kind());
        if status.is_server_error() {
            tracing::error!(error = %err, kind = ?err.kind(), "request failed");
        } else {
            tracing::debug!(error = %err, kind = ?err.kind(), "request rejected");
        }
        (status, Json(ErrorEnvelope { detail: err.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_escape_maps_to_bad_request() {
        assert_eq!(status_for(ErrorKind::ToolPathEscape), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn run_not_found_maps_to_404() {
        assert_eq!(status_for(ErrorKind::RunNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn run_conflict_maps_to_409() {
        assert_eq!(status_for(ErrorKind::RunConflict), StatusCode::CONFLICT);
    }
}
