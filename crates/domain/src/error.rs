use serde::{Deserialize, Serialize};

/// Shared error type used across all agent-engine crates.
///
/// `kind()` exposes the machine-readable tag used by the HTTP error
/// envelope and by the executor's retry/critical-path logic.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider auth: {0}")]
    ProviderAuth(String),

    #[error("provider rate limited: {0}")]
    ProviderRateLimit(String),

    #[error("provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("provider returned a bad response: {0}")]
    ProviderBadResponse(String),

    #[error("provider transport error: {0}")]
    ProviderTransport(String),

    #[error("planner produced invalid output: {0}")]
    PlannerInvalidOutput(String),

    #[error("path escapes the workspace root: {0}")]
    ToolPathEscape(String),

    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("tool IO error: {0}")]
    ToolIo(String),

    #[error("tool timed out after {0}s")]
    ToolTimeout(u64),

    #[error("tool execution cancelled")]
    ToolCancelled,

    #[error("invalid tool input: {0}")]
    ToolInvalidInput(String),

    #[error("run conflict: {0}")]
    RunConflict(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("workspace conflict: {0}")]
    WorkspaceConflict(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// The machine-readable error kind, stable across `Display` wording
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Json,
    Http,
    Timeout,
    ProviderAuth,
    ProviderRateLimit,
    ProviderTimeout,
    ProviderBadResponse,
    ProviderTransport,
    PlannerInvalidOutput,
    ToolPathEscape,
    ToolNotFound,
    ToolIo,
    ToolTimeout,
    ToolCancelled,
    ToolInvalidInput,
    RunConflict,
    RunNotFound,
    WorkspaceConflict,
    Config,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::Http(_) => ErrorKind::Http,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::ProviderAuth(_) => ErrorKind::ProviderAuth,
            Error::ProviderRateLimit(_) => ErrorKind::ProviderRateLimit,
            Error::ProviderTimeout(_) => ErrorKind::ProviderTimeout,
            Error::ProviderBadResponse(_) => ErrorKind::ProviderBadResponse,
            Error::ProviderTransport(_) => ErrorKind::ProviderTransport,
            Error::PlannerInvalidOutput(_) => ErrorKind::PlannerInvalidOutput,
            Error::ToolPathEscape(_) => ErrorKind::ToolPathEscape,
            Error::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Error::ToolIo(_) => ErrorKind::ToolIo,
            Error::ToolTimeout(_) => ErrorKind::ToolTimeout,
            Error::ToolCancelled => ErrorKind::ToolCancelled,
            Error::ToolInvalidInput(_) => ErrorKind::ToolInvalidInput,
            Error::RunConflict(_) => ErrorKind::RunConflict,
            Error::RunNotFound(_) => ErrorKind::RunNotFound,
            Error::WorkspaceConflict(_) => ErrorKind::WorkspaceConflict,
            Error::Config(_) => ErrorKind::Config,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether a provider-layer error is worth retrying with backoff
    /// (§4.1: transient transport/timeout errors only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderTimeout(_) | Error::ProviderTransport(_))
    }

    /// Whether this error, attached to an action record, should terminate
    /// the owning run regardless of the action's criticality.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Error::PlannerInvalidOutput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
