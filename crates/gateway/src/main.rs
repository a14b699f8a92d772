mod api;
mod audit;
mod runtime;
mod state;

use std::time::Duration;

use anyhow::Context;
use axum::http::Method;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ae_domain::config::{Config, ConfigSeverity};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env();
    run_server(config).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ae_gateway=debug")))
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("agent engine starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let run_ttl = Duration::from_secs(config.server.run_ttl_sec);

    let state = AppState::new(config);
    tracing::info!(providers = state.providers.len(), "provider registry ready");

    runtime::sweeper::spawn(state.run_registry.clone(), run_ttl);
    tracing::info!(ttl_sec = run_ttl.as_secs(), "run sweeper started");

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "agent engine listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}
