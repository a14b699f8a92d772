use std::path::PathBuf;
use std::sync::Arc;

use ae_domain::config::Config;
use ae_providers::registry::ProviderRegistry;
use ae_tools::TerminalManager;
use tokio::sync::Semaphore;

use crate::audit::AuditLog;
use crate::runtime::cancel::CancelMap;
use crate::runtime::registry::RunRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Arc<ProviderRegistry>,
    pub run_registry: Arc<RunRegistry>,
    pub cancel_map: Arc<CancelMap>,
    pub audit: Arc<AuditLog>,
    pub terminal: Arc<TerminalManager>,
    /// Bounds in-flight tool executions across the whole process
    /// (`MAX_CONCURRENT_TOOLS`).
    pub tool_semaphore: Arc<Semaphore>,
    pub workspace_root: PathBuf,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let providers = ProviderRegistry::from_config(&config.llm).expect("provider registry never fails to construct");
        let workspace_root = config.workspace.root.clone();
        let audit_dir = crate::audit::default_dir(&workspace_root);
        let max_concurrent_tools = config.server.max_concurrent_tools;

        Self {
            config: Arc::new(config),
            providers: Arc::new(providers),
            run_registry: Arc::new(RunRegistry::new()),
            cancel_map: Arc::new(CancelMap::new()),
            audit: Arc::new(AuditLog::new(audit_dir)),
            terminal: Arc::new(TerminalManager::new()),
            tool_semaphore: Arc::new(Semaphore::new(max_concurrent_tools.max(1))),
            workspace_root,
        }
    }
}
