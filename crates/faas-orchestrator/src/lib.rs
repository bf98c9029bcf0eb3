use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use faas_common::FaasError;
use faas_executor::catalog::Catalog;
use faas_executor::container_runtime::ContainerRuntime;
use faas_executor::dependency_builder::DependencyBuilder;
use faas_executor::event_pump::EventPump;
use faas_executor::port_pool::PortPool;
use faas_executor::queue_client::QueueClient;
use faas_executor::runnable::{DevFunctionRunnable, PersistedFunction};
use faas_executor::supervisor::FunctionSupervisor;
use faas_executor::ExecutorError;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub mod config;
pub mod dev_config;

pub use config::Config;
pub use faas_common as common;

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum Error {
    #[error("Executor error: {0}")]
    ExecutorError(#[from] ExecutorError),
    #[error("Function not found in registry: {0}")]
    FunctionNotFound(String),
    #[error("Scheduling failed: {0}")]
    SchedulingFailed(String),
}

impl From<Error> for FaasError {
    fn from(err: Error) -> Self {
        FaasError::Orchestration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level lifecycle: boots persisted functions, dev functions, and event pumps in order,
/// and tears everything down within a bounded budget on shutdown. Mirrors `main.start` plus
/// the (never-implemented-in-the-original) `initializeDb`/`initializeDocker` steps it left
/// as comments.
pub struct Orchestrator {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub artifact_store: faas_executor::artifact_store::ArtifactStore,
    pub supervisor: Arc<FunctionSupervisor>,
    pub dependency_builder: Arc<DependencyBuilder>,
    pub event_pump: Arc<EventPump>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        catalog: Arc<dyn Catalog>,
        runtime: Arc<dyn ContainerRuntime>,
        queue_client: Arc<dyn QueueClient>,
    ) -> Self {
        let artifact_store = faas_executor::artifact_store::ArtifactStore::new(config.data_path());
        let ports = PortPool::new(config.port_pool_base(), 50);
        let supervisor = Arc::new(FunctionSupervisor::new(
            ports,
            runtime.clone(),
            config.networks.clone(),
            config.is_local,
            config.own_container_name.clone(),
        ));
        let dependency_builder = Arc::new(DependencyBuilder::new(
            runtime,
            config.is_local,
            config.own_container_name.clone(),
        ));
        let invoke_base_url = format!("http://localhost:{}", config.port);
        let event_pump = Arc::new(EventPump::new(catalog.clone(), queue_client, invoke_base_url));

        Self {
            config,
            catalog,
            artifact_store,
            supervisor,
            dependency_builder,
            event_pump,
        }
    }

    /// Boot sequence: persisted functions (abort on first failure), then dev functions
    /// (log-and-skip per failure), then event pumps (log-and-skip per failure).
    #[instrument(skip(self))]
    pub async fn boot(&self) -> Result<()> {
        self.boot_persisted_functions().await?;
        self.boot_dev_functions().await;
        self.event_pump.start_all().await?;
        Ok(())
    }

    async fn boot_persisted_functions(&self) -> Result<()> {
        let functions = self.catalog.get_all_latest_functions().await?;
        for function in functions {
            let environment = self.catalog.get_environment_for_function(&function.function_name).await?;
            let mut function = function;
            function.environment = environment;
            let runnable = PersistedFunction::new(function, &self.artifact_store);
            info!(function = %runnable.function.function_name, "Starting persisted function");
            self.supervisor.start(&runnable).await?;
        }
        Ok(())
    }

    async fn boot_dev_functions(&self) {
        let dev_config_path = PathBuf::from(&self.config.dev_config_file);
        let dev_functions = match dev_config::parse_file(&dev_config_path) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "unable to parse dev config, skipping dev functions");
                return;
            }
        };

        for (key, dev_function) in dev_functions {
            if let Err(e) = self.boot_one_dev_function(&dev_config_path, &key, dev_function).await {
                error!(dev_function = %key, error = %e, "unable to start dev function, skipping");
            }
        }
    }

    async fn boot_one_dev_function(
        &self,
        dev_config_path: &Path,
        key: &str,
        dev_function: faas_common::DevFunction,
    ) -> Result<()> {
        let resolved_base_path = resolve_dev_base_path(dev_config_path, &dev_function.base_path);
        let deps_path = self
            .dependency_builder
            .install_dependencies(
                &dev_function.name,
                &dev_function.runtime,
                resolved_base_path.to_string_lossy().as_ref(),
            )
            .await?;

        let runnable = DevFunctionRunnable::new(dev_function, resolved_base_path, PathBuf::from(deps_path));
        self.supervisor.start(&runnable).await?;
        Ok(())
    }

    /// Cancels event pumps, stops every tracked container, and cleans up dependency-build
    /// temp directories, all best-effort within a 2-minute budget. Errors are logged, not
    /// propagated — a shutdown that half-fails still exits.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        info!("Shutting down...");
        self.event_pump.cancel_all();

        if let Err(e) = tokio::time::timeout(SHUTDOWN_BUDGET, self.supervisor.shutdown_all(SHUTDOWN_BUDGET)).await {
            warn!(error = ?e, "function supervisor shutdown exceeded budget");
        }

        self.dependency_builder.cleanup_all();
    }
}

fn resolve_dev_base_path(dev_config_path: &Path, base_path: &str) -> PathBuf {
    let candidate = PathBuf::from(base_path);
    if candidate.is_absolute() {
        return candidate;
    }
    let absolute_config_path = if dev_config_path.is_absolute() {
        dev_config_path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(dev_config_path)
    };
    let config_dir = absolute_config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    config_dir.join(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_base_path_is_unchanged() {
        let resolved = resolve_dev_base_path(Path::new("/some/functions.yml"), "/abs/path");
        assert_eq!(resolved, PathBuf::from("/abs/path"));
    }

    #[test]
    fn relative_base_path_is_resolved_against_config_dir() {
        let resolved = resolve_dev_base_path(Path::new("/some/dir/functions.yml"), "./hello");
        assert_eq!(resolved, PathBuf::from("/some/dir/hello"));
    }
}
