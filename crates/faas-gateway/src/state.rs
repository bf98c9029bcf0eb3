use std::sync::Arc;

use faas_executor::artifact_store::ArtifactStore;
use faas_executor::catalog::Catalog;
use faas_executor::event_pump::EventPump;
use faas_executor::supervisor::FunctionSupervisor;

/// Shared handle set threaded through every handler. Deliberately decoupled from
/// `faas_orchestrator::Config` — the gateway only needs the ARN fragment, not the full
/// boot/shutdown lifecycle, so `faas-bin` wires this up alongside the `Orchestrator` it owns.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub artifact_store: ArtifactStore,
    pub supervisor: Arc<FunctionSupervisor>,
    pub event_pump: Arc<EventPump>,
    pub http_client: reqwest::Client,
    pub account_number: String,
    pub region: String,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        artifact_store: ArtifactStore,
        supervisor: Arc<FunctionSupervisor>,
        event_pump: Arc<EventPump>,
        account_number: String,
        region: String,
    ) -> Self {
        Self {
            catalog,
            artifact_store,
            supervisor,
            event_pump,
            http_client: reqwest::Client::new(),
            account_number,
            region,
        }
    }
}
