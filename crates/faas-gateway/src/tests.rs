use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use faas_executor::artifact_store::ArtifactStore;
use faas_executor::catalog::InMemoryCatalog;
use faas_executor::container_runtime::{ContainerRuntime, ContainerSpec, ReadySignal};
use faas_executor::event_pump::EventPump;
use faas_executor::queue_client::{QueueClient, QueueMessage};
use faas_executor::supervisor::FunctionSupervisor;
use faas_executor::port_pool::PortPool;
use faas_executor::Result as ExecutorResult;
use tower::ServiceExt;

use crate::{build_router, AppState};

struct UnusedRuntime;

#[async_trait]
impl ContainerRuntime for UnusedRuntime {
    async fn ensure_image(&self, _image: &str) -> ExecutorResult<()> {
        unreachable!("test never starts a container")
    }
    async fn start(&self, _spec: ContainerSpec, _readiness_marker: Option<&str>) -> ExecutorResult<ReadySignal> {
        unreachable!("test never starts a container")
    }
    async fn wait_for_shutdown(&self, _name: &str, _timeout: Duration) -> ExecutorResult<()> {
        Ok(())
    }
    async fn remove(&self, _name: &str) -> ExecutorResult<()> {
        Ok(())
    }
    async fn shutdown_all(&self) -> ExecutorResult<()> {
        Ok(())
    }
}

struct UnusedQueueClient;

#[async_trait]
impl QueueClient for UnusedQueueClient {
    async fn list_queue_urls(&self, _name_prefix: &str) -> ExecutorResult<Vec<String>> {
        unreachable!("test never starts an event source")
    }
    async fn receive_messages(&self, _queue_url: &str, _max_messages: i32, _wait_seconds: i32) -> ExecutorResult<Vec<QueueMessage>> {
        unreachable!("test never starts an event source")
    }
    async fn delete_message(&self, _queue_url: &str, _receipt_handle: &str) -> ExecutorResult<()> {
        unreachable!("test never starts an event source")
    }
}

fn test_state() -> AppState {
    let catalog = Arc::new(InMemoryCatalog::new());
    let artifact_store = ArtifactStore::new("/tmp/faas-gateway-tests");
    let runtime = Arc::new(UnusedRuntime);
    let supervisor = Arc::new(FunctionSupervisor::new(
        PortPool::new(9050, 4),
        runtime,
        vec!["lambda".to_string()],
        true,
        None,
    ));
    let event_pump = Arc::new(EventPump::new(catalog.clone(), Arc::new(UnusedQueueClient), "http://localhost:9050".to_string()));
    AppState::new(
        catalog,
        artifact_store,
        supervisor,
        event_pump,
        "271828182845".to_string(),
        "us-west-2".to_string(),
    )
}

#[tokio::test]
async fn invoking_a_function_that_never_booted_returns_not_found() {
    let app = build_router(test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/2015-03-31/functions/does-not-exist/invocations")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn getting_an_unknown_function_returns_not_found() {
    let app = build_router(test_state());
    let request = Request::builder()
        .method("GET")
        .uri("/2015-03-31/functions/ghost")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
