//! `FunctionSupervisor`: starts one container per function and maintains the routing table
//! consulted by `InvocationRouter`. Mirrors the original `Manager` (`StartFunction` +
//! the `running` map), generalized to a trait object over `Runnable` so persisted functions
//! and dev functions share the same start-up path.

use std::collections::HashMap;
use std::sync::Arc;

use faas_common::Runnable;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::container_runtime::{BindMount, ContainerRuntime, ContainerSpec};
use crate::port_pool::PortPool;
use crate::{ExecutorError, Result};

fn image_for_runtime(runtime: &str) -> Option<&'static str> {
    let table: HashMap<&str, &str> = HashMap::from([
        ("python3.6", "lambci/lambda:python3.6"),
        ("python3.7", "lambci/lambda:python3.7"),
        ("python3.8", "mlupin/docker-lambda:python3.8"),
        ("python3.9", "mlupin/docker-lambda:python3.9"),
        ("python3.10", "mlupin/docker-lambda:python3.10"),
    ]);
    table.get(runtime).copied()
}

struct Routing {
    endpoints: HashMap<String, String>,
}

pub struct FunctionSupervisor {
    ports: PortPool,
    runtime: Arc<dyn ContainerRuntime>,
    routing: RwLock<Routing>,
    networks: Vec<String>,
    is_local: bool,
    /// This process's own container name, set only when it runs containerized itself
    /// (`--local=false`). Used to translate bind-mount sources via `get_container_host_path`.
    own_container_name: Option<String>,
}

impl FunctionSupervisor {
    pub fn new(
        ports: PortPool,
        runtime: Arc<dyn ContainerRuntime>,
        networks: Vec<String>,
        is_local: bool,
        own_container_name: Option<String>,
    ) -> Self {
        Self {
            ports,
            runtime,
            routing: RwLock::new(Routing {
                endpoints: HashMap::new(),
            }),
            networks,
            is_local,
            own_container_name,
        }
    }

    /// Translates `path` into the host path the container daemon should bind-mount, only when
    /// this process itself runs inside a container. A no-op in local mode.
    async fn host_path(&self, path: &str) -> Result<String> {
        match (self.is_local, self.own_container_name.as_ref()) {
            (false, Some(container_name)) => self.runtime.get_container_host_path(container_name, path).await,
            _ => Ok(path.to_string()),
        }
    }

    /// Starts the given function's container, acquiring a port, ensuring the runtime's
    /// image, and recording the resulting endpoint in the routing table.
    #[instrument(skip(self, function))]
    pub async fn start(&self, function: &dyn Runnable) -> Result<()> {
        let port = self.ports.acquire().await?;

        let image = match image_for_runtime(&function.runtime_tag()) {
            Some(image) => image,
            None => {
                self.ports.release(port).await;
                return Err(ExecutorError::Internal(format!(
                    "no image for runtime {}",
                    function.runtime_tag()
                )));
            }
        };

        if let Err(e) = self.runtime.ensure_image(image).await {
            self.ports.release(port).await;
            return Err(e);
        }

        let name = function.name();
        info!(function = %name, port, ?image, "Starting function container");

        let code_path = match self.host_path(&function.code_path().to_string_lossy()).await {
            Ok(path) => path,
            Err(e) => {
                self.ports.release(port).await;
                return Err(e);
            }
        };
        let layer_path = match self.host_path(&function.layer_path().to_string_lossy()).await {
            Ok(path) => path,
            Err(e) => {
                self.ports.release(port).await;
                return Err(e);
            }
        };

        let spec = ContainerSpec {
            name: name.clone(),
            image: image.to_string(),
            command: function.handler_cmd(),
            env: function.env_vars(),
            mounts: vec![
                BindMount {
                    source: code_path,
                    target: "/var/task".to_string(),
                    read_only: true,
                },
                BindMount {
                    source: layer_path,
                    target: "/opt".to_string(),
                    read_only: true,
                },
            ],
            port_map: HashMap::from([(9001u16, port)]),
            networks: self.networks.clone(),
        };

        if let Err(e) = self.runtime.start(spec, None).await {
            self.ports.release(port).await;
            return Err(e);
        }

        let endpoint = if self.is_local {
            format!("http://localhost:{port}")
        } else {
            format!("http://{name}:9001")
        };

        let mut routing = self.routing.write().await;
        routing.endpoints.insert(name, endpoint);
        Ok(())
    }

    pub async fn endpoint_for(&self, function_name: &str) -> Option<String> {
        self.routing.read().await.endpoints.get(function_name).cloned()
    }

    /// Stops every tracked container. Best-effort; the first error observed is returned for
    /// diagnostics, but every container is still attempted.
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self, _deadline: std::time::Duration) -> Result<()> {
        self.runtime.shutdown_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_runtime::ReadySignal;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRuntime {
        started: AtomicUsize,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn ensure_image(&self, _image: &str) -> Result<()> {
            Ok(())
        }
        async fn start(&self, _spec: ContainerSpec, _readiness_marker: Option<&str>) -> Result<ReadySignal> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(ReadySignal {
                container_id: "fake".to_string(),
            })
        }
        async fn wait_for_shutdown(&self, _name: &str, _timeout: std::time::Duration) -> Result<()> {
            Ok(())
        }
        async fn remove(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn shutdown_all(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeRunnable {
        name: String,
    }

    impl Runnable for FakeRunnable {
        fn name(&self) -> String {
            self.name.clone()
        }
        fn env_vars(&self) -> Vec<String> {
            vec![]
        }
        fn handler_cmd(&self) -> Vec<String> {
            vec!["main.handler".to_string()]
        }
        fn runtime_tag(&self) -> String {
            "python3.9".to_string()
        }
        fn code_path(&self) -> PathBuf {
            PathBuf::from("/tmp/code")
        }
        fn layer_path(&self) -> PathBuf {
            PathBuf::from("/tmp/layers")
        }
    }

    #[tokio::test]
    async fn start_records_localhost_endpoint() {
        let runtime = Arc::new(FakeRuntime {
            started: AtomicUsize::new(0),
        });
        let supervisor = FunctionSupervisor::new(
            PortPool::new(9050, 2),
            runtime.clone(),
            vec!["lambda".to_string()],
            true,
            None,
        );
        let function = FakeRunnable {
            name: "hello".to_string(),
        };
        supervisor.start(&function).await.unwrap();
        let endpoint = supervisor.endpoint_for("hello").await.unwrap();
        assert!(endpoint.starts_with("http://localhost:"));
        assert_eq!(runtime.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_with_unknown_runtime_releases_port() {
        struct BadRunnable;
        impl Runnable for BadRunnable {
            fn name(&self) -> String {
                "bad".to_string()
            }
            fn env_vars(&self) -> Vec<String> {
                vec![]
            }
            fn handler_cmd(&self) -> Vec<String> {
                vec![]
            }
            fn runtime_tag(&self) -> String {
                "cobol-9000".to_string()
            }
            fn code_path(&self) -> PathBuf {
                PathBuf::from("/tmp")
            }
            fn layer_path(&self) -> PathBuf {
                PathBuf::from("/tmp")
            }
        }

        let runtime = Arc::new(FakeRuntime {
            started: AtomicUsize::new(0),
        });
        let supervisor = FunctionSupervisor::new(PortPool::new(9050, 1), runtime, vec![], true, None);
        assert!(supervisor.start(&BadRunnable).await.is_err());
        // The single port must have been released back to the pool.
        let port = supervisor.ports.acquire().await.unwrap();
        assert_eq!(port, 9051);
    }
}
