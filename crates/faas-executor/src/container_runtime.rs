//! `ContainerRuntime`: the abstraction over a local container daemon that `FunctionSupervisor`
//! and `DependencyBuilder` depend on. Mirrors the original `Docker` interface
//! (`EnsureImage`/`Start`/`ShutdownAll`) plus the lifecycle calls `DependencyBuilder` needs
//! (`wait_for_shutdown`, `remove`) and the host-path translation hook used when the
//! orchestrator itself runs inside a container.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config as BollardConfig, CreateContainerOptions,
    LogOutput, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::secret::{HostConfig, PortBinding};
use bollard::Docker;
use dashmap::DashMap;
use futures::StreamExt;
use tracing::{error, info, instrument, warn};

use crate::{ExecutorError, Result};

/// A mount from a host (or, when the orchestrator is itself containerized, sibling-container)
/// path to a path inside the spawned container.
#[derive(Debug, Clone)]
pub struct BindMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub mounts: Vec<BindMount>,
    /// container-side port -> host port, empty for build containers that need no mapping.
    pub port_map: HashMap<u16, u16>,
    pub networks: Vec<String>,
}

/// A signal produced by `start` once the readiness marker (if any) has been observed in the
/// container's combined stdout/stderr, or immediately if no marker was requested.
pub struct ReadySignal {
    pub container_id: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ensure_image(&self, image: &str) -> Result<()>;
    async fn start(&self, spec: ContainerSpec, readiness_marker: Option<&str>) -> Result<ReadySignal>;
    async fn wait_for_shutdown(&self, container_name: &str, timeout: std::time::Duration) -> Result<()>;
    async fn remove(&self, container_name: &str) -> Result<()>;
    async fn shutdown_all(&self) -> Result<()>;
    /// Translates a path as seen by the orchestrator process into one the container daemon's
    /// host resolves identically, needed only when the orchestrator runs inside a container
    /// itself (`--local=false`). The default is a no-op, correct for local mode.
    async fn get_container_host_path(&self, container_name: &str, inner_path: &str) -> Result<String> {
        let _ = container_name;
        Ok(inner_path.to_string())
    }
}

/// Docker-backed `ContainerRuntime`, implemented directly on top of `bollard`.
pub struct DockerContainerRuntime {
    docker: Arc<Docker>,
    tracked: DashMap<String, String>,
}

impl DockerContainerRuntime {
    pub fn new(docker: Arc<Docker>) -> Self {
        Self {
            docker,
            tracked: DashMap::new(),
        }
    }

    pub fn connect_with_local_defaults() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(ExecutorError::DockerApi)?;
        Ok(Self::new(Arc::new(docker)))
    }
}

#[async_trait]
impl ContainerRuntime for DockerContainerRuntime {
    #[instrument(skip(self))]
    async fn ensure_image(&self, image: &str) -> Result<()> {
        let images = self
            .docker
            .list_images(Some(bollard::image::ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(ExecutorError::DockerApi)?;
        let already_present = images.iter().any(|i| i.repo_tags.iter().any(|t| t == image));
        if already_present {
            return Ok(());
        }

        info!(%image, "Pulling image");
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = stream.next().await {
            if let Err(e) = progress {
                return Err(ExecutorError::ImagePullFailed {
                    image: image.to_string(),
                    source: e,
                });
            }
        }
        Ok(())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
    async fn start(&self, spec: ContainerSpec, readiness_marker: Option<&str>) -> Result<ReadySignal> {
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .port_map
            .iter()
            .map(|(container_port, host_port)| {
                (
                    format!("{container_port}/tcp"),
                    Some(vec![PortBinding {
                        host_ip: Some("0.0.0.0".to_string()),
                        host_port: Some(host_port.to_string()),
                    }]),
                )
            })
            .collect();

        let binds: Vec<String> = spec
            .mounts
            .iter()
            .map(|m| {
                let mode = if m.read_only { "ro" } else { "rw" };
                format!("{}:{}:{}", m.source, m.target, mode)
            })
            .collect();

        let network_mode = spec.networks.first().cloned();

        let host_config = HostConfig {
            binds: Some(binds),
            port_bindings: Some(port_bindings),
            network_mode,
            ..Default::default()
        };

        let config = BollardConfig {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            env: Some(spec.env.clone()),
            host_config: Some(host_config),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(ExecutorError::CreationFailed)?;
        let container_id = created.id;

        let attach_results = self
            .docker
            .attach_container(
                &container_id,
                Some(AttachContainerOptions::<String> {
                    stream: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(ExecutorError::DockerApi)?;
        let AttachContainerResults { mut output, .. } = attach_results;

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(ExecutorError::StartFailed)?;

        self.tracked.insert(spec.name.clone(), container_id.clone());

        if let Some(marker) = readiness_marker {
            let marker = marker.to_string();
            let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(60);
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    return Err(ExecutorError::Timeout(format!(
                        "readiness marker '{marker}' not observed for {}",
                        spec.name
                    )));
                }
                let next = tokio::time::timeout(remaining, output.next()).await;
                match next {
                    Ok(Some(Ok(LogOutput::StdOut { message }))) | Ok(Some(Ok(LogOutput::StdErr { message }))) => {
                        if String::from_utf8_lossy(&message).contains(&marker) {
                            break;
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "error reading container log stream while waiting for readiness");
                    }
                    Ok(None) => {
                        return Err(ExecutorError::Timeout(format!(
                            "log stream closed before readiness marker '{marker}' for {}",
                            spec.name
                        )));
                    }
                    Err(_) => {
                        return Err(ExecutorError::Timeout(format!(
                            "readiness marker '{marker}' not observed for {}",
                            spec.name
                        )));
                    }
                }
            }
        } else {
            // Drain the log stream in the background so the attach doesn't block the daemon;
            // nobody is waiting on readiness.
            tokio::spawn(async move { while output.next().await.is_some() {} });
        }

        Ok(ReadySignal { container_id })
    }

    #[instrument(skip(self))]
    async fn wait_for_shutdown(&self, container_name: &str, timeout: std::time::Duration) -> Result<()> {
        let mut wait_stream = self.docker.wait_container(
            container_name,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );
        match tokio::time::timeout(timeout, wait_stream.next()).await {
            Ok(Some(Ok(_))) => Ok(()),
            Ok(Some(Err(e))) => Err(ExecutorError::WaitFailed(e)),
            Ok(None) => Ok(()),
            Err(_) => Err(ExecutorError::Timeout(format!("shutdown of {container_name}"))),
        }
    }

    #[instrument(skip(self))]
    async fn remove(&self, container_name: &str) -> Result<()> {
        self.docker
            .remove_container(
                container_name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(ExecutorError::RemovalFailed)?;
        self.tracked.remove(container_name);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shutdown_all(&self) -> Result<()> {
        let mut first_error = None;
        let names: Vec<String> = self.tracked.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Err(e) = self.remove(&name).await {
                error!(container = %name, error = %e, "failed to remove container during shutdown");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Inspects `container_name` (the orchestrator's own container) and rewrites `inner_path`
    /// by substituting the mount whose destination prefixes it with that mount's host-side
    /// source. Falls back to the unmodified path if no mount matches.
    #[instrument(skip(self))]
    async fn get_container_host_path(&self, container_name: &str, inner_path: &str) -> Result<String> {
        let details = self
            .docker
            .inspect_container(container_name, None::<bollard::container::InspectContainerOptions>)
            .await
            .map_err(ExecutorError::DockerApi)?;

        for mount in details.mounts.unwrap_or_default() {
            let (Some(destination), Some(source)) = (mount.destination.as_deref(), mount.source.as_deref()) else {
                continue;
            };
            if let Some(suffix) = inner_path.strip_prefix(destination) {
                return Ok(format!("{}{}", source.trim_end_matches('/'), suffix));
            }
        }

        warn!(container = %container_name, path = %inner_path, "no matching mount found for host-path translation; using path unchanged");
        Ok(inner_path.to_string())
    }
}
