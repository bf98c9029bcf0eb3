//! `DependencyBuilder`: installs a dev function's declared dependencies into a temp
//! directory via an ephemeral container, mirroring `dev.Service.InstallDependencies`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{instrument, warn};

use crate::container_runtime::{BindMount, ContainerRuntime, ContainerSpec};
use crate::{ExecutorError, Result};

const REQUIREMENTS_FILE: &str = "requirements.txt";
const READY_MARKER: &str = "Successfully installed";

fn image_for_runtime(runtime: &str) -> Option<&'static str> {
    let table: HashMap<&str, &str> = HashMap::from([
        ("python3.6", "python:3.6-alpine"),
        ("python3.7", "python:3.7-alpine"),
        ("python3.8", "python:3.8-alpine"),
        ("python3.9", "python:3.9-alpine"),
        ("python3.10", "python:3.10-alpine"),
    ]);
    table.get(runtime).copied()
}

pub struct DependencyBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    temp_dirs: DashMap<String, PathBuf>,
    is_local: bool,
    own_container_name: Option<String>,
}

impl DependencyBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, is_local: bool, own_container_name: Option<String>) -> Self {
        Self {
            runtime,
            temp_dirs: DashMap::new(),
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

    /// Installs `base_path`'s `requirements.txt` into a fresh temp directory and returns its
    /// absolute path. Returns an empty string (no error) when there's no requirements file.
    #[instrument(skip(self))]
    pub async fn install_dependencies(&self, dev_function_key: &str, runtime: &str, base_path: &str) -> Result<String> {
        let requirements_path = PathBuf::from(base_path).join(REQUIREMENTS_FILE);
        if !requirements_path.is_file() {
            return Ok(String::new());
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("lambda-build-")
            .tempdir()
            .map_err(ExecutorError::from)?;
        // Resolve symlinks so the path is valid from the container daemon's perspective on
        // systems where the OS temp dir is itself a symlink (e.g. macOS's `/tmp` -> `/private/tmp`).
        let temp_path = std::fs::canonicalize(temp_dir.path()).unwrap_or_else(|_| temp_dir.path().to_path_buf());

        let image = image_for_runtime(runtime)
            .ok_or_else(|| ExecutorError::Internal(format!("no dev image for runtime {runtime}")))?;
        self.runtime.ensure_image(image).await?;

        let container_name = format!("{dev_function_key}_deps");
        let work_source = self.host_path(base_path).await?;
        let build_source = self.host_path(&temp_path.to_string_lossy()).await?;
        let spec = ContainerSpec {
            name: container_name.clone(),
            image: image.to_string(),
            command: vec![
                "pip".to_string(),
                "install".to_string(),
                "-r".to_string(),
                "/work/requirements.txt".to_string(),
                "-t".to_string(),
                "/build".to_string(),
            ],
            env: vec![],
            mounts: vec![
                BindMount {
                    source: work_source,
                    target: "/work".to_string(),
                    read_only: true,
                },
                BindMount {
                    source: build_source,
                    target: "/build".to_string(),
                    read_only: false,
                },
            ],
            port_map: HashMap::new(),
            networks: vec![],
        };

        self.runtime.start(spec, Some(READY_MARKER)).await?;

        if let Err(e) = self
            .runtime
            .wait_for_shutdown(&container_name, std::time::Duration::from_secs(10))
            .await
        {
            warn!(container = %container_name, error = %e, "unable to wait for dependency-build container to shut down");
        }
        if let Err(e) = self.runtime.remove(&container_name).await {
            warn!(container = %container_name, error = %e, "unable to remove dependency-build container");
        }

        let path_str = temp_path.to_string_lossy().to_string();
        self.temp_dirs.insert(dev_function_key.to_string(), temp_path);
        Ok(path_str)
    }

    /// Removes every temp directory created by `install_dependencies`. Best-effort; logged,
    /// never propagated, called during shutdown.
    #[instrument(skip(self))]
    pub fn cleanup_all(&self) {
        for entry in self.temp_dirs.iter() {
            if let Err(e) = std::fs::remove_dir_all(entry.value()) {
                warn!(path = %entry.value().display(), error = %e, "unable to remove dependency temp dir");
            }
        }
        self.temp_dirs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_table_covers_supported_python_versions() {
        assert_eq!(image_for_runtime("python3.9"), Some("python:3.9-alpine"));
        assert_eq!(image_for_runtime("python3.11"), None);
    }

    #[tokio::test]
    async fn install_dependencies_is_noop_without_requirements_file() {
        struct NoopRuntime;
        #[async_trait::async_trait]
        impl ContainerRuntime for NoopRuntime {
            async fn ensure_image(&self, _image: &str) -> Result<()> {
                unreachable!("should not be called when requirements.txt is absent")
            }
            async fn start(
                &self,
                _spec: ContainerSpec,
                _readiness_marker: Option<&str>,
            ) -> Result<crate::container_runtime::ReadySignal> {
                unreachable!()
            }
            async fn wait_for_shutdown(&self, _name: &str, _timeout: std::time::Duration) -> Result<()> {
                unreachable!()
            }
            async fn remove(&self, _name: &str) -> Result<()> {
                unreachable!()
            }
            async fn shutdown_all(&self) -> Result<()> {
                unreachable!()
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let builder = DependencyBuilder::new(Arc::new(NoopRuntime), true, None);
        let result = builder
            .install_dependencies("dev-hello", "python3.9", tmp.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(result, "");
    }
}
