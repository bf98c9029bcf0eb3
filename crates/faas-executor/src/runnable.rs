//! Wraps catalog-backed functions and dev functions so both can be started through the same
//! `FunctionSupervisor::start` path. `faas_common::Runnable` needs resolved filesystem paths,
//! which only `ArtifactStore` (this crate) knows how to compute, so the impls live here
//! rather than on the bare domain types in `faas-common`.

use std::path::PathBuf;

use faas_common::{DevFunction, Function, Runnable};

use crate::artifact_store::ArtifactStore;

pub struct PersistedFunction {
    pub function: Function,
    pub content_path: PathBuf,
    pub layer_path: PathBuf,
}

impl PersistedFunction {
    pub fn new(function: Function, store: &ArtifactStore) -> Self {
        let content_path = store.function_content_path(&function.function_name, function.version);
        let layer_path = store.function_layer_path(&function.function_name, function.version);
        Self {
            function,
            content_path,
            layer_path,
        }
    }
}

impl Runnable for PersistedFunction {
    fn name(&self) -> String {
        self.function.function_name.clone()
    }
    fn env_vars(&self) -> Vec<String> {
        self.function.env_vars()
    }
    fn handler_cmd(&self) -> Vec<String> {
        self.function.handler_cmd()
    }
    fn runtime_tag(&self) -> String {
        self.function.runtime.as_str().to_string()
    }
    fn code_path(&self) -> PathBuf {
        self.content_path.clone()
    }
    fn layer_path(&self) -> PathBuf {
        self.layer_path.clone()
    }
}

pub struct DevFunctionRunnable {
    pub dev_function: DevFunction,
}

impl DevFunctionRunnable {
    /// `base_path` must already be resolved relative to the dev-config file's directory.
    pub fn new(mut dev_function: DevFunction, resolved_base_path: PathBuf, deps_path: PathBuf) -> Self {
        dev_function.base_path = resolved_base_path.to_string_lossy().to_string();
        dev_function.deps_path = deps_path.to_string_lossy().to_string();
        Self { dev_function }
    }
}

impl Runnable for DevFunctionRunnable {
    fn name(&self) -> String {
        self.dev_function.name.clone()
    }
    fn env_vars(&self) -> Vec<String> {
        self.dev_function.env_vars()
    }
    fn handler_cmd(&self) -> Vec<String> {
        self.dev_function.handler_cmd()
    }
    fn runtime_tag(&self) -> String {
        self.dev_function.runtime.clone()
    }
    fn code_path(&self) -> PathBuf {
        PathBuf::from(&self.dev_function.base_path)
    }
    fn layer_path(&self) -> PathBuf {
        PathBuf::from(&self.dev_function.deps_path)
    }
}
