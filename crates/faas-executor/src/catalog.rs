//! `Catalog`: the persisted metadata store the orchestration engine depends on through a
//! trait only. Ships with `InMemoryCatalog`, a reference implementation sufficient to run
//! and test the binary; a production deployment swaps in a SQL-backed implementation
//! without the orchestrator changing.
//!
//! Transactional writes use a clone-modify-swap pattern: every mutation builds a full copy
//! of the relevant state, validates it, and only then swaps it in under the lock. A failure
//! partway through never leaves the stored state different from what it was before the call
//! — there's nothing to partially apply because nothing is applied until the end.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use faas_common::{EventSource, Function, LambdaLayer, LayerRef};
use uuid::Uuid;

use crate::{ExecutorError, Result};

pub const LATEST: i64 = -1;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_all_latest_functions(&self) -> Result<Vec<Function>>;
    async fn get_environment_for_function(&self, function_name: &str) -> Result<BTreeMap<String, String>>;
    async fn get_layers_for_function(&self, function_name: &str, version: i64) -> Result<Vec<LambdaLayer>>;
    async fn get_latest_function_by_name(&self, name: &str) -> Result<Function>;
    async fn get_latest_version_for_function_name(&self, name: &str) -> Result<i64>;
    async fn get_versions_for_function_name(&self, name: &str) -> Result<Vec<Function>>;
    async fn insert_function(&self, function: Function, layers: Vec<LambdaLayer>) -> Result<Function>;
    async fn upsert_function_environment(
        &self,
        function_name: &str,
        environment: BTreeMap<String, String>,
    ) -> Result<()>;
    async fn insert_layer(&self, layer: LambdaLayer) -> Result<LambdaLayer>;
    async fn get_layer_by_name(&self, name: &str) -> Result<Vec<LambdaLayer>>;
    async fn get_layer_by_name_and_version(&self, name: &str, version: i64) -> Result<LambdaLayer>;
    async fn get_latest_layer_version_by_name(&self, name: &str) -> Result<i64>;
    async fn runtime_exists_by_name(&self, name: &str) -> Result<bool>;
    async fn runtime_ids_by_names(&self, names: &[String]) -> Result<Vec<i64>>;
    async fn insert_event_source(&self, event_source: EventSource) -> Result<()>;
    async fn get_event_source(&self, id: Uuid) -> Result<EventSource>;
    async fn get_all_event_sources(&self) -> Result<Vec<EventSource>>;
}

#[derive(Default, Clone)]
struct CatalogState {
    /// function name -> versions, in ascending version order
    functions: HashMap<String, Vec<Function>>,
    /// layer name -> versions, in ascending version order
    layers: HashMap<String, Vec<LambdaLayer>>,
    event_sources: HashMap<Uuid, EventSource>,
    /// runtime tag -> stable id, mirroring `RuntimeRepository`'s row ids.
    known_runtimes: BTreeMap<String, i64>,
}

pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        let known_runtimes = [
            "python3.6", "python3.7", "python3.8", "python3.9", "python3.10",
        ]
        .iter()
        .enumerate()
        .map(|(i, s)| (s.to_string(), (i + 1) as i64))
        .collect();
        Self {
            state: Mutex::new(CatalogState {
                known_runtimes,
                ..Default::default()
            }),
        }
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn not_found(what: &str) -> ExecutorError {
    ExecutorError::Internal(format!("not found: {what}"))
}

fn lookup_runtime_ids(state: &CatalogState, names: &[String]) -> Result<Vec<i64>> {
    names
        .iter()
        .map(|name| {
            state
                .known_runtimes
                .get(name)
                .copied()
                .ok_or_else(|| ExecutorError::Internal(format!("unknown runtime: {name}")))
        })
        .collect()
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_all_latest_functions(&self) -> Result<Vec<Function>> {
        let state = self.lock();
        Ok(state
            .functions
            .values()
            .filter_map(|versions| versions.last().cloned())
            .collect())
    }

    async fn get_environment_for_function(&self, function_name: &str) -> Result<BTreeMap<String, String>> {
        let state = self.lock();
        let versions = state
            .functions
            .get(function_name)
            .ok_or_else(|| not_found(function_name))?;
        Ok(versions.last().map(|f| f.environment.clone()).unwrap_or_default())
    }

    async fn get_layers_for_function(&self, function_name: &str, version: i64) -> Result<Vec<LambdaLayer>> {
        let state = self.lock();
        let versions = state
            .functions
            .get(function_name)
            .ok_or_else(|| not_found(function_name))?;
        let function = resolve_version(versions, version).ok_or_else(|| not_found(function_name))?;
        let mut resolved = Vec::with_capacity(function.layers.len());
        for layer_ref in &function.layers {
            resolved.push(resolve_layer(&state, layer_ref)?);
        }
        Ok(resolved)
    }

    async fn get_latest_function_by_name(&self, name: &str) -> Result<Function> {
        let state = self.lock();
        state
            .functions
            .get(name)
            .and_then(|v| v.last().cloned())
            .ok_or_else(|| not_found(name))
    }

    async fn get_latest_version_for_function_name(&self, name: &str) -> Result<i64> {
        let state = self.lock();
        state
            .functions
            .get(name)
            .and_then(|v| v.last())
            .map(|f| f.version)
            .ok_or_else(|| not_found(name))
    }

    async fn get_versions_for_function_name(&self, name: &str) -> Result<Vec<Function>> {
        let state = self.lock();
        state
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    async fn insert_function(&self, mut function: Function, layers: Vec<LambdaLayer>) -> Result<Function> {
        let mut state = self.lock();
        let mut next_state = state.clone();

        for layer in &layers {
            let bucket = next_state.layers.entry(layer.name.clone()).or_default();
            if !bucket.iter().any(|l| l.version == layer.version) {
                bucket.push(layer.clone());
                bucket.sort_by_key(|l| l.version);
            }
        }

        for layer_ref in &function.layers {
            resolve_layer(&next_state, layer_ref)?;
        }

        let bucket = next_state.functions.entry(function.function_name.clone()).or_default();
        let next_version = bucket.last().map(|f| f.version + 1).unwrap_or(1);
        function.version = next_version;
        bucket.push(function.clone());

        *state = next_state;
        Ok(function)
    }

    async fn upsert_function_environment(
        &self,
        function_name: &str,
        environment: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self.lock();
        let mut next_state = state.clone();

        let bucket = next_state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found(function_name))?;
        let latest = bucket.last_mut().ok_or_else(|| not_found(function_name))?;
        latest.environment = environment;
        latest.last_modified = next_last_modified(latest.last_modified);

        *state = next_state;
        Ok(())
    }

    async fn insert_layer(&self, mut layer: LambdaLayer) -> Result<LambdaLayer> {
        let mut state = self.lock();
        let mut next_state = state.clone();

        let runtime_names: Vec<String> = layer.compatible_runtimes.iter().map(|r| r.as_str().to_string()).collect();
        lookup_runtime_ids(&next_state, &runtime_names)?;

        let bucket = next_state.layers.entry(layer.name.clone()).or_default();
        let next_version = bucket.last().map(|l| l.version + 1).unwrap_or(1);
        layer.version = next_version;
        bucket.push(layer.clone());

        *state = next_state;
        Ok(layer)
    }

    async fn get_layer_by_name(&self, name: &str) -> Result<Vec<LambdaLayer>> {
        let state = self.lock();
        state.layers.get(name).cloned().ok_or_else(|| not_found(name))
    }

    async fn get_layer_by_name_and_version(&self, name: &str, version: i64) -> Result<LambdaLayer> {
        let state = self.lock();
        let versions = state.layers.get(name).ok_or_else(|| not_found(name))?;
        resolve_version_layer(versions, version).ok_or_else(|| not_found(name))
    }

    async fn get_latest_layer_version_by_name(&self, name: &str) -> Result<i64> {
        let state = self.lock();
        state
            .layers
            .get(name)
            .and_then(|v| v.last())
            .map(|l| l.version)
            .ok_or_else(|| not_found(name))
    }

    async fn runtime_exists_by_name(&self, name: &str) -> Result<bool> {
        let state = self.lock();
        Ok(state.known_runtimes.contains_key(name))
    }

    async fn runtime_ids_by_names(&self, names: &[String]) -> Result<Vec<i64>> {
        let state = self.lock();
        lookup_runtime_ids(&state, names)
    }

    async fn insert_event_source(&self, event_source: EventSource) -> Result<()> {
        let mut state = self.lock();
        let mut next_state = state.clone();
        if !next_state.functions.contains_key(&event_source.function_name) {
            return Err(not_found(&event_source.function_name));
        }
        next_state.event_sources.insert(event_source.id, event_source);
        *state = next_state;
        Ok(())
    }

    async fn get_event_source(&self, id: Uuid) -> Result<EventSource> {
        let state = self.lock();
        state
            .event_sources
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(&id.to_string()))
    }

    async fn get_all_event_sources(&self) -> Result<Vec<EventSource>> {
        let state = self.lock();
        Ok(state.event_sources.values().cloned().collect())
    }
}

fn resolve_version(versions: &[Function], version: i64) -> Option<Function> {
    if version == LATEST {
        versions.last().cloned()
    } else {
        versions.iter().find(|f| f.version == version).cloned()
    }
}

fn resolve_version_layer(versions: &[LambdaLayer], version: i64) -> Option<LambdaLayer> {
    if version == LATEST {
        versions.last().cloned()
    } else {
        versions.iter().find(|l| l.version == version).cloned()
    }
}

fn resolve_layer(state: &CatalogState, layer_ref: &LayerRef) -> Result<LambdaLayer> {
    let versions = state
        .layers
        .get(&layer_ref.name)
        .ok_or_else(|| not_found(&layer_ref.name))?;
    resolve_version_layer(versions, layer_ref.version).ok_or_else(|| not_found(&layer_ref.name))
}

fn next_last_modified(previous: i64) -> i64 {
    // Strictly monotonic without calling a wall-clock API, which keeps this deterministic
    // under test; callers needing real timestamps stamp `last_modified` before insertion.
    previous + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_function(name: &str) -> Function {
        Function {
            function_name: name.to_string(),
            version: 0,
            description: String::new(),
            handler: "main.handler".to_string(),
            role: "arn:aws:iam::271828182845:role/lambda".to_string(),
            dead_letter_arn: None,
            layers: vec![],
            memory_size: 128,
            runtime: "python3.9".into(),
            timeout: 3,
            code_sha256: "abc".to_string(),
            code_size: 10,
            environment: BTreeMap::new(),
            tags: BTreeMap::new(),
            last_modified: 0,
        }
    }

    #[tokio::test]
    async fn insert_function_assigns_monotonic_versions() {
        let catalog = InMemoryCatalog::new();
        let f1 = catalog.insert_function(sample_function("hello"), vec![]).await.unwrap();
        let f2 = catalog.insert_function(sample_function("hello"), vec![]).await.unwrap();
        assert_eq!(f1.version, 1);
        assert_eq!(f2.version, 2);
        assert_eq!(catalog.get_latest_version_for_function_name("hello").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_function_rejects_missing_layer() {
        let catalog = InMemoryCatalog::new();
        let mut f = sample_function("hello");
        f.layers.push(LayerRef { name: "nope".to_string(), version: 1 });
        let err = catalog.insert_function(f, vec![]).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Internal(_)));
        assert!(catalog.get_all_latest_functions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_environment_failure_leaves_state_unchanged() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_function(sample_function("hello"), vec![]).await.unwrap();
        let before = catalog.get_environment_for_function("hello").await.unwrap();

        let err = catalog
            .upsert_function_environment("does-not-exist", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Internal(_)));

        let after = catalog.get_environment_for_function("hello").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn latest_function_by_name_resolves_highest_version() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_function(sample_function("hello"), vec![]).await.unwrap();
        catalog.insert_function(sample_function("hello"), vec![]).await.unwrap();
        let latest = catalog.get_latest_function_by_name("hello").await.unwrap();
        assert_eq!(latest.version, 2);
    }
}
