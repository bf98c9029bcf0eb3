// Shared domain types for the orchestration engine. Every crate in the workspace depends on
// this one for the data model and the `FaasError` type; it has no dependency on Docker, HTTP,
// or the catalog/container-runtime backends themselves.

use std::collections::BTreeMap;
use std::fmt::Display;

pub use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use tracing;
pub use uuid;

#[derive(Error, Debug)]
pub enum FaasError {
    #[error("Executor Error: {0}")]
    Executor(String),

    #[error("Orchestration Error: {0}")]
    Orchestration(String),

    #[error("Gateway Error: {0}")]
    Gateway(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Function Definition Invalid: {0}")]
    DefinitionInvalid(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal Error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FaasError>;

/// Runtime tag as it appears in function/layer metadata and image lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Runtime(pub String);

impl Runtime {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Runtime {
    fn from(s: &str) -> Self {
        Runtime(s.to_string())
    }
}

/// A single published version of a layer. `$LATEST` has no meaning for layers; every
/// publish bumps the version by one, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaLayer {
    pub name: String,
    pub version: i64,
    pub description: String,
    pub created_on: i64,
    pub compatible_runtimes: Vec<Runtime>,
    pub code_size: i64,
    pub code_sha256: String,
}

impl LambdaLayer {
    /// Parses `arn:aws:lambda:{region}:{account}:layer:{name}[:{version}]`.
    /// Version defaults to 0 (unspecified) when the ARN omits it.
    pub fn from_arn(arn: &str) -> Result<LayerRef> {
        let parts: Vec<&str> = arn.split(':').collect();
        let name = parts
            .get(6)
            .ok_or_else(|| FaasError::DefinitionInvalid(format!("malformed layer arn: {arn}")))?
            .to_string();
        let version = match parts.get(7) {
            Some(v) => v
                .parse::<i64>()
                .map_err(|e| FaasError::DefinitionInvalid(format!("bad layer version in {arn}: {e}")))?,
            None => 0,
        };
        Ok(LayerRef { name, version })
    }

    pub fn arn(&self, account_number: &str, region: &str) -> String {
        format!("arn:aws:lambda:{region}:{account_number}:layer:{}", self.name)
    }

    pub fn version_arn(&self, account_number: &str, region: &str) -> String {
        format!("{}:{}", self.arn(account_number, region), self.version)
    }
}

/// A reference to a layer by name and (possibly unspecified) version, as embedded in a
/// function's `Layers` list before being resolved against the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRef {
    pub name: String,
    pub version: i64,
}

/// A single version of a function. `$LATEST` is a synthetic alias resolved by the catalog,
/// never stored verbatim in `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub function_name: String,
    pub version: i64,
    pub description: String,
    pub handler: String,
    pub role: String,
    pub dead_letter_arn: Option<String>,
    pub layers: Vec<LayerRef>,
    pub memory_size: i32,
    pub runtime: Runtime,
    pub timeout: i32,
    pub code_sha256: String,
    pub code_size: i64,
    pub environment: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub last_modified: i64,
}

impl Function {
    pub fn env_vars(&self) -> Vec<String> {
        let mut vars = vec![
            "DOCKER_LAMBDA_STAY_OPEN=1".to_string(),
            "DOCKER_LAMBDA_WATCH=1".to_string(),
        ];
        vars.extend(self.environment.iter().map(|(k, v)| format!("{k}={v}")));
        vars
    }

    pub fn handler_cmd(&self) -> Vec<String> {
        vec![self.handler.clone()]
    }

    pub fn arn(&self, account_number: &str, region: &str) -> String {
        format!("arn:aws:lambda:{region}:{account_number}:function:{}", self.function_name)
    }
}

/// A function declared in the dev-config YAML rather than persisted through the catalog.
/// Named `dev-{key}` externally; never written to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevFunction {
    #[serde(skip)]
    pub name: String,
    pub handler: String,
    pub runtime: String,
    #[serde(rename = "basePath")]
    pub base_path: String,
    #[serde(default)]
    pub environment: Vec<String>,
    /// Populated by `DependencyBuilder::install_dependencies` after boot; empty until then.
    #[serde(skip)]
    pub deps_path: String,
}

impl DevFunction {
    pub fn env_vars(&self) -> Vec<String> {
        let mut vars = vec![
            "DOCKER_LAMBDA_STAY_OPEN=1".to_string(),
            "DOCKER_LAMBDA_WATCH=1".to_string(),
        ];
        vars.extend(self.environment.iter().cloned());
        vars
    }

    pub fn handler_cmd(&self) -> Vec<String> {
        vec![self.handler.clone()]
    }
}

/// Binding from a queue ARN to a function, consumed by the event pump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    pub id: uuid::Uuid,
    pub enabled: bool,
    pub arn: String,
    pub function_name: String,
    pub batch_size: i32,
    pub last_modified: i64,
}

impl EventSource {
    /// `arn:aws:sqs:{region}:{account}:{queue-name}` — queue name is segment index 5.
    pub fn queue_name(&self) -> Result<&str> {
        self.arn
            .split(':')
            .nth(5)
            .ok_or_else(|| FaasError::DefinitionInvalid(format!("malformed event source arn: {}", self.arn)))
    }
}

/// Anything that can be turned into a container spec understood by `FunctionSupervisor`.
/// Implemented by both `Function` and `DevFunction`, mirroring how persisted and dev
/// functions share a single start-up path.
pub trait Runnable {
    fn name(&self) -> String;
    fn env_vars(&self) -> Vec<String>;
    fn handler_cmd(&self) -> Vec<String>;
    fn runtime_tag(&self) -> String;
    fn code_path(&self) -> std::path::PathBuf;
    fn layer_path(&self) -> std::path::PathBuf;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResult {
    pub request_id: String,
    pub response: Option<Vec<u8>>,
    pub logs: Option<String>,
    pub error: Option<String>,
}

impl Display for InvocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InvocationResult(request_id: {}, response: {:?}, logs: {:?}, error: {:?})",
            self.request_id, self.response, self.logs, self.error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_arn_round_trips_name_and_version() {
        let layer = LambdaLayer {
            name: "shared-utils".to_string(),
            version: 3,
            description: String::new(),
            created_on: 0,
            compatible_runtimes: vec![Runtime::from("python3.9")],
            code_size: 128,
            code_sha256: "deadbeef".to_string(),
        };
        let arn = layer.version_arn("271828182845", "us-west-2");
        let parsed = LambdaLayer::from_arn(&arn).unwrap();
        assert_eq!(parsed.name, "shared-utils");
        assert_eq!(parsed.version, 3);
    }

    #[test]
    fn layer_arn_without_version_defaults_to_zero() {
        let parsed =
            LambdaLayer::from_arn("arn:aws:lambda:us-west-2:271828182845:layer:shared-utils").unwrap();
        assert_eq!(parsed.version, 0);
    }

    #[test]
    fn function_env_vars_always_include_docker_lambda_flags() {
        let f = Function {
            function_name: "hello".to_string(),
            version: 1,
            description: String::new(),
            handler: "main.handler".to_string(),
            role: "arn:aws:iam::271828182845:role/lambda".to_string(),
            dead_letter_arn: None,
            layers: vec![],
            memory_size: 128,
            runtime: Runtime::from("python3.9"),
            timeout: 3,
            code_sha256: "abc".to_string(),
            code_size: 10,
            environment: BTreeMap::from([("FOO".to_string(), "bar".to_string())]),
            tags: BTreeMap::new(),
            last_modified: 0,
        };
        let vars = f.env_vars();
        assert!(vars.contains(&"DOCKER_LAMBDA_STAY_OPEN=1".to_string()));
        assert!(vars.contains(&"FOO=bar".to_string()));
    }

    #[test]
    fn event_source_queue_name_is_fifth_colon_segment() {
        let es = EventSource {
            id: uuid::Uuid::new_v4(),
            enabled: true,
            arn: "arn:aws:sqs:us-west-2:271828182845:my-queue".to_string(),
            function_name: "hello".to_string(),
            batch_size: 1,
            last_modified: 0,
        };
        assert_eq!(es.queue_name().unwrap(), "my-queue");
    }
}
