//! Cloud-provider-shaped request/response bodies. Field names follow the target API's JSON
//! casing (`PascalCase`) since that's the wire contract clients expect; internal domain
//! types (`faas_common::Function` et al.) stay `snake_case` Rust.

use std::collections::BTreeMap;

use faas_common::{EventSource, Function, LambdaLayer};
use serde::{Deserialize, Serialize};

fn default_memory() -> i32 {
    128
}

fn default_timeout() -> i32 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentInput {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentResponse {
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeInput {
    /// Base64-encoded zip archive.
    pub zip_file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeadLetterConfigInput {
    pub target_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateFunctionRequest {
    pub function_name: String,
    pub runtime: String,
    pub role: String,
    pub handler: String,
    pub code: CodeInput,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_memory")]
    pub memory_size: i32,
    #[serde(default = "default_timeout")]
    pub timeout: i32,
    #[serde(default)]
    pub environment: Option<EnvironmentInput>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub dead_letter_config: Option<DeadLetterConfigInput>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateFunctionConfigurationRequest {
    #[serde(default)]
    pub environment: Option<EnvironmentInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerArn {
    pub arn: String,
    pub code_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub function_arn: String,
    pub runtime: String,
    pub role: String,
    pub handler: String,
    pub code_sha256: String,
    pub code_size: i64,
    pub description: String,
    pub memory_size: i32,
    pub timeout: i32,
    pub last_modified: String,
    pub version: String,
    pub environment: Option<EnvironmentResponse>,
    pub layers: Vec<LayerArn>,
    pub package_type: String,
    pub state: String,
}

impl FunctionConfiguration {
    pub fn from_domain(function: &Function, layers: &[LambdaLayer], account_number: &str, region: &str) -> Self {
        Self {
            function_name: function.function_name.clone(),
            function_arn: function.arn(account_number, region),
            runtime: function.runtime.as_str().to_string(),
            role: function.role.clone(),
            handler: function.handler.clone(),
            code_sha256: function.code_sha256.clone(),
            code_size: function.code_size,
            description: function.description.clone(),
            memory_size: function.memory_size,
            timeout: function.timeout,
            last_modified: epoch_millis_to_iso8601(function.last_modified),
            version: function.version.to_string(),
            environment: if function.environment.is_empty() {
                None
            } else {
                Some(EnvironmentResponse {
                    variables: function.environment.clone(),
                })
            },
            layers: layers
                .iter()
                .map(|l| LayerArn {
                    arn: l.version_arn(account_number, region),
                    code_size: l.code_size,
                })
                .collect(),
            package_type: "Zip".to_string(),
            state: "Active".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishLayerVersionRequest {
    pub description: Option<String>,
    pub content: CodeInput,
    #[serde(default)]
    pub compatible_runtimes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerVersionResponse {
    pub layer_arn: String,
    pub layer_version_arn: String,
    pub version: i64,
    pub description: String,
    pub created_date: String,
    pub compatible_runtimes: Vec<String>,
    pub content: LayerContentResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerContentResponse {
    pub code_sha256: String,
    pub code_size: i64,
}

impl LayerVersionResponse {
    pub fn from_domain(layer: &LambdaLayer, account_number: &str, region: &str) -> Self {
        Self {
            layer_arn: layer.arn(account_number, region),
            layer_version_arn: layer.version_arn(account_number, region),
            version: layer.version,
            description: layer.description.clone(),
            created_date: epoch_millis_to_iso8601(layer.created_on),
            compatible_runtimes: layer.compatible_runtimes.iter().map(|r| r.as_str().to_string()).collect(),
            content: LayerContentResponse {
                code_sha256: layer.code_sha256.clone(),
                code_size: layer.code_size,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEventSourceMappingRequest {
    pub event_source_arn: String,
    pub function_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_batch_size() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventSourceMappingResponse {
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub event_source_arn: String,
    pub function_arn: String,
    pub batch_size: i32,
    pub state: String,
    pub last_modified: String,
}

impl EventSourceMappingResponse {
    pub fn from_domain(event_source: &EventSource, account_number: &str, region: &str) -> Self {
        Self {
            uuid: event_source.id.to_string(),
            event_source_arn: event_source.arn.clone(),
            function_arn: format!(
                "arn:aws:lambda:{region}:{account_number}:function:{}",
                event_source.function_name
            ),
            batch_size: event_source.batch_size,
            state: if event_source.enabled { "Enabled" } else { "Disabled" }.to_string(),
            last_modified: epoch_millis_to_iso8601(event_source.last_modified),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeSigningConfigResponse {
    pub function_name: String,
    pub code_signing_config_arn: String,
}

impl CodeSigningConfigResponse {
    pub fn from_domain(function: &Function, account_number: &str, region: &str) -> Self {
        Self {
            function_name: function.function_name.clone(),
            code_signing_config_arn: format!(
                "arn:aws:lambda:{region}:{account_number}:code-signing-config:csc-{}",
                function.function_name
            ),
        }
    }
}

fn epoch_millis_to_iso8601(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339()
}
