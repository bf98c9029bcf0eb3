//! Thin handlers: decode the request body, call into `Catalog` / `ArtifactStore` /
//! `FunctionSupervisor` / `EventPump`, translate the domain result into a cloud-API-shaped
//! response. No business logic lives here beyond what's needed to adapt one surface to the
//! other.

use axum::extract::{OriginalUri, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use faas_common::{EventSource, Function, LayerRef, Runtime};
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use crate::dto::{
    CodeSigningConfigResponse, CreateEventSourceMappingRequest, CreateFunctionRequest, EventSourceMappingResponse,
    FunctionConfiguration, LayerVersionResponse, PublishLayerVersionRequest, UpdateFunctionConfigurationRequest,
};
use crate::error::ApiError;
use crate::router::proxy_invocation;
use crate::state::AppState;

fn decode_zip(b64: &str) -> Result<Vec<u8>, ApiError> {
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 in Code.ZipFile: {e}")))
}

fn sha256_b64(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[instrument(skip(state, req))]
pub async fn create_function(
    State(state): State<AppState>,
    Json(req): Json<CreateFunctionRequest>,
) -> Result<Json<FunctionConfiguration>, ApiError> {
    let zip_bytes = decode_zip(&req.code.zip_file)?;
    let code_sha256 = sha256_b64(&zip_bytes);
    let code_size = zip_bytes.len() as i64;

    let mut layer_refs: Vec<LayerRef> = Vec::with_capacity(req.layers.len());
    for arn in &req.layers {
        let mut layer_ref = faas_common::LambdaLayer::from_arn(arn).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if layer_ref.version == 0 {
            layer_ref.version = state.catalog.get_latest_layer_version_by_name(&layer_ref.name).await?;
        }
        layer_refs.push(layer_ref);
    }

    let function = Function {
        function_name: req.function_name.clone(),
        version: 0,
        description: req.description,
        handler: req.handler,
        role: req.role,
        dead_letter_arn: req.dead_letter_config.map(|c| c.target_arn),
        layers: layer_refs,
        memory_size: req.memory_size,
        runtime: Runtime::from(req.runtime.as_str()),
        timeout: req.timeout,
        code_sha256,
        code_size,
        environment: req.environment.map(|e| e.variables).unwrap_or_default(),
        tags: req.tags,
        last_modified: 0,
    };

    let inserted = state.catalog.insert_function(function, vec![]).await?;
    let layers_resolved = state.catalog.get_layers_for_function(&inserted.function_name, inserted.version).await?;

    state
        .artifact_store
        .save_function_code(&inserted.function_name, inserted.version, &zip_bytes)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .artifact_store
        .extract_layers_into(&inserted.function_name, inserted.version, &inserted.layers)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let runnable = faas_executor::runnable::PersistedFunction::new(inserted.clone(), &state.artifact_store);
    state.supervisor.start(&runnable).await?;

    Ok(Json(FunctionConfiguration::from_domain(
        &inserted,
        &layers_resolved,
        &state.account_number,
        &state.region,
    )))
}

#[instrument(skip(state))]
pub async fn get_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FunctionConfiguration>, ApiError> {
    let function = state.catalog.get_latest_function_by_name(&name).await?;
    let layers = state.catalog.get_layers_for_function(&name, function.version).await?;
    Ok(Json(FunctionConfiguration::from_domain(
        &function,
        &layers,
        &state.account_number,
        &state.region,
    )))
}

#[instrument(skip(state))]
pub async fn list_function_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<FunctionConfiguration>>, ApiError> {
    let versions = state.catalog.get_versions_for_function_name(&name).await?;
    let mut out = Vec::with_capacity(versions.len());
    for function in &versions {
        let layers = state.catalog.get_layers_for_function(&name, function.version).await?;
        out.push(FunctionConfiguration::from_domain(function, &layers, &state.account_number, &state.region));
    }
    Ok(Json(out))
}

#[instrument(skip(state, req))]
pub async fn update_function_configuration(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateFunctionConfigurationRequest>,
) -> Result<Json<FunctionConfiguration>, ApiError> {
    let environment = req.environment.map(|e| e.variables).unwrap_or_default();
    state.catalog.upsert_function_environment(&name, environment).await?;
    let function = state.catalog.get_latest_function_by_name(&name).await?;
    let layers = state.catalog.get_layers_for_function(&name, function.version).await?;
    Ok(Json(FunctionConfiguration::from_domain(
        &function,
        &layers,
        &state.account_number,
        &state.region,
    )))
}

/// `InvocationRouter`: proxies to the running container at the endpoint recorded by
/// `FunctionSupervisor`. Returns 404 without touching the catalog if the function isn't
/// currently running (e.g. it exists but failed to start, or was never booted).
#[instrument(skip(state, body))]
pub async fn invoke_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let endpoint = state
        .supervisor
        .endpoint_for(&name)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("function {name} is not running")))?;

    proxy_invocation(&state.http_client, &endpoint, uri.path(), &headers, body)
        .await
        .map(IntoResponse::into_response)
}

#[instrument(skip(state, req))]
pub async fn publish_layer_version(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PublishLayerVersionRequest>,
) -> Result<Json<LayerVersionResponse>, ApiError> {
    let zip_bytes = decode_zip(&req.content.zip_file)?;
    let code_sha256 = sha256_b64(&zip_bytes);
    let code_size = zip_bytes.len() as i64;

    let layer = faas_common::LambdaLayer {
        name: name.clone(),
        version: 0,
        description: req.description.unwrap_or_default(),
        created_on: 0,
        compatible_runtimes: req.compatible_runtimes.iter().map(|r| Runtime::from(r.as_str())).collect(),
        code_size,
        code_sha256,
    };

    let inserted = state.catalog.insert_layer(layer).await?;
    state
        .artifact_store
        .save_layer_bundle(&inserted.name, inserted.version, &zip_bytes)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(LayerVersionResponse::from_domain(&inserted, &state.account_number, &state.region)))
}

#[instrument(skip(state))]
pub async fn list_layer_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<LayerVersionResponse>>, ApiError> {
    let versions = state.catalog.get_layer_by_name(&name).await?;
    Ok(Json(
        versions
            .iter()
            .map(|l| LayerVersionResponse::from_domain(l, &state.account_number, &state.region))
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_layer_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, i64)>,
) -> Result<Json<LayerVersionResponse>, ApiError> {
    let layer = state.catalog.get_layer_by_name_and_version(&name, version).await?;
    Ok(Json(LayerVersionResponse::from_domain(&layer, &state.account_number, &state.region)))
}

#[instrument(skip(state, req))]
pub async fn create_event_source_mapping(
    State(state): State<AppState>,
    Json(req): Json<CreateEventSourceMappingRequest>,
) -> Result<Json<EventSourceMappingResponse>, ApiError> {
    let event_source = EventSource {
        id: Uuid::new_v4(),
        enabled: req.enabled,
        arn: req.event_source_arn,
        function_name: req.function_name,
        batch_size: req.batch_size,
        last_modified: 0,
    };

    state.catalog.insert_event_source(event_source.clone()).await?;
    if event_source.enabled {
        state.event_pump.start_event_source(event_source.clone()).await?;
    }

    Ok(Json(EventSourceMappingResponse::from_domain(&event_source, &state.account_number, &state.region)))
}

/// Stub: this emulator has no code-signing enforcement, so the response carries a
/// placeholder config ARN rather than a real one. 404s like every other function lookup if
/// the function itself doesn't exist.
#[instrument(skip(state))]
pub async fn get_function_code_signing_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CodeSigningConfigResponse>, ApiError> {
    let function = state.catalog.get_latest_function_by_name(&name).await?;
    Ok(Json(CodeSigningConfigResponse::from_domain(
        &function,
        &state.account_number,
        &state.region,
    )))
}

#[instrument(skip(state))]
pub async fn get_event_source_mapping(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<EventSourceMappingResponse>, ApiError> {
    let event_source = state.catalog.get_event_source(uuid).await?;
    Ok(Json(EventSourceMappingResponse::from_domain(&event_source, &state.account_number, &state.region)))
}
