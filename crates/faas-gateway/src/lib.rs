//! HTTP surface for the FaaS control plane: function/layer/event-source-mapping management
//! plus the invocation reverse proxy. Handlers are thin translators between JSON bodies and
//! `Catalog`/`ArtifactStore`/`FunctionSupervisor`/`EventPump` calls; `faas-bin` owns the
//! process that serves this router.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post, put};
use axum::Router;

/// Builds the full route table. Routes and paths mirror the AWS Lambda Management API
/// surface this emulator stands in for.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/2015-03-31/functions", post(handlers::create_function))
        .route("/2015-03-31/functions/:name", get(handlers::get_function))
        .route(
            "/2015-03-31/functions/:name/versions",
            get(handlers::list_function_versions),
        )
        .route(
            "/2015-03-31/functions/:name/configuration",
            put(handlers::update_function_configuration),
        )
        .route(
            "/2015-03-31/functions/:name/invocations",
            post(handlers::invoke_function),
        )
        .route(
            "/2020-06-30/functions/:name/code-signing-config",
            get(handlers::get_function_code_signing_config),
        )
        .route(
            "/2018-10-31/layers/:name/versions",
            post(handlers::publish_layer_version).get(handlers::list_layer_versions),
        )
        .route(
            "/2018-10-31/layers/:name/versions/:version",
            get(handlers::get_layer_version),
        )
        .route(
            "/2015-03-31/event-source-mappings",
            post(handlers::create_event_source_mapping),
        )
        .route(
            "/2015-03-31/event-source-mappings/:uuid",
            get(handlers::get_event_source_mapping),
        )
        .with_state(state)
}
