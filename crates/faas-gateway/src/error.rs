use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use faas_executor::ExecutorError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

/// `InMemoryCatalog` has no dedicated not-found variant; its misses surface as
/// `ExecutorError::Internal("not found: ...")`. Classify on that prefix so catalog misses
/// reach clients as 404s rather than 500s, per the handler layer's contract.
impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match &err {
            ExecutorError::Internal(msg) if msg.starts_with("not found:") => ApiError::NotFound(msg.clone()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<faas_common::FaasError> for ApiError {
    fn from(err: faas_common::FaasError) -> Self {
        match err {
            faas_common::FaasError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
