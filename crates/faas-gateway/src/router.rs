//! `InvocationRouter`: the single reverse-proxy entry point invocations pass through,
//! whether from an external caller or the event pump's self-loopback call. Mirrors the
//! original `gateway.proxyHandler`, which forwards the request body and the
//! `X-Amz-Invocation-Type`/`X-Amz-Client-Context` headers verbatim to the container's
//! Lambda Runtime Interface Emulator endpoint at the same path the caller used, and relays
//! the response — status, headers, and body — back untouched.

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

const FORWARDED_HEADERS: &[&str] = &["x-amz-invocation-type", "x-amz-client-context", "x-amz-log-type"];

pub async fn proxy_invocation(
    client: &reqwest::Client,
    endpoint: &str,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
    let mut request = client.post(&url).body(body);

    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(*name) {
            request = request.header(*name, value.clone());
        }
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("unable to reach function container: {e}")))?;

    let status = upstream.status();
    let response_headers = upstream.headers().clone();
    let upstream_body = upstream
        .bytes()
        .await
        .map_err(|e| ApiError::Internal(format!("unable to read function response: {e}")))?;

    Ok((status, response_headers, upstream_body).into_response())
}
