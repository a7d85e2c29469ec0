//! JSON control API for the pooled-dispatch variant.
//!
//! # Responsibilities
//! - `POST /connect`: open (or replace) a pool of connections to a host
//! - `POST /send`: dispatch a synthetic request across a pool concurrently
//! - `GET /status`: operability snapshot of registered pools
//!
//! # Design Decisions
//! - Wire field names match the established clients exactly (targetUrl,
//!   statusCode, timeTaken, ...)
//! - Failures return 4xx/5xx with a plain-text reason; success is JSON

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::dispatch::{dispatch_concurrent, DispatchError, ExchangeLimits, ExchangeResponse, PendingRequest};
use crate::observability::metrics;
use crate::pool::{PoolError, PoolRegistry};
use crate::server::target::{parse_target, TargetError};

/// State injected into control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub registry: Arc<PoolRegistry>,
    pub limits: ExchangeLimits,
}

impl ControlState {
    pub fn new(registry: Arc<PoolRegistry>, limits: ExchangeLimits) -> Self {
        Self { registry, limits }
    }
}

/// Build the control router with its middleware stack.
pub fn router(state: ControlState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/connect", post(open_pool))
        .route("/send", post(send))
        .route("/status", get(status))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "targetUrl")]
    pub target_url: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub message: String,
    pub status: &'static str,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(rename = "targetUrl")]
    pub target_url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub concurrent: i64,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub responses: Vec<DispatchedResponse>,
    pub count: usize,
}

/// One dispatched result on the wire.
#[derive(Debug, Serialize)]
pub struct DispatchedResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: String,
    #[serde(rename = "timeTaken")]
    pub time_taken: String,
}

impl From<ExchangeResponse> for DispatchedResponse {
    fn from(response: ExchangeResponse) -> Self {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers {
            headers.entry(name).or_default().push(value);
        }
        Self {
            status_code: response.status,
            headers,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            time_taken: format!("{:?}", response.elapsed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    pub host: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub pools: Vec<PoolStatus>,
}

/// Error type for control handlers; rendered as plain text.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<TargetError> for ControlError {
    fn from(e: TargetError) -> Self {
        ControlError::BadRequest(e.to_string())
    }
}

impl From<PoolError> for ControlError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::NoPool { .. } => ControlError::BadRequest(e.to_string()),
            PoolError::Dial { .. } => ControlError::Upstream(e.to_string()),
        }
    }
}

impl From<DispatchError> for ControlError {
    fn from(e: DispatchError) -> Self {
        ControlError::Upstream(e.to_string())
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ControlError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ControlError::Upstream(message) => (StatusCode::BAD_GATEWAY, message),
        };
        (status, message).into_response()
    }
}

async fn open_pool(
    State(state): State<ControlState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ControlError> {
    let target = parse_target(&request.target_url)?;

    let result = state.registry.open(&target.pool_key, request.count).await;
    metrics::record_pool_open(result.is_ok());
    let count = result?;

    Ok(Json(ConnectResponse {
        message: format!("established {count} connections to {}", target.pool_key),
        status: "success",
        count,
    }))
}

async fn send(
    State(state): State<ControlState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ControlError> {
    let target = parse_target(&request.target_url)?;
    let pool = state
        .registry
        .get(&target.pool_key)
        .ok_or_else(|| PoolError::NoPool {
            host: target.pool_key.clone(),
        })?;

    // The body is opaque; only its serialized byte length matters.
    let body = serde_json::to_vec(&request.body)
        .map_err(|e| ControlError::BadRequest(format!("failed to serialize body: {e}")))?;
    let method = if request.method.is_empty() {
        "POST".to_string()
    } else {
        request.method
    };

    let mut headers: Vec<(String, String)> = Vec::with_capacity(request.headers.len() + 1);
    if !request
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("content-type"))
    {
        headers.push(("Content-Type".into(), "application/json".into()));
    }
    headers.extend(request.headers);

    let pending = PendingRequest {
        method,
        host: target.host_header,
        path: target.path,
        query: target.query,
        headers,
        body,
    };
    let raw = pending.build_raw();

    let result = dispatch_concurrent(&pool, raw, request.concurrent, &state.limits).await;
    metrics::record_dispatch(
        result.is_ok(),
        result.as_ref().map(|r| r.len()).unwrap_or(0) as u64,
    );
    let responses = result?;

    let count = responses.len();
    Ok(Json(SendResponse {
        responses: responses.into_iter().map(Into::into).collect(),
        count,
    }))
}

async fn status(State(state): State<ControlState>) -> Json<SystemStatus> {
    let mut pools: Vec<PoolStatus> = state
        .registry
        .hosts()
        .into_iter()
        .map(|(host, size)| PoolStatus { host, size })
        .collect();
    pools.sort_by(|a, b| a.host.cmp(&b.host));

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        pools,
    })
}
