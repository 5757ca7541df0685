use crate::api::AppState;
use crate::error::Result;
use crate::metrics;
use crate::ml::{Prediction, ServiceStatus};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::any::Any;
use std::time::Instant;

/// Health check endpoint. Answers 200 even without a model so that
/// orchestration probes keep the process alive in degraded mode.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.service.status();
    Json(HealthResponse {
        status: if status.model_loaded { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: status,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: ServiceStatus,
}

/// Predict survival for one passenger.
///
/// The body is parsed as JSON regardless of the declared content type.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Json<Prediction>> {
    let started = Instant::now();
    let result = state.service.predict_body(&body);

    let outcome = match &result {
        Ok(p) if p.survived() => "survived",
        Ok(_) => "not_survived",
        Err(e) if e.is_client_error() => "client_error",
        Err(_) => "server_error",
    };
    metrics::record_prediction(outcome, started.elapsed().as_secs_f64());

    result.map(Json)
}

/// Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Turn a panic inside a handler into a JSON 500 so the server keeps running
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked");
    metrics::PREDICTIONS_TOTAL
        .with_label_values(&["server_error"])
        .inc();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": format!("Internal error: {}", detail) })),
    )
        .into_response()
}
