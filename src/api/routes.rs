use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        // Prometheus scrape endpoint
        .route("/metrics", get(handlers::metrics_handler))
        // Inference
        .route("/predict", post(handlers::predict))
        // Add state
        .with_state(state);

    with_middleware(router)
}

/// Wrap a router in the panic, tracing and CORS layers shared by every route
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
