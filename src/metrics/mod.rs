//! Prometheus metrics for the prediction service.
//!
//! # Example
//! ```no_run
//! use survival_predictor::metrics::PREDICTIONS_TOTAL;
//!
//! PREDICTIONS_TOTAL.with_label_values(&["survived"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Prediction requests by outcome
    ///
    /// Labels: outcome (survived, not_survived, client_error, server_error)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of prediction requests")
            .namespace("survival_predictor"),
        &["outcome"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Time spent handling a prediction request, in seconds
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction request duration in seconds"
        )
        .namespace("survival_predictor")
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// 1 when a model pipeline is loaded, 0 when running degraded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a model pipeline is loaded")
            .namespace("survival_predictor")
    ).expect("Failed to create MODEL_LOADED metric");
}

/// Register all metrics with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;
    Ok(())
}

/// Record the outcome of one prediction request
pub fn record_prediction(outcome: &str, duration_secs: f64) {
    PREDICTIONS_TOTAL.with_label_values(&[outcome]).inc();
    PREDICTION_DURATION_SECONDS.observe(duration_secs);
}

/// Encode all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
