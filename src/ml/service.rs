use crate::error::{AppError, Result};
use crate::ml::models::{ModelMetadata, Prediction};
use crate::ml::pipeline::ModelPipeline;
use crate::models::{FeaturePolicy, PassengerRecord};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Serves predictions from a pipeline loaded once at startup.
///
/// The pipeline is immutable after construction and shared behind an `Arc`,
/// so concurrent requests read it without locking. A service built without a
/// pipeline stays up and answers every prediction with
/// [`AppError::ModelUnavailable`].
#[derive(Clone)]
pub struct PredictionService {
    /// Fitted pipeline, `None` when running degraded
    pipeline: Option<Arc<ModelPipeline>>,

    /// Why the pipeline is missing
    unavailable_reason: Option<String>,

    /// Handling of absent payload keys
    policy: FeaturePolicy,
}

/// Snapshot of the service for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub model_loaded: bool,
    pub feature_policy: FeaturePolicy,
    pub unavailable_reason: Option<String>,
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    pub n_features: Option<usize>,
}

impl PredictionService {
    /// Create a service around a fitted pipeline
    pub fn new(pipeline: ModelPipeline) -> Self {
        Self {
            pipeline: Some(Arc::new(pipeline)),
            unavailable_reason: None,
            policy: FeaturePolicy::default(),
        }
    }

    /// Create a degraded service with no model
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            pipeline: None,
            unavailable_reason: Some(reason.into()),
            policy: FeaturePolicy::default(),
        }
    }

    /// Load the artifact at `path`; on failure, log and start degraded
    pub fn from_artifact(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match ModelPipeline::load(path) {
            Ok(pipeline) => {
                info!(path = %path.display(), "✅ Model pipeline loaded successfully");
                Self::new(pipeline)
            }
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(path = %path.display(), "Model file not found");
                warn!("Service will continue without a model; predictions will fail");
                Self::unavailable(format!("model file '{}' not found", path.display()))
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error loading model pipeline");
                warn!("Service will continue without a model; predictions will fail");
                Self::unavailable(format!("model file '{}' could not be loaded", path.display()))
            }
        }
    }

    /// Set the missing-feature policy
    pub fn with_policy(mut self, policy: FeaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FeaturePolicy {
        self.policy
    }

    pub fn is_model_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.pipeline.as_deref().map(ModelPipeline::metadata)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            model_loaded: self.is_model_loaded(),
            feature_policy: self.policy,
            unavailable_reason: self.unavailable_reason.clone(),
            trained_at: self.metadata().map(|m| m.trained_at),
            n_features: self.metadata().map(|m| m.n_features),
        }
    }

    fn pipeline(&self) -> Result<&ModelPipeline> {
        self.pipeline.as_deref().ok_or_else(|| {
            AppError::ModelUnavailable(
                self.unavailable_reason
                    .clone()
                    .unwrap_or_else(|| "model not loaded".to_string()),
            )
        })
    }

    /// Predict from a raw request body.
    ///
    /// A degraded service answers [`AppError::ModelUnavailable`] before the
    /// body is looked at, so a missing model is reported for every request.
    pub fn predict_body(&self, body: &[u8]) -> Result<Prediction> {
        self.pipeline()?;
        let payload: Value = serde_json::from_slice(body).map_err(|e| {
            AppError::InvalidPayload(format!("request body is not valid JSON: {}", e))
        })?;
        self.predict_json(&payload)
    }

    /// Predict from a parsed JSON payload
    pub fn predict_json(&self, payload: &Value) -> Result<Prediction> {
        let pipeline = self.pipeline()?;

        let coercion = PassengerRecord::from_json(payload)?;
        for feature in &coercion.absent {
            warn!(feature = %feature, "Feature missing in input data");
        }
        let record = self.policy.align(coercion)?;
        debug!(record = ?record, "Prepared record for prediction");

        let prediction = pipeline.predict_one(&record)?;
        info!(
            prediction = prediction.label,
            probability_survived = prediction.probability_survived,
            "Prediction made"
        );
        Ok(prediction)
    }

    /// Predict from an already-aligned record
    pub fn predict(&self, record: &PassengerRecord) -> Result<Prediction> {
        self.pipeline()?.predict_one(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unavailable_service_rejects_predictions() {
        let service = PredictionService::unavailable("model file 'x.bin' not found");
        assert!(!service.is_model_loaded());

        let err = service
            .predict_json(&json!({"Pclass": 3, "Sex": "male"}))
            .unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable(_)));
        assert!(err.to_string().contains("Model unavailable"));
    }

    #[test]
    fn test_unavailable_check_precedes_payload_validation() {
        let service = PredictionService::unavailable("no model");
        let err = service.predict_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable(_)));
    }

    #[test]
    fn test_unavailable_check_precedes_body_parsing() {
        let service = PredictionService::unavailable("no model");
        let err = service.predict_body(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable(_)));
    }

    #[test]
    fn test_from_artifact_missing_file_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::from_artifact(dir.path().join("absent.bin"));
        let status = service.status();
        assert!(!status.model_loaded);
        assert!(status.unavailable_reason.unwrap().contains("not found"));
    }

    #[test]
    fn test_from_artifact_corrupt_file_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"garbage").unwrap();
        let service = PredictionService::from_artifact(&path);
        assert!(!service.is_model_loaded());
        assert!(service.predict(&PassengerRecord::default()).is_err());
    }

    #[test]
    fn test_with_policy() {
        let service = PredictionService::unavailable("none").with_policy(FeaturePolicy::Strict);
        assert_eq!(service.policy(), FeaturePolicy::Strict);
    }
}
