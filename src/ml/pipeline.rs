use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, LogisticRegressionClassifier};
use crate::ml::features::Preprocessor;
use crate::ml::models::{ModelMetadata, ModelMetrics, Prediction};
use crate::models::PassengerRecord;
use bincode::Options;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Bumped whenever the serialized layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Upper bound on artifact size accepted by the decoder
const MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

/// Fitted preprocessing transform and classifier, persisted as one artifact.
///
/// The imputation statistics, the scaler parameters and the category
/// vocabularies (including the zero-vector policy for unseen categories)
/// all live inside `preprocessor`, so a loaded pipeline behaves exactly like
/// the one that was trained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    metadata: ModelMetadata,
    preprocessor: Preprocessor,
    classifier: LogisticRegressionClassifier,
}

impl ModelPipeline {
    pub fn new(
        metadata: ModelMetadata,
        preprocessor: Preprocessor,
        classifier: LogisticRegressionClassifier,
    ) -> Result<Self> {
        let pipeline = Self {
            metadata,
            preprocessor,
            classifier,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Attach held-out metrics to the artifact metadata
    pub fn with_validation_metrics(mut self, metrics: ModelMetrics) -> Self {
        self.metadata.validation_metrics = Some(metrics);
        self
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &LogisticRegressionClassifier {
        &self.classifier
    }

    /// Positive-class probability for each record
    pub fn predict_proba(&self, records: &[PassengerRecord]) -> Result<Array1<f64>> {
        let features = self.preprocessor.transform(records);
        self.classifier.predict_proba(features.view())
    }

    /// Class labels for each record
    pub fn predict(&self, records: &[PassengerRecord]) -> Result<Vec<usize>> {
        let features = self.preprocessor.transform(records);
        self.classifier.predict(features.view())
    }

    /// Label and rounded probability for a single record
    pub fn predict_one(&self, record: &PassengerRecord) -> Result<Prediction> {
        let unknown = self.preprocessor.unknown_categories(record);
        if !unknown.is_empty() {
            debug!(features = ?unknown, "Unseen categories encoded as zero vectors");
        }

        let proba = self.predict_proba(std::slice::from_ref(record))?;
        let probability = proba
            .first()
            .copied()
            .ok_or_else(|| AppError::Internal("classifier returned no probability".to_string()))?;
        Ok(Prediction::from_probability(probability))
    }

    fn validate(&self) -> Result<()> {
        if self.metadata.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Artifact(format!(
                "unsupported artifact format version {} (expected {})",
                self.metadata.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        self.preprocessor.validate()?;
        self.classifier.validate()?;
        if self.classifier.n_features() != self.preprocessor.n_features() {
            return Err(AppError::Artifact(format!(
                "classifier expects {} features but the preprocessor produces {}",
                self.classifier.n_features(),
                self.preprocessor.n_features()
            )));
        }
        Ok(())
    }

    /// Encode to the artifact byte format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(codec().serialize(self)?)
    }

    /// Decode and validate an artifact
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let pipeline: ModelPipeline = codec().deserialize(bytes)?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Write the artifact to `path`, replacing any previous file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "Model pipeline saved");
        Ok(())
    }

    /// Read an artifact from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let pipeline = Self::from_bytes(&bytes)
            .map_err(|e| AppError::Artifact(format!("{}: {}", path.display(), e)))?;
        info!(
            path = %path.display(),
            n_features = pipeline.preprocessor.n_features(),
            trained_at = %pipeline.metadata.trained_at,
            "Model pipeline loaded"
        );
        Ok(pipeline)
    }
}
