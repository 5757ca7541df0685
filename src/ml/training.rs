use crate::error::Result;
use crate::ml::classifier::LogisticRegressionClassifier;
use crate::ml::dataset;
use crate::ml::features::Preprocessor;
use crate::ml::models::{ModelMetadata, ModelMetrics, TrainingConfig, TrainingDataset};
use crate::ml::pipeline::{ModelPipeline, ARTIFACT_FORMAT_VERSION};
use ndarray::Array1;
use std::path::Path;
use tracing::{info, warn};

/// Everything the training job produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Fitted pipeline, ready to persist or serve
    pub pipeline: ModelPipeline,

    /// Metrics on the held-out split
    pub test_metrics: ModelMetrics,

    /// Rows used for fitting
    pub n_train: usize,

    /// Rows held out for evaluation
    pub n_test: usize,
}

/// Fit the preprocessing transform and classifier on a labeled dataset.
///
/// The dataset is split with [`TrainingDataset::stratified_split`]; all
/// statistics are learned from the training part only and the returned
/// metrics describe the held-out part. Same dataset and config give the same
/// pipeline and metrics.
pub fn train_pipeline(dataset: &TrainingDataset, config: &TrainingConfig) -> Result<TrainingOutcome> {
    let (train, test) = dataset.stratified_split(config.test_size, config.seed)?;
    info!(
        train = train.len(),
        test = test.len(),
        seed = config.seed,
        "Data split into training and testing sets"
    );

    let preprocessor = Preprocessor::fit(&train.records)?;
    let x_train = preprocessor.transform(&train.records);
    let y_train = Array1::from_vec(train.labels.clone());

    info!(
        n_features = preprocessor.n_features(),
        alpha = config.classifier.alpha,
        "Training the logistic regression model"
    );
    let classifier = LogisticRegressionClassifier::fit(&x_train, &y_train, &config.classifier)?;

    let metadata = ModelMetadata {
        name: "titanic_logistic_regression".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        format_version: ARTIFACT_FORMAT_VERSION,
        trained_at: chrono::Utc::now(),
        n_training_samples: train.len(),
        n_test_samples: test.len(),
        n_features: preprocessor.n_features(),
        validation_metrics: None,
        hyperparameters: config.classifier.to_hyperparameters(),
    };
    let pipeline = ModelPipeline::new(metadata, preprocessor, classifier)?;

    let predictions = pipeline.predict(&test.records)?;
    let test_metrics = ModelMetrics::from_predictions(&test.labels, &predictions)?;
    info!(accuracy = test_metrics.accuracy, "Model evaluation completed");

    let pipeline = pipeline.with_validation_metrics(test_metrics.clone());

    Ok(TrainingOutcome {
        pipeline,
        test_metrics,
        n_train: train.len(),
        n_test: test.len(),
    })
}

/// Load the configured dataset, train, and write the artifact.
///
/// Fails with [`crate::AppError::DatasetNotFound`] before any fitting when the
/// dataset file does not exist.
pub fn run_training_job(config: &TrainingConfig, artifact_path: impl AsRef<Path>) -> Result<TrainingOutcome> {
    let dataset = dataset::load_csv(&config.dataset_path)?;

    let counts = dataset.class_counts();
    info!(rows = dataset.len(), classes = ?counts, "Dataset ready for training");
    if counts.len() == 2 && counts.values().any(|&c| c * 10 < dataset.len()) {
        warn!(classes = ?counts, "Outcome classes are heavily imbalanced");
    }

    let outcome = train_pipeline(&dataset, config)?;
    outcome.pipeline.save(artifact_path)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PassengerRecord;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn synthetic(n: usize) -> TrainingDataset {
        let mut rng = StdRng::seed_from_u64(9);
        let mut records = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let female = i % 2 == 0;
            let pclass = 1 + i % 3;
            records.push(PassengerRecord {
                pclass: Some(pclass.to_string()),
                sex: Some(if female { "female" } else { "male" }.to_string()),
                age: if i % 7 == 0 { None } else { Some(rng.gen_range(1.0..70.0)) },
                sib_sp: Some((i % 3) as f64),
                parch: Some((i % 2) as f64),
                fare: Some(rng.gen_range(5.0..100.0)),
                embarked: Some(["S", "C", "Q"][i % 3].to_string()),
            });
            labels.push(usize::from(female));
        }
        TrainingDataset::new(records, labels).unwrap()
    }

    #[test]
    fn test_train_pipeline_learns_signal() {
        let outcome = train_pipeline(&synthetic(120), &TrainingConfig::default()).unwrap();
        assert_eq!(outcome.n_train + outcome.n_test, 120);
        assert_eq!(outcome.n_test, 24);
        assert!(outcome.test_metrics.accuracy > 0.9);
        assert!(outcome.pipeline.metadata().validation_metrics.is_some());
    }

    #[test]
    fn test_train_pipeline_is_reproducible() {
        let data = synthetic(80);
        let a = train_pipeline(&data, &TrainingConfig::default()).unwrap();
        let b = train_pipeline(&data, &TrainingConfig::default()).unwrap();
        assert_eq!(a.test_metrics.accuracy, b.test_metrics.accuracy);
        assert_eq!(a.pipeline.classifier(), b.pipeline.classifier());
    }

    #[test]
    fn test_run_training_job_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            dataset_path: dir.path().join("missing.csv"),
            ..Default::default()
        };
        let artifact = dir.path().join("model.bin");
        let err = run_training_job(&config, &artifact).unwrap_err();
        assert!(matches!(err, crate::AppError::DatasetNotFound(_)));
        assert!(!artifact.exists());
    }
}
