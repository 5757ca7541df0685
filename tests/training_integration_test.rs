//! Integration tests for the training job
//!
//! These tests verify the complete offline flow:
//! - CSV loading with missing cells
//! - Stratified split and evaluation
//! - Artifact persistence and reload
//! - Reproducibility under a fixed seed

mod common;

use survival_predictor::{
    ml::{dataset, run_training_job, ModelPipeline, PredictionService, TrainingConfig},
    AppError,
};
use serde_json::json;
use tempfile::TempDir;

fn training_config(dir: &TempDir, rows: usize) -> TrainingConfig {
    TrainingConfig {
        dataset_path: common::write_dataset(dir.path(), rows, 7),
        ..TrainingConfig::default()
    }
}

#[test]
fn test_training_job_writes_loadable_artifact() {
    let dir = TempDir::new().unwrap();
    let config = training_config(&dir, 200);
    let artifact = dir.path().join("models").join("model.bin");

    let outcome = run_training_job(&config, &artifact).unwrap();
    assert_eq!(outcome.n_train + outcome.n_test, 200);
    assert_eq!(outcome.n_test, 40);
    assert!(artifact.exists());

    let loaded = ModelPipeline::load(&artifact).unwrap();
    assert_eq!(loaded.metadata().n_training_samples, outcome.n_train);
    assert_eq!(loaded.metadata().n_features, outcome.pipeline.metadata().n_features);
    assert!(loaded.metadata().validation_metrics.is_some());

    // Reloaded pipeline scores exactly like the in-memory one
    let service_a = PredictionService::new(outcome.pipeline);
    let service_b = PredictionService::new(loaded);
    let payload = json!({
        "Pclass": 2, "Sex": "female", "Age": 30, "SibSp": 0,
        "Parch": 1, "Fare": 20.0, "Embarked": "C"
    });
    assert_eq!(
        service_a.predict_json(&payload).unwrap(),
        service_b.predict_json(&payload).unwrap()
    );
}

#[test]
fn test_training_learns_dominant_signal() {
    let dir = TempDir::new().unwrap();
    let config = training_config(&dir, 200);
    let outcome = run_training_job(&config, dir.path().join("model.bin")).unwrap();

    assert!(
        outcome.test_metrics.accuracy > 0.7,
        "accuracy too low: {}",
        outcome.test_metrics.accuracy
    );
    assert_eq!(outcome.test_metrics.support(), outcome.n_test);

    let service = PredictionService::new(outcome.pipeline);
    let female = service
        .predict_json(&json!({"Pclass": 1, "Sex": "female", "Age": 29, "SibSp": 0, "Parch": 0, "Fare": 80.0, "Embarked": "S"}))
        .unwrap();
    let male = service
        .predict_json(&json!({"Pclass": 3, "Sex": "male", "Age": 29, "SibSp": 0, "Parch": 0, "Fare": 8.0, "Embarked": "S"}))
        .unwrap();
    assert!(female.probability_survived > male.probability_survived);
    assert_eq!(female.label, 1);
    assert_eq!(male.label, 0);
}

#[test]
fn test_training_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let config = training_config(&dir, 150);

    let a = run_training_job(&config, dir.path().join("a.bin")).unwrap();
    let b = run_training_job(&config, dir.path().join("b.bin")).unwrap();

    assert_eq!(a.test_metrics.accuracy, b.test_metrics.accuracy);
    assert_eq!(a.test_metrics.confusion_matrix, b.test_metrics.confusion_matrix);
    assert_eq!(a.pipeline.classifier().weights(), b.pipeline.classifier().weights());
    assert_eq!(a.pipeline.classifier().intercept(), b.pipeline.classifier().intercept());
}

#[test]
fn test_split_preserves_class_proportions() {
    let dir = TempDir::new().unwrap();
    let config = training_config(&dir, 200);
    let data = dataset::load_csv(&config.dataset_path).unwrap();
    let counts = data.class_counts();

    let (train, test) = data.stratified_split(0.2, 42).unwrap();
    assert_eq!(train.len() + test.len(), data.len());

    let test_counts = test.class_counts();
    for (class, total) in &counts {
        let expected = (*total as f64 * 0.2).round() as usize;
        assert_eq!(test_counts[class], expected, "class {}", class);
    }
}

#[test]
fn test_missing_dataset_fails_before_training() {
    let dir = TempDir::new().unwrap();
    let config = TrainingConfig {
        dataset_path: dir.path().join("does-not-exist.csv"),
        ..TrainingConfig::default()
    };
    let artifact = dir.path().join("model.bin");

    let err = run_training_job(&config, &artifact).unwrap_err();
    assert!(matches!(err, AppError::DatasetNotFound(_)));
    assert!(err.to_string().contains("does-not-exist.csv"));
    assert!(!artifact.exists());
}

#[test]
fn test_dataset_with_missing_columns_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "PassengerId,Survived,Sex\n1,0,male\n").unwrap();

    let config = TrainingConfig {
        dataset_path: path,
        ..TrainingConfig::default()
    };
    let err = run_training_job(&config, dir.path().join("model.bin")).unwrap_err();
    assert!(matches!(err, AppError::Dataset(_)));
}
