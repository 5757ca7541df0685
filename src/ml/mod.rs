/// Machine learning pipeline for passenger survival prediction
///
/// This module provides:
/// - CSV dataset loading
/// - Column-wise preprocessing (median/most-frequent imputation, standard
///   scaling, one-hot encoding with unseen categories mapped to zeros)
/// - L2-regularised logistic regression
/// - Stratified train/test split and evaluation
/// - A single serializable artifact bundling transform and classifier
/// - The prediction service used by the HTTP layer

pub mod classifier;
pub mod dataset;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod training;

pub use classifier::{Classifier, LogisticRegressionClassifier};
pub use features::{CategoricalColumn, NumericColumn, Preprocessor};
pub use models::{
    ClassMetrics, ClassifierParams, ModelMetadata, ModelMetrics, Prediction, TrainingConfig,
    TrainingDataset,
};
pub use pipeline::{ModelPipeline, ARTIFACT_FORMAT_VERSION};
pub use service::{PredictionService, ServiceStatus};
pub use training::{run_training_job, train_pipeline, TrainingOutcome};
