use crate::error::{AppError, Result};
use crate::models::PassengerRecord;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Training job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// CSV dataset path
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Fraction of rows held out for evaluation (0.0 - 1.0, exclusive)
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the stratified split
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Logistic regression hyperparameters
    #[serde(default)]
    pub classifier: ClassifierParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            test_size: default_test_size(),
            seed: default_seed(),
            classifier: ClassifierParams::default(),
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("train.csv")
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// L2 regularization strength
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Solver iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Solver convergence threshold on the gradient norm
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            max_iterations: default_max_iterations(),
            gradient_tolerance: default_gradient_tolerance(),
        }
    }
}

fn default_alpha() -> f64 {
    1.0
}

fn default_max_iterations() -> u64 {
    200
}

fn default_gradient_tolerance() -> f64 {
    1e-4
}

impl ClassifierParams {
    pub fn to_hyperparameters(&self) -> HashMap<String, String> {
        [
            ("alpha".to_string(), self.alpha.to_string()),
            ("max_iterations".to_string(), self.max_iterations.to_string()),
            (
                "gradient_tolerance".to_string(),
                self.gradient_tolerance.to_string(),
            ),
        ]
        .into_iter()
        .collect()
    }
}

/// Prediction returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 = survived, 0 = not survived
    #[serde(rename = "prediction")]
    pub label: u8,

    /// Positive-class probability, rounded to four decimals
    pub probability_survived: f64,
}

impl Prediction {
    /// Build from a raw positive-class probability
    pub fn from_probability(probability: f64) -> Self {
        Self {
            label: u8::from(probability > 0.5),
            probability_survived: (probability * 10_000.0).round() / 10_000.0,
        }
    }

    pub fn survived(&self) -> bool {
        self.label == 1
    }
}

/// Labeled passengers used for fitting and evaluation
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    /// Feature records
    pub records: Vec<PassengerRecord>,

    /// Outcome labels (0 or 1), one per record
    pub labels: Vec<usize>,
}

impl TrainingDataset {
    pub fn new(records: Vec<PassengerRecord>, labels: Vec<usize>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(AppError::Dataset(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(AppError::Dataset(format!(
                "outcome labels must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Samples per class label
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    fn subset(&self, indices: &[usize]) -> TrainingDataset {
        TrainingDataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Split into (train, test), preserving the class balance in both parts.
    ///
    /// Each class is shuffled with a generator seeded from `seed` and
    /// contributes `round(test_size * class_count)` rows to the test split,
    /// clamped so that both splits keep at least one row of every class.
    /// The same seed and dataset always give the same split.
    pub fn stratified_split(
        &self,
        test_size: f64,
        seed: u64,
    ) -> Result<(TrainingDataset, TrainingDataset)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                test_size
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in self.labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        if by_class.len() < 2 {
            return Err(AppError::Dataset(
                "both outcome classes must be present to train a classifier".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::with_capacity(self.len());
        let mut test_idx = Vec::new();

        for (label, mut indices) in by_class {
            if indices.len() < 2 {
                return Err(AppError::Dataset(format!(
                    "class {} has only {} sample; at least 2 are needed for a stratified split",
                    label,
                    indices.len()
                )));
            }
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * test_size).round() as usize)
                .clamp(1, indices.len() - 1);
            test_idx.extend_from_slice(&indices[..n_test]);
            train_idx.extend_from_slice(&indices[n_test..]);
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();

        Ok((self.subset(&train_idx), self.subset(&test_idx)))
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Support-weighted F1 score
    pub weighted_f1_score: f64,

    /// Confusion matrix, rows = true class, columns = predicted class
    pub confusion_matrix: Array2<usize>,

    /// Per-class metrics keyed by class label
    pub per_class_metrics: BTreeMap<usize, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Compute metrics for binary labels
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AppError::Internal(format!(
                "cannot score {} predictions against {} labels",
                y_pred.len(),
                y_true.len()
            )));
        }

        let n_classes = 2;
        let n_samples = y_true.len();
        let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t >= n_classes || p >= n_classes {
                return Err(AppError::Internal(format!(
                    "labels must be 0 or 1, got true={} predicted={}",
                    t, p
                )));
            }
            confusion[[t, p]] += 1;
        }

        let correct: usize = (0..n_classes).map(|c| confusion[[c, c]]).sum();
        let accuracy = if n_samples > 0 {
            correct as f64 / n_samples as f64
        } else {
            0.0
        };

        let mut per_class = BTreeMap::new();
        for class_idx in 0..n_classes {
            let tp = confusion[[class_idx, class_idx]];
            let fp = confusion.column(class_idx).sum() - tp;
            let fn_count = confusion.row(class_idx).sum() - tp;

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                class_idx,
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support: tp + fn_count,
                },
            );
        }

        let avg = |f: fn(&ClassMetrics) -> f64| {
            per_class.values().map(f).sum::<f64>() / n_classes as f64
        };
        let weighted_f1_score = if n_samples > 0 {
            per_class
                .values()
                .map(|m| m.f1_score * m.support as f64)
                .sum::<f64>()
                / n_samples as f64
        } else {
            0.0
        };

        Ok(ModelMetrics {
            accuracy,
            precision: avg(|m| m.precision),
            recall: avg(|m| m.recall),
            f1_score: avg(|m| m.f1_score),
            weighted_f1_score,
            confusion_matrix: confusion,
            per_class_metrics: per_class,
        })
    }

    pub fn support(&self) -> usize {
        self.per_class_metrics.values().map(|m| m.support).sum()
    }
}

impl fmt::Display for ModelMetrics {
    /// Renders a classification report followed by the confusion matrix
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (label, m) in &self.per_class_metrics {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(
            f,
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "macro avg",
            self.precision,
            self.recall,
            self.f1_score,
            self.support()
        )?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "weighted avg",
            "",
            "",
            self.weighted_f1_score,
            self.support()
        )?;
        writeln!(f)?;
        writeln!(f, "Confusion Matrix:")?;
        for row in self.confusion_matrix.rows() {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>5}", c)).collect();
            writeln!(f, "[{} ]", cells.join(""))?;
        }
        Ok(())
    }
}

/// Model metadata carried inside the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Crate version that produced the artifact
    pub version: String,

    /// Artifact layout version
    pub format_version: u32,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of held-out samples
    pub n_test_samples: usize,

    /// Width of the transformed feature space
    pub n_features: usize,

    /// Held-out metrics
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}
