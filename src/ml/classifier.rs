use crate::error::{AppError, Result};
use crate::ml::models::ClassifierParams;
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Trait for binary classifiers over the transformed feature space
pub trait Classifier: Send + Sync {
    /// Probability of the positive class for each row
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Predicted class labels (0 or 1)
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|&p| usize::from(p > 0.5))
            .collect())
    }

    /// Number of input features the classifier expects
    fn n_features(&self) -> usize;
}

/// L2-regularised logistic regression.
///
/// Fitting is delegated to `linfa-logistic`; the fitted weights and intercept
/// are kept as plain arrays so the model serializes with the artifact and
/// scores rows without the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    /// One weight per transformed feature, oriented toward class 1
    weights: Array1<f64>,

    /// Bias term
    intercept: f64,

    /// Hyperparameters used for fitting
    params: ClassifierParams,
}

impl LogisticRegressionClassifier {
    /// Fit on a transformed feature matrix with 0/1 labels
    pub fn fit(features: &Array2<f64>, labels: &Array1<usize>, params: &ClassifierParams) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::Training(format!(
                "feature matrix has {} rows but {} labels were given",
                features.nrows(),
                labels.len()
            )));
        }
        if !labels.iter().any(|&l| l == 0) || !labels.iter().any(|&l| l == 1) {
            return Err(AppError::Training(
                "logistic regression needs samples of both classes".to_string(),
            ));
        }

        let dataset = Dataset::new(features.clone(), labels.clone());
        let fitted = LogisticRegression::<f64>::default()
            .alpha(params.alpha)
            .max_iterations(params.max_iterations)
            .gradient_tolerance(params.gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| AppError::Training(format!("Failed to fit logistic regression: {}", e)))?;

        let mut weights = fitted.params().clone();
        let mut intercept = fitted.intercept();

        // The solver picks its own positive class; flip so scores point at label 1
        if fitted.labels().pos.class != 1 {
            weights.mapv_inplace(|w| -w);
            intercept = -intercept;
        }

        if weights.iter().any(|w| !w.is_finite()) || !intercept.is_finite() {
            return Err(AppError::Training(
                "logistic regression produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            weights,
            intercept,
            params: params.clone(),
        })
    }

    /// Build from known coefficients
    pub fn from_coefficients(weights: Array1<f64>, intercept: f64, params: ClassifierParams) -> Self {
        Self {
            weights,
            intercept,
            params,
        }
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Check internal consistency after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.weights.is_empty() {
            return Err(AppError::Artifact("classifier has no weights".to_string()));
        }
        if self.weights.iter().any(|w| !w.is_finite()) || !self.intercept.is_finite() {
            return Err(AppError::Artifact(
                "classifier holds non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.weights.len() {
            return Err(AppError::Internal(format!(
                "classifier expects {} features, got {}",
                self.weights.len(),
                features.ncols()
            )));
        }
        Ok(features.dot(&self.weights).mapv(|z| sigmoid(z + self.intercept)))
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }
}

/// Logistic function, stable for large |z|
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<usize>) {
        let n = 40;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let positive = i % 2 == 0;
            let offset = (i / 2) as f64 * 0.05;
            x[[i, 0]] = if positive { 1.0 + offset } else { -1.0 - offset };
            x[[i, 1]] = offset;
            y[i] = usize::from(positive);
        }
        (x, y)
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) > 0.999_999);
        assert!(sigmoid(-40.0) < 1e-6);
        assert!(sigmoid(-1000.0).is_finite());
        assert!(sigmoid(1000.0).is_finite());
    }

    #[test]
    fn test_fit_orients_weights_toward_positive_class() {
        let (x, y) = separable_data();
        let clf = LogisticRegressionClassifier::fit(&x, &y, &ClassifierParams::default()).unwrap();

        assert!(clf.weights()[0] > 0.0);
        let predictions = clf.predict(x.view()).unwrap();
        assert_eq!(predictions, y.to_vec());
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable_data();
        let clf = LogisticRegressionClassifier::fit(&x, &y, &ClassifierParams::default()).unwrap();
        let proba = clf.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable_data();
        let a = LogisticRegressionClassifier::fit(&x, &y, &ClassifierParams::default()).unwrap();
        let b = LogisticRegressionClassifier::fit(&x, &y, &ClassifierParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_requires_both_classes() {
        let x = Array2::zeros((3, 2));
        let y = array![1, 1, 1];
        let err = LogisticRegressionClassifier::fit(&x, &y, &ClassifierParams::default()).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_predict_proba_checks_width() {
        let clf = LogisticRegressionClassifier::from_coefficients(
            array![1.0, -1.0],
            0.0,
            ClassifierParams::default(),
        );
        assert!(clf.predict_proba(Array2::zeros((1, 3)).view()).is_err());

        let proba = clf.predict_proba(array![[2.0, 2.0]].view()).unwrap();
        assert_eq!(proba[0], 0.5);
    }
}
