use crate::error::{AppError, Result};
use crate::models::{Feature, PassengerRecord};
use ndarray::{Array1, Array2, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Fitted statistics for one numeric column: median imputation followed by
/// standard scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub feature: Feature,

    /// Fill value for missing entries
    pub median: f64,

    /// Mean of the imputed column
    pub mean: f64,

    /// Population standard deviation of the imputed column (1.0 when constant)
    pub scale: f64,
}

impl NumericColumn {
    fn fit(feature: Feature, records: &[PassengerRecord]) -> Self {
        let mut observed: Vec<f64> = records.iter().filter_map(|r| r.numeric(feature)).collect();

        let median = if observed.is_empty() {
            warn!(feature = %feature, "No observed values; imputing with 0.0");
            0.0
        } else {
            median(&mut observed)
        };

        let n = records.len() as f64;
        let imputed = records.iter().map(|r| r.numeric(feature).unwrap_or(median));
        let mean = imputed.clone().sum::<f64>() / n;
        let variance = imputed.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Self {
            feature,
            median,
            mean,
            scale: if std > f64::EPSILON { std } else { 1.0 },
        }
    }

    fn transform(&self, record: &PassengerRecord) -> f64 {
        let value = record.numeric(self.feature).unwrap_or(self.median);
        (value - self.mean) / self.scale
    }
}

/// Fitted statistics for one categorical column: most-frequent imputation
/// followed by one-hot encoding over a sorted vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub feature: Feature,

    /// Fill value for missing entries
    pub most_frequent: String,

    /// Known categories, sorted; one output column each
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn fit(feature: Feature, records: &[PassengerRecord]) -> Result<Self> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in records.iter().filter_map(|r| r.categorical(feature)) {
            *counts.entry(value).or_insert(0) += 1;
        }

        // BTreeMap iterates in ascending order, so ties keep the smallest value
        let most_frequent = counts
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (&value, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((value, count)),
            })
            .map(|(value, _)| value.to_string())
            .ok_or_else(|| {
                AppError::Training(format!(
                    "categorical feature '{}' has no observed values",
                    feature
                ))
            })?;

        let categories = counts.keys().map(|c| c.to_string()).collect();

        Ok(Self {
            feature,
            most_frequent,
            categories,
        })
    }

    fn width(&self) -> usize {
        self.categories.len()
    }

    /// Position of the record's (imputed) category, `None` when unseen
    fn index_of(&self, record: &PassengerRecord) -> Option<usize> {
        let value = record
            .categorical(self.feature)
            .unwrap_or(self.most_frequent.as_str());
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    fn transform_into(&self, record: &PassengerRecord, mut out: ArrayViewMut1<'_, f64>) {
        out.fill(0.0);
        if let Some(idx) = self.index_of(record) {
            out[idx] = 1.0;
        }
    }
}

/// Column-wise preprocessing transform.
///
/// Output layout is the numeric block (`Age`, `Fare`, `SibSp`, `Parch`, one
/// scaled column each) followed by the categorical block (`Sex`, `Embarked`,
/// `Pclass`, one indicator per known category). The layout is fixed at fit
/// time and stored with the artifact, so inference reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    n_features: usize,
}

impl Preprocessor {
    /// Learn imputation, scaling and vocabulary statistics
    pub fn fit(records: &[PassengerRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(AppError::Training(
                "cannot fit preprocessing on an empty dataset".to_string(),
            ));
        }

        let numeric: Vec<NumericColumn> = Feature::NUMERIC
            .iter()
            .map(|&f| NumericColumn::fit(f, records))
            .collect();

        let categorical = Feature::CATEGORICAL
            .iter()
            .map(|&f| CategoricalColumn::fit(f, records))
            .collect::<Result<Vec<_>>>()?;

        let n_features = numeric.len() + categorical.iter().map(|c| c.width()).sum::<usize>();

        Ok(Self {
            numeric,
            categorical,
            n_features,
        })
    }

    /// Width of the transformed feature space
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Output column names, e.g. `Age`, `Sex_female`, `Pclass_3`
    pub fn feature_names(&self) -> Vec<String> {
        let numeric = self.numeric.iter().map(|c| c.feature.to_string());
        let categorical = self.categorical.iter().flat_map(|c| {
            c.categories
                .iter()
                .map(move |value| format!("{}_{}", c.feature, value))
        });
        numeric.chain(categorical).collect()
    }

    /// Transform a batch of records into an `n_records × n_features` matrix
    pub fn transform(&self, records: &[PassengerRecord]) -> Array2<f64> {
        let mut matrix = Array2::zeros((records.len(), self.n_features));
        for (record, mut row) in records.iter().zip(matrix.rows_mut()) {
            let mut offset = 0;
            for column in &self.numeric {
                row[offset] = column.transform(record);
                offset += 1;
            }
            for column in &self.categorical {
                let width = column.width();
                column.transform_into(record, row.slice_mut(ndarray::s![offset..offset + width]));
                offset += width;
            }
        }
        matrix
    }

    /// Transform a single record
    pub fn transform_one(&self, record: &PassengerRecord) -> Array1<f64> {
        self.transform(std::slice::from_ref(record)).row(0).to_owned()
    }

    /// Categorical features whose value was not seen during fitting
    pub fn unknown_categories(&self, record: &PassengerRecord) -> Vec<Feature> {
        self.categorical
            .iter()
            .filter(|c| c.index_of(record).is_none())
            .map(|c| c.feature)
            .collect()
    }

    /// Check internal consistency after deserialization
    pub fn validate(&self) -> Result<()> {
        let expected_numeric: Vec<Feature> = self.numeric.iter().map(|c| c.feature).collect();
        let expected_categorical: Vec<Feature> =
            self.categorical.iter().map(|c| c.feature).collect();
        if expected_numeric != Feature::NUMERIC || expected_categorical != Feature::CATEGORICAL {
            return Err(AppError::Artifact(
                "preprocessor column layout does not match the feature schema".to_string(),
            ));
        }
        let width = self.numeric.len() + self.categorical.iter().map(|c| c.width()).sum::<usize>();
        if width != self.n_features {
            return Err(AppError::Artifact(format!(
                "preprocessor declares {} features but its columns produce {}",
                self.n_features, width
            )));
        }
        if self.numeric.iter().any(|c| !(c.scale > 0.0) || !c.mean.is_finite()) {
            return Err(AppError::Artifact(
                "preprocessor holds invalid scaling parameters".to_string(),
            ));
        }
        if self
            .categorical
            .iter()
            .any(|c| c.categories.windows(2).any(|w| w[0] >= w[1]))
        {
            return Err(AppError::Artifact(
                "preprocessor category vocabulary is not sorted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
