use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Input features, named exactly as they appear in the dataset header
/// and in prediction payloads.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
pub enum Feature {
    Pclass,
    Sex,
    Age,
    SibSp,
    Parch,
    Fare,
    Embarked,
}

/// How a feature is treated by the preprocessing transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Median imputation, then standard scaling
    Numeric,

    /// Most-frequent imputation, then one-hot encoding
    Categorical,
}

impl Feature {
    /// Payload column order
    pub const ALL: [Feature; 7] = [
        Feature::Pclass,
        Feature::Sex,
        Feature::Age,
        Feature::SibSp,
        Feature::Parch,
        Feature::Fare,
        Feature::Embarked,
    ];

    /// Numeric block, in transform output order
    pub const NUMERIC: [Feature; 4] = [Feature::Age, Feature::Fare, Feature::SibSp, Feature::Parch];

    /// Categorical block, in transform output order
    pub const CATEGORICAL: [Feature; 3] = [Feature::Sex, Feature::Embarked, Feature::Pclass];

    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Age | Feature::Fare | Feature::SibSp | Feature::Parch => FeatureKind::Numeric,
            Feature::Pclass | Feature::Sex | Feature::Embarked => FeatureKind::Categorical,
        }
    }
}

/// How absent payload keys are handled during alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeaturePolicy {
    /// Absent keys are imputed; only a payload with none of the features is rejected
    #[default]
    Lenient,

    /// Every feature key must be present (an explicit `null` is still imputed)
    Strict,
}

/// One passenger, any field of which may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassengerRecord {
    #[serde(rename = "Pclass")]
    pub pclass: Option<String>,

    #[serde(rename = "Sex")]
    pub sex: Option<String>,

    #[serde(rename = "Age")]
    pub age: Option<f64>,

    #[serde(rename = "SibSp")]
    pub sib_sp: Option<f64>,

    #[serde(rename = "Parch")]
    pub parch: Option<f64>,

    #[serde(rename = "Fare")]
    pub fare: Option<f64>,

    #[serde(rename = "Embarked")]
    pub embarked: Option<String>,
}

/// Result of coercing a JSON payload into a record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCoercion {
    pub record: PassengerRecord,

    /// Features whose key was not present in the payload at all
    pub absent: Vec<Feature>,
}

impl PassengerRecord {
    /// Numeric value of a numeric feature
    pub fn numeric(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Age => self.age,
            Feature::SibSp => self.sib_sp,
            Feature::Parch => self.parch,
            Feature::Fare => self.fare,
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    /// Category label of a categorical feature
    pub fn categorical(&self, feature: Feature) -> Option<&str> {
        match feature {
            Feature::Pclass => self.pclass.as_deref(),
            Feature::Sex => self.sex.as_deref(),
            Feature::Embarked => self.embarked.as_deref(),
            _ => None,
        }
    }

    fn set_numeric(&mut self, feature: Feature, value: Option<f64>) {
        match feature {
            Feature::Age => self.age = value,
            Feature::SibSp => self.sib_sp = value,
            Feature::Parch => self.parch = value,
            Feature::Fare => self.fare = value,
            _ => {}
        }
    }

    fn set_categorical(&mut self, feature: Feature, value: Option<String>) {
        match feature {
            Feature::Pclass => self.pclass = value,
            Feature::Sex => self.sex = value,
            Feature::Embarked => self.embarked = value,
            _ => {}
        }
    }

    /// Build a record from raw text cells, as read from a dataset row.
    /// Empty cells are missing.
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = (Feature, Option<&'a str>)>) -> Result<Self> {
        let mut record = PassengerRecord::default();
        for (feature, cell) in cells {
            let cell = cell.map(str::trim).filter(|c| !c.is_empty());
            match feature.kind() {
                FeatureKind::Numeric => {
                    let value = cell
                        .map(|c| {
                            c.parse::<f64>().map_err(|_| AppError::InvalidFeature {
                                feature,
                                message: format!("expected a number, got '{}'", c),
                            })
                        })
                        .transpose()?;
                    record.set_numeric(feature, value);
                }
                FeatureKind::Categorical => {
                    record.set_categorical(feature, cell.map(normalize_category));
                }
            }
        }
        Ok(record)
    }

    /// Coerce a JSON payload into a record. Keys outside the feature set are
    /// ignored; `null` and absent keys both leave the field missing.
    pub fn from_json(payload: &Value) -> Result<RecordCoercion> {
        let object = payload.as_object().ok_or_else(|| {
            AppError::InvalidPayload(format!(
                "expected a JSON object with passenger features, got {}",
                json_type_name(payload)
            ))
        })?;

        let mut record = PassengerRecord::default();
        let mut absent = Vec::new();

        for feature in Feature::ALL {
            let key: &str = feature.as_ref();
            let Some(value) = object.get(key) else {
                absent.push(feature);
                continue;
            };
            match feature.kind() {
                FeatureKind::Numeric => record.set_numeric(feature, json_numeric(feature, value)?),
                FeatureKind::Categorical => {
                    record.set_categorical(feature, json_category(feature, value)?)
                }
            }
        }

        Ok(RecordCoercion { record, absent })
    }

    /// Number of features that carry a value
    pub fn present_count(&self) -> usize {
        Feature::ALL
            .iter()
            .filter(|f| match f.kind() {
                FeatureKind::Numeric => self.numeric(**f).is_some(),
                FeatureKind::Categorical => self.categorical(**f).is_some(),
            })
            .count()
    }
}

impl FeaturePolicy {
    /// Decide whether a coerced payload lines up with the training columns
    pub fn align(&self, coercion: RecordCoercion) -> Result<PassengerRecord> {
        match self {
            FeaturePolicy::Strict => {
                if let Some(feature) = coercion.absent.first() {
                    return Err(AppError::MissingFeature(*feature));
                }
            }
            FeaturePolicy::Lenient => {
                if coercion.absent.len() == Feature::ALL.len() {
                    return Err(AppError::NoFeatures);
                }
            }
        }
        Ok(coercion.record)
    }
}

/// Canonical text for a category so that `3`, `3.0` and `"3"` agree
pub fn normalize_category(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        _ => raw.to_string(),
    }
}

fn json_numeric(feature: Feature, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            AppError::InvalidFeature {
                feature,
                message: format!("expected a number, got '{}'", s),
            }
        }),
        other => Err(AppError::InvalidFeature {
            feature,
            message: format!("expected a number, got {}", json_type_name(other)),
        }),
    }
}

fn json_category(feature: Feature, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(normalize_category(s))),
        Value::Number(n) => Ok(Some(normalize_category(&n.to_string()))),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(AppError::InvalidFeature {
            feature,
            message: format!("expected a category, got {}", json_type_name(other)),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_names_match_dataset_header() {
        let names: Vec<String> = Feature::ALL.iter().map(|f| f.to_string()).collect();
        assert_eq!(names, vec!["Pclass", "Sex", "Age", "SibSp", "Parch", "Fare", "Embarked"]);
        assert_eq!("SibSp".parse::<Feature>().unwrap(), Feature::SibSp);
    }

    #[test]
    fn test_feature_blocks_partition_all_features() {
        let mut blocks: Vec<Feature> = Feature::NUMERIC
            .iter()
            .chain(Feature::CATEGORICAL.iter())
            .copied()
            .collect();
        blocks.sort();
        let mut all = Feature::ALL.to_vec();
        all.sort();
        assert_eq!(blocks, all);
        assert!(Feature::NUMERIC.iter().all(|f| f.kind() == FeatureKind::Numeric));
        assert!(Feature::CATEGORICAL.iter().all(|f| f.kind() == FeatureKind::Categorical));
    }

    #[test]
    fn test_from_json_full_record() {
        let payload = json!({
            "Pclass": 3, "Sex": "male", "Age": 22, "SibSp": 1,
            "Parch": 0, "Fare": 7.25, "Embarked": "S"
        });
        let coercion = PassengerRecord::from_json(&payload).unwrap();
        assert!(coercion.absent.is_empty());
        assert_eq!(coercion.record.pclass.as_deref(), Some("3"));
        assert_eq!(coercion.record.sex.as_deref(), Some("male"));
        assert_eq!(coercion.record.age, Some(22.0));
        assert_eq!(coercion.record.fare, Some(7.25));
        assert_eq!(coercion.record.present_count(), 7);
    }

    #[test]
    fn test_from_json_null_and_absent() {
        let payload = json!({"Pclass": "1", "Sex": "female", "Age": null, "extra": "ignored"});
        let coercion = PassengerRecord::from_json(&payload).unwrap();
        assert_eq!(coercion.record.age, None);
        assert_eq!(
            coercion.absent,
            vec![Feature::SibSp, Feature::Parch, Feature::Fare, Feature::Embarked]
        );
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = PassengerRecord::from_json(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[test]
    fn test_from_json_rejects_non_numeric_age() {
        let err = PassengerRecord::from_json(&json!({"Age": "old"})).unwrap_err();
        assert!(matches!(err, AppError::InvalidFeature { feature: Feature::Age, .. }));
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let coercion = PassengerRecord::from_json(&json!({"Fare": " 8.05 "})).unwrap();
        assert_eq!(coercion.record.fare, Some(8.05));
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("3"), "3");
        assert_eq!(normalize_category("3.0"), "3");
        assert_eq!(normalize_category(" S "), "S");
        assert_eq!(normalize_category("female"), "female");
        assert_eq!(normalize_category("2.5"), "2.5");
    }

    #[test]
    fn test_from_cells_treats_empty_as_missing() {
        let record = PassengerRecord::from_cells([
            (Feature::Pclass, Some("2")),
            (Feature::Age, Some("")),
            (Feature::Embarked, None),
            (Feature::Fare, Some("13.0")),
        ])
        .unwrap();
        assert_eq!(record.pclass.as_deref(), Some("2"));
        assert_eq!(record.age, None);
        assert_eq!(record.embarked, None);
        assert_eq!(record.fare, Some(13.0));
    }

    #[test]
    fn test_lenient_policy() {
        let partial = PassengerRecord::from_json(&json!({"Sex": "female"})).unwrap();
        assert!(FeaturePolicy::Lenient.align(partial).is_ok());

        let empty = PassengerRecord::from_json(&json!({})).unwrap();
        let err = FeaturePolicy::Lenient.align(empty).unwrap_err();
        assert!(matches!(err, AppError::NoFeatures));

        let unrelated = PassengerRecord::from_json(&json!({"Foo": 1})).unwrap();
        let err = FeaturePolicy::Lenient.align(unrelated).unwrap_err();
        assert!(matches!(err, AppError::NoFeatures));
        assert!(err.to_string().contains("none of the expected features"));
    }

    #[test]
    fn test_strict_policy_names_first_absent_feature() {
        let payload = json!({
            "Pclass": 3, "Sex": "male", "Age": null, "SibSp": 1, "Parch": 0, "Embarked": "S"
        });
        let coercion = PassengerRecord::from_json(&payload).unwrap();
        let err = FeaturePolicy::Strict.align(coercion).unwrap_err();
        assert!(matches!(err, AppError::MissingFeature(Feature::Fare)));
    }
}
