use crate::error::{AppError, Result};
use crate::ml::models::TrainingDataset;
use crate::models::{Feature, PassengerRecord};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Outcome column name
pub const TARGET_COLUMN: &str = "Survived";

/// One dataset row. Columns outside the feature set (PassengerId, Name,
/// Ticket, Cabin, ...) are ignored.
#[derive(Debug, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Pclass")]
    pclass: Option<String>,
    #[serde(rename = "Sex")]
    sex: Option<String>,
    #[serde(rename = "Age")]
    age: Option<String>,
    #[serde(rename = "SibSp")]
    sib_sp: Option<String>,
    #[serde(rename = "Parch")]
    parch: Option<String>,
    #[serde(rename = "Fare")]
    fare: Option<String>,
    #[serde(rename = "Embarked")]
    embarked: Option<String>,
    #[serde(rename = "Survived")]
    survived: Option<String>,
}

impl DatasetRow {
    fn cell(&self, feature: Feature) -> Option<&str> {
        match feature {
            Feature::Pclass => self.pclass.as_deref(),
            Feature::Sex => self.sex.as_deref(),
            Feature::Age => self.age.as_deref(),
            Feature::SibSp => self.sib_sp.as_deref(),
            Feature::Parch => self.parch.as_deref(),
            Feature::Fare => self.fare.as_deref(),
            Feature::Embarked => self.embarked.as_deref(),
        }
    }
}

/// Load a labeled dataset from a CSV file.
///
/// A missing file is reported as [`AppError::DatasetNotFound`] so callers can
/// stop before doing any work.
pub fn load_csv(path: impl AsRef<Path>) -> Result<TrainingDataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::DatasetNotFound(path.to_path_buf()),
        _ => AppError::Io(e),
    })?;
    let dataset = read_csv(file)?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        "Dataset loaded"
    );
    Ok(dataset)
}

/// Parse a labeled dataset from any CSV reader with a header row
pub fn read_csv<R: Read>(reader: R) -> Result<TrainingDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut required: Vec<&str> = Feature::ALL.iter().map(|f| f.as_ref()).collect();
    required.push(TARGET_COLUMN);
    let missing: Vec<&str> = required
        .into_iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Dataset(format!(
            "dataset is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    let mut labels = Vec::new();

    for (idx, row) in csv_reader.deserialize::<DatasetRow>().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let row = row?;

        let label = match row.survived.as_deref().map(str::trim) {
            Some("0") | Some("0.0") => 0,
            Some("1") | Some("1.0") => 1,
            other => {
                return Err(AppError::Dataset(format!(
                    "line {}: {} must be 0 or 1, got {:?}",
                    line,
                    TARGET_COLUMN,
                    other.unwrap_or("")
                )))
            }
        };

        let record = PassengerRecord::from_cells(Feature::ALL.iter().map(|&f| (f, row.cell(f))))
            .map_err(|e| AppError::Dataset(format!("line {}: {}", line, e)))?;

        records.push(record);
        labels.push(label);
    }

    if records.is_empty() {
        return Err(AppError::Dataset("dataset contains no rows".to_string()));
    }

    debug!(rows = records.len(), "Parsed dataset rows");
    TrainingDataset::new(records, labels)
}
